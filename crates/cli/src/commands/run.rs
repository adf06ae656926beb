use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::Result;
use serde_json::Value;
use tracing::{info, warn};
use workbench_engine::{
    ClockValue, EntryKind, HeadlessHost, ProcessModuleLoader, Runtime, StaticValue,
    ValueContext,
};
use workbench_types::EntriesDocument;

use crate::config::Config;

/// Parses a command-line argument as JSON, falling back to the raw string.
pub fn parse_argument(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

async fn load_entries(path: &Path) -> Result<EntriesDocument> {
    if !path.exists() {
        return Err(eyre::eyre!(
            "Entries file not found: {} (set it with `workbench config set entries.path <file>`)",
            path.display()
        ));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let document: EntriesDocument = serde_json::from_str(&content)
        .map_err(|e| eyre::eyre!("Invalid entries file {}: {}", path.display(), e))?;
    Ok(document)
}

fn default_values() -> ValueContext {
    let workspace = std::env::current_dir()
        .map(|dir| dir.to_string_lossy().to_string())
        .unwrap_or_default();

    ValueContext::new()
        .with(StaticValue::new("workspaceFolder", workspace))
        .with(ClockValue::new("date", "%Y-%m-%d"))
        .with(ClockValue::new("time", "%H:%M:%S"))
        .with_environment()
}

/// Loads the configured entries into a fresh headless runtime.
async fn start_runtime(config: &Config) -> Result<(Runtime, Arc<HeadlessHost>)> {
    let entries_path = PathBuf::from(&config.entries.path);
    let document = load_entries(&entries_path).await?;
    let script_root = entries_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let host = Arc::new(HeadlessHost::new());
    let runtime = Runtime::new(
        host.clone(),
        Arc::new(ProcessModuleLoader::new()),
        script_root,
    );
    runtime.set_values(default_values());

    let report = runtime.reload(&document).await;
    info!(
        bound = report.bound.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Entries loaded"
    );
    for key in &report.failed {
        warn!(entry = %key, "Entry failed to load");
    }

    Ok((runtime, host))
}

pub async fn handle_run(config: &Config, id: String, args: Vec<String>) -> Result<()> {
    let (runtime, _host) = start_runtime(config).await?;

    // The first argument is the host's own context, which a terminal does not have.
    let mut arguments = vec![Value::Null];
    arguments.extend(args.iter().map(|a| parse_argument(a)));

    let outcome = runtime.manager().execute(&id, arguments).await;
    runtime.dispose().await;

    match outcome {
        Ok(Value::Null) => Ok(()),
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            println!("❌ Command '{}' failed: {}", id, e);
            Err(e.into())
        }
    }
}

pub async fn handle_open(config: &Config, app: String) -> Result<()> {
    let (runtime, host) = start_runtime(config).await?;
    let manager = runtime.manager().clone();

    let key = manager
        .app_keys()
        .into_iter()
        .find(|key| {
            *key == app || manager.name(EntryKind::App, key).as_deref() == Some(app.as_str())
        });
    let Some(key) = key else {
        runtime.dispose().await;
        println!("❌ No app named '{}'", app);
        return Err(eyre::eyre!("Unknown app '{}'", app));
    };

    let opened = manager.open_app(&key).await;
    let view = host
        .views()
        .into_iter()
        .map(|(_, view)| view)
        .find(|view| view.app == key);
    runtime.dispose().await;

    match (opened, view) {
        (Ok(_), Some(view)) => {
            println!("{}", view.html);
            Ok(())
        }
        (Ok(_), None) => Err(eyre::eyre!("App '{}' did not open a view", app)),
        (Err(e), _) => {
            println!("❌ Opening '{}' failed: {}", app, e);
            Err(e.into())
        }
    }
}
