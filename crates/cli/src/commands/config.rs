use std::path::Path;

use eyre::Result;

use crate::cli::ConfigCommands;
use crate::config::Config;

pub async fn handle_config_command(cmd: ConfigCommands) -> Result<()> {
    let path = Config::get_config_path();
    let output = run_config_command(cmd, &path).await?;
    println!("{output}");
    Ok(())
}

/// Applies `cmd` to the configuration file at `path` and returns the text to print.
async fn run_config_command(cmd: ConfigCommands, path: &Path) -> Result<String> {
    let mut config = Config::load_from(path).await?;

    match cmd {
        ConfigCommands::Get { key } => config
            .get_value(&key)
            .map(|value| format!("{key}: {value}"))
            .map_err(|e| eyre::eyre!("❌ {e}")),
        ConfigCommands::Set { key, value } => {
            config
                .set_value(&key, &value)
                .map_err(|e| eyre::eyre!("❌ Failed to set {key}: {e}"))?;
            config.save_to(path).await?;

            // Show what the value resolves to, which differs for blank or scheme-less URLs.
            let effective = config.get_value(&key)?;
            Ok(format!("✅ {key} = {effective}"))
        }
        ConfigCommands::Show => Ok(format!(
            "{}\n\nConfig file: {}",
            config.show_all(),
            path.display()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn set_reports_the_resolved_value() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");

        let output = run_config_command(
            ConfigCommands::Set {
                key: "store.url".into(),
                value: "apps.example.com/list.json".into(),
            },
            &path,
        )
        .await
        .unwrap();
        assert_eq!(output, "✅ store.url = http://apps.example.com/list.json");

        let output = run_config_command(
            ConfigCommands::Get {
                key: "store.url".into(),
            },
            &path,
        )
        .await
        .unwrap();
        assert_eq!(output, "store.url: http://apps.example.com/list.json");
    }

    #[tokio::test]
    async fn failed_set_leaves_file_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");

        let result = run_config_command(
            ConfigCommands::Set {
                key: "store.check_interval_days".into(),
                value: "often".into(),
            },
            &path,
        )
        .await;
        assert!(result.is_err());

        let config = Config::load_from(&path).await.unwrap();
        assert_eq!(
            config.store.check_interval_days,
            workbench_store::DEFAULT_CHECK_INTERVAL_DAYS
        );
    }
}
