//! Loadable script modules.
//!
//! A module exposes handlers keyed by event name. Commands use [`EVENT_EXECUTE`], apps use
//! [`EVENT_RENDER`] and [`EVENT_MESSAGE`], and both may implement the [`EVENT_CREATE`] and
//! [`EVENT_DESTROY`] lifecycle slots.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::context::InvocationContext;
use crate::error::{EngineError, Result};

pub const EVENT_CREATE: &str = "onCreate";
pub const EVENT_DESTROY: &str = "onDestroy";
pub const EVENT_EXECUTE: &str = "execute";
pub const EVENT_RENDER: &str = "getHtml";
pub const EVENT_MESSAGE: &str = "onMessage";

#[async_trait]
pub trait ScriptModule: Send + Sync {
    fn path(&self) -> &Path;

    fn has_handler(&self, event: &str) -> bool;

    /// Runs the handler for `event`. Fails with `MissingHandler` if there is none.
    async fn call(&self, event: &str, ctx: InvocationContext) -> Result<Value>;
}

#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<Arc<dyn ScriptModule>>;
}

/// Loads each path at most once until [`clear`](Self::clear) is called.
pub struct ModuleCache {
    loader: Arc<dyn ModuleLoader>,
    modules: DashMap<PathBuf, Arc<dyn ScriptModule>>,
}

impl ModuleCache {
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            modules: DashMap::new(),
        }
    }

    pub async fn get_or_load(&self, path: &Path) -> Result<Arc<dyn ScriptModule>> {
        if let Some(module) = self.modules.get(path).map(|m| m.clone()) {
            return Ok(module);
        }

        let module = self.loader.load(path).await?;
        debug!(path = %path.display(), "Loaded script module");
        Ok(self
            .modules
            .entry(path.to_path_buf())
            .or_insert(module)
            .clone())
    }

    /// Forgets every loaded module.
    pub fn clear(&self) {
        self.modules.clear();
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;
type Handler = Arc<dyn Fn(InvocationContext) -> HandlerFuture + Send + Sync>;

/// A module built from Rust closures.
pub struct FnModule {
    path: PathBuf,
    handlers: HashMap<String, Handler>,
}

impl FnModule {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            handlers: HashMap::new(),
        }
    }

    pub fn on<F, Fut>(mut self, event: &str, handler: F) -> Self
    where
        F: Fn(InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.handlers.insert(
            event.to_string(),
            Arc::new(move |ctx| Box::pin(handler(ctx)) as HandlerFuture),
        );
        self
    }
}

#[async_trait]
impl ScriptModule for FnModule {
    fn path(&self) -> &Path {
        &self.path
    }

    fn has_handler(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    async fn call(&self, event: &str, ctx: InvocationContext) -> Result<Value> {
        let handler = self
            .handlers
            .get(event)
            .ok_or_else(|| EngineError::MissingHandler {
                path: self.path.clone(),
                event: event.to_string(),
            })?;
        handler(ctx).await
    }
}

/// Serves modules registered in-process, by path.
#[derive(Default)]
pub struct StaticModuleLoader {
    modules: DashMap<PathBuf, Arc<dyn ScriptModule>>,
    failures: DashMap<PathBuf, String>,
    loads: AtomicUsize,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, module: impl ScriptModule + 'static) {
        let module: Arc<dyn ScriptModule> = Arc::new(module);
        self.modules.insert(module.path().to_path_buf(), module);
    }

    /// Makes loading `path` fail with `reason`.
    pub fn register_failure(&self, path: impl Into<PathBuf>, reason: impl Into<String>) {
        self.failures.insert(path.into(), reason.into());
    }

    /// Number of `load` calls so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModuleLoader for StaticModuleLoader {
    async fn load(&self, path: &Path) -> Result<Arc<dyn ScriptModule>> {
        self.loads.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = self.failures.get(path) {
            return Err(EngineError::script_load(path, reason.as_str()));
        }
        self.modules
            .get(path)
            .map(|m| m.clone())
            .ok_or_else(|| EngineError::script_load(path, "module not found"))
    }
}

/// Runs scripts as child processes.
///
/// Each handler call starts the script with the event name as its first argument and the
/// invocation context as JSON on stdin. The script answers on stdout with
/// `{ "result": ..., "state": ... }`; a `state` member replaces the state cell's value. Output
/// that is not such an object is returned as the result unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProcessModuleLoader {
    interpreter: Option<PathBuf>,
}

impl ProcessModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs scripts through `interpreter` instead of executing them directly.
    pub fn with_interpreter(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: Some(interpreter.into()),
        }
    }
}

#[async_trait]
impl ModuleLoader for ProcessModuleLoader {
    async fn load(&self, path: &Path) -> Result<Arc<dyn ScriptModule>> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| EngineError::script_load(path, e))?;
        if !metadata.is_file() {
            return Err(EngineError::script_load(path, "not a file"));
        }

        Ok(Arc::new(ProcessModule {
            path: path.to_path_buf(),
            interpreter: self.interpreter.clone(),
        }))
    }
}

struct ProcessModule {
    path: PathBuf,
    interpreter: Option<PathBuf>,
}

impl ProcessModule {
    fn command(&self, event: &str) -> Command {
        let mut command = match &self.interpreter {
            Some(interpreter) => {
                let mut command = Command::new(interpreter);
                command.arg(&self.path);
                command
            }
            None => Command::new(&self.path),
        };

        command
            .arg(event)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl ScriptModule for ProcessModule {
    fn path(&self) -> &Path {
        &self.path
    }

    fn has_handler(&self, _event: &str) -> bool {
        true
    }

    async fn call(&self, event: &str, ctx: InvocationContext) -> Result<Value> {
        let input = serde_json::to_vec(&ctx.to_json())?;
        let mut child = self
            .command(event)
            .spawn()
            .map_err(|e| EngineError::script_load(&self.path, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&input).await {
                // Scripts that ignore their input may exit before reading it.
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(EngineError::Handler(format!(
                "'{}' {event} exited with {}: {}",
                self.path.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            return Ok(Value::Null);
        }

        let reply = match serde_json::from_str::<Value>(stdout) {
            Ok(value) => value,
            Err(_) => return Ok(Value::String(stdout.to_string())),
        };

        match reply {
            Value::Object(mut map) if map.contains_key("result") || map.contains_key("state") => {
                if let Some(state) = map.remove("state") {
                    ctx.state.set(state);
                }
                Ok(map.remove("result").unwrap_or(Value::Null))
            }
            other => Ok(other),
        }
    }
}
