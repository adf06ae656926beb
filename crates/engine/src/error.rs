use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised while loading, binding or invoking script modules.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The referenced script is missing or failed while loading.
    #[error("Failed to load script '{path}': {reason}")]
    ScriptLoad { path: PathBuf, reason: String },

    /// The host already has a command registered under this id.
    #[error("Command '{0}' is already registered")]
    RegistrationConflict(String),

    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    /// The module does not implement the requested event.
    #[error("Script '{path}' has no '{event}' handler")]
    MissingHandler { path: PathBuf, event: String },

    /// A script handler ran but reported a failure.
    #[error("Handler failed: {0}")]
    Handler(String),

    #[error("Host error: {0}")]
    Host(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub fn script_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        EngineError::ScriptLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
