use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unexpected response from '{url}': [{status}] '{status_text}'")]
    Network {
        url: String,
        status: u16,
        status_text: String,
    },

    #[error("Request to '{0}' timed out")]
    Timeout(String),

    #[error("Request to '{url}' failed: {message}")]
    Transport { url: String, message: String },

    #[error("Invalid catalog from '{url}': {source}")]
    Parse {
        url: String,
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("IO operation '{operation}' failed on path '{path}': {source}")]
    IoOperation {
        operation: String,
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid package: {reason}")]
    InvalidPackage { reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Corrupted snapshot: {0}")]
    CorruptedSnapshot(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::Network { .. } | StoreError::Timeout(_) | StoreError::Transport { .. }
        )
    }

    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidPath(_) | StoreError::InvalidPackage { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_carries_status() {
        let err = StoreError::Network {
            url: "https://example.com".into(),
            status: 404,
            status_text: "Not Found".into(),
        };
        assert_eq!(
            err.to_string(),
            "Unexpected response from 'https://example.com': [404] 'Not Found'"
        );
        assert!(err.is_recoverable());
        assert!(!err.is_user_error());
    }
}
