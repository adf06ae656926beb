//! Persistence for the known-app snapshot.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, warn};
use workbench_types::KnownAppSnapshot;

use crate::error::{Result, StoreError};

/// Key the snapshot is stored under inside the state file.
pub const KEY_KNOWN_APPS: &str = "knownApps";

/// Storage for the single known-app snapshot.
///
/// Implementations replace the snapshot wholesale on every save.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self) -> Result<Option<KnownAppSnapshot>>;

    async fn save(&self, snapshot: &KnownAppSnapshot) -> Result<()>;
}

/// Snapshot kept in a JSON state file, next to whatever other keys the file holds.
///
/// Every save first copies the current file to `<file>.backup`; a load that cannot read
/// the primary file falls back to the backup.
pub struct JsonSnapshotStore {
    state_path: PathBuf,
    backup_path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new<P: AsRef<Path>>(state_path: P) -> Self {
        let state_path = state_path.as_ref().to_path_buf();
        let mut backup = state_path.clone().into_os_string();
        backup.push(".backup");

        Self {
            state_path,
            backup_path: PathBuf::from(backup),
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    async fn read_state(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        if !self.state_path.exists() {
            debug!(path = %self.state_path.display(), "No state file yet");
            return Ok(serde_json::Map::new());
        }

        match read_state_file(&self.state_path).await {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!(error = %e, "Failed to read state file, checking backup");
                if !self.backup_path.exists() {
                    return Err(e);
                }
                let state = read_state_file(&self.backup_path).await?;
                info!("Restored state from backup");
                Ok(state)
            }
        }
    }
}

async fn read_state_file(path: &Path) -> Result<serde_json::Map<String, serde_json::Value>> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|source| StoreError::IoOperation {
            operation: "read state".to_string(),
            path: path.to_path_buf(),
            source,
        })?;

    serde_json::from_str(&content).map_err(|e| StoreError::CorruptedSnapshot(e.to_string()))
}

#[async_trait]
impl SnapshotStore for JsonSnapshotStore {
    async fn load(&self) -> Result<Option<KnownAppSnapshot>> {
        let state = self.read_state().await?;
        match state.get(KEY_KNOWN_APPS) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| StoreError::CorruptedSnapshot(e.to_string())),
        }
    }

    async fn save(&self, snapshot: &KnownAppSnapshot) -> Result<()> {
        let mut state = self.read_state().await.unwrap_or_else(|e| {
            warn!(error = %e, "Discarding unreadable state file");
            serde_json::Map::new()
        });
        state.insert(KEY_KNOWN_APPS.to_string(), serde_json::to_value(snapshot)?);

        if let Some(parent) = self.state_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if self.state_path.exists() {
            if let Err(e) = fs::copy(&self.state_path, &self.backup_path).await {
                warn!("Failed to create backup: {}", e);
            }
        }

        let content = serde_json::to_string_pretty(&state)?;
        fs::write(&self.state_path, content).await?;
        debug!(apps = snapshot.apps.len(), "Snapshot saved");
        Ok(())
    }
}

/// Snapshot held in memory only.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshot: Mutex<Option<KnownAppSnapshot>>,
    saves: Mutex<usize>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: KnownAppSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            saves: Mutex::new(0),
        }
    }

    pub fn current(&self) -> Option<KnownAppSnapshot> {
        self.snapshot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of times `save` has been called.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<KnownAppSnapshot>> {
        Ok(self.current())
    }

    async fn save(&self, snapshot: &KnownAppSnapshot) -> Result<()> {
        *self.snapshot.lock().unwrap_or_else(|e| e.into_inner()) = Some(snapshot.clone());
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}
