use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use workbench_types::EntriesDocument;

use crate::host::EditorHost;
use crate::module::ModuleLoader;
use crate::registry::{LifecycleManager, ManagerOptions, ReloadReport};
use crate::state::{ScopedStateStore, StateScope};
use crate::values::ValueContext;

/// Process-wide runtime: the state store and the lifecycle manager for one host.
///
/// Build one at startup and call [`dispose`](Self::dispose) once on shutdown.
pub struct Runtime {
    host: Arc<dyn EditorHost>,
    state: Arc<ScopedStateStore>,
    manager: Arc<LifecycleManager>,
}

impl Runtime {
    pub fn new(
        host: Arc<dyn EditorHost>,
        loader: Arc<dyn ModuleLoader>,
        script_root: impl Into<PathBuf>,
    ) -> Self {
        Self::with_scope(host, loader, script_root, None)
    }

    /// Like [`new`](Self::new), with state cells kept in `scope` instead of the default scope.
    pub fn with_scope(
        host: Arc<dyn EditorHost>,
        loader: Arc<dyn ModuleLoader>,
        script_root: impl Into<PathBuf>,
        scope: Option<StateScope>,
    ) -> Self {
        let state = Arc::new(ScopedStateStore::new());
        let manager = LifecycleManager::new(
            host.clone(),
            loader,
            state.clone(),
            ManagerOptions {
                script_root: script_root.into(),
                state_scope: scope,
            },
        );

        Self {
            host,
            state,
            manager,
        }
    }

    pub fn host(&self) -> &Arc<dyn EditorHost> {
        &self.host
    }

    pub fn state(&self) -> &Arc<ScopedStateStore> {
        &self.state
    }

    pub fn manager(&self) -> &Arc<LifecycleManager> {
        &self.manager
    }

    pub fn set_values(&self, values: ValueContext) {
        self.manager.set_values(values);
    }

    pub async fn reload(&self, entries: &EntriesDocument) -> ReloadReport {
        self.manager.reload(entries).await
    }

    /// Releases every binding and the editor subscription.
    pub async fn dispose(self) {
        self.manager.dispose().await;
        info!("Runtime disposed");
    }
}
