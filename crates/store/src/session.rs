//! Request handling for the app store view.

use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use workbench_types::{AppRef, ClientMessage, MergedAppEntry, ServerMessage, normalize_name};

use crate::catalog::CatalogLoader;
use crate::error::{Result, StoreError};
use crate::installer::{AppInstaller, AppListEvent, UninstallOutcome};
use crate::merge::merge_apps;
use crate::scanner::InstalledAppScanner;

/// Opens an installed app in the host, by its directory name.
#[async_trait]
pub trait AppOpener: Send + Sync {
    async fn open_app(&self, source: &str) -> std::result::Result<(), Box<dyn Error + Send + Sync>>;
}

/// Serves the store view: lists, installs, uninstalls and opens apps.
pub struct AppStoreSession {
    loader: Arc<CatalogLoader>,
    scanner: Arc<dyn InstalledAppScanner>,
    installer: Arc<AppInstaller>,
    opener: Arc<dyn AppOpener>,
    store_url: String,
}

impl AppStoreSession {
    pub fn new(
        loader: Arc<CatalogLoader>,
        scanner: Arc<dyn InstalledAppScanner>,
        installer: Arc<AppInstaller>,
        opener: Arc<dyn AppOpener>,
        store_url: impl Into<String>,
    ) -> Self {
        Self {
            loader,
            scanner,
            installer,
            opener,
            store_url: store_url.into(),
        }
    }

    /// Notifications to forward to the view whenever the installed set changes.
    pub fn updates(&self) -> AppListUpdates {
        AppListUpdates {
            receiver: self.installer.subscribe(),
        }
    }

    /// Handles one request. Returns the reply to post back, if any.
    pub async fn handle(&self, message: ClientMessage) -> Option<ServerMessage> {
        match message {
            ClientMessage::ReloadApps => Some(self.reload_apps().await),
            ClientMessage::InstallApp(app) | ClientMessage::UpgradeApp(app) => {
                Some(self.install_app(app).await)
            }
            ClientMessage::UninstallApp(app) => self.uninstall_app(app).await,
            ClientMessage::OpenApp(app) => {
                self.open_app(&app).await;
                None
            }
        }
    }

    /// Current merged inventory. Catalog failures are logged and the installed apps are
    /// still listed.
    pub async fn list_apps(&self) -> Result<Vec<MergedAppEntry>> {
        Ok(self.inventory().await?.0)
    }

    /// The merged inventory plus the catalog error, if the catalog could not be loaded.
    async fn inventory(&self) -> Result<(Vec<MergedAppEntry>, Option<StoreError>)> {
        let installed = self.scanner.installed_apps().await?;
        let (catalog, catalog_error) = match self.loader.load(&self.store_url, true).await {
            Ok(catalog) => (catalog.apps, None),
            Err(e) => {
                warn!(store = %self.store_url, error = %e, "Could not load app catalog");
                (Vec::new(), Some(e))
            }
        };
        Ok((merge_apps(&installed, &catalog), catalog_error))
    }

    async fn reload_apps(&self) -> ServerMessage {
        match self.inventory().await {
            Ok((apps, catalog_error)) => ServerMessage::AppsLoaded {
                success: true,
                apps: Some(apps),
                store: Some(self.store_url.clone()),
                error: catalog_error.map(|e| e.to_string()),
            },
            Err(e) => {
                error!(error = %e, "Listing apps failed");
                ServerMessage::AppsLoaded {
                    success: false,
                    apps: None,
                    store: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn install_app(&self, app: AppRef) -> ServerMessage {
        match self.installer.install(&app.source).await {
            Ok(_) => ServerMessage::AppInstalled {
                success: true,
                app,
                error: None,
            },
            Err(e) => {
                error!(app = %app.name, error = %e, "Installing app failed");
                ServerMessage::AppInstalled {
                    success: false,
                    app,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Rejected and unknown apps only produce the installer's warning, no reply.
    async fn uninstall_app(&self, app: AppRef) -> Option<ServerMessage> {
        let success = match self.installer.uninstall(&app).await {
            Ok(UninstallOutcome::Removed(_)) => true,
            Ok(UninstallOutcome::NotFound | UninstallOutcome::Rejected) => return None,
            Err(e) => {
                error!(app = %app.name, error = %e, "Uninstalling app failed");
                false
            }
        };
        Some(ServerMessage::AppUninstalled { success, app })
    }

    async fn open_app(&self, app: &AppRef) {
        let wanted = normalize_name(&app.source);
        let installed = match self.scanner.installed_apps().await {
            Ok(installed) => installed,
            Err(e) => {
                error!(error = %e, "Listing installed apps failed");
                return;
            }
        };

        let matches: Vec<_> = installed
            .iter()
            .filter(|i| normalize_name(&i.source) == wanted)
            .collect();
        if matches.is_empty() {
            warn!(app = %app.name, "App to open is not installed");
            return;
        }

        for found in matches {
            match self.opener.open_app(&found.source).await {
                Ok(()) => info!(app = %found.source, "Opened app"),
                Err(e) => error!(app = %found.source, error = %e, "Opening app failed"),
            }
        }
    }
}

/// Stream of `appListUpdated` notifications.
pub struct AppListUpdates {
    receiver: broadcast::Receiver<AppListEvent>,
}

impl AppListUpdates {
    /// Waits for the next change. Returns `None` once the installer is gone.
    pub async fn next(&mut self) -> Option<ServerMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(_) => return Some(ServerMessage::AppListUpdated),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StaticFetcher;
    use crate::scanner::DirectoryScanner;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const STORE: &str = "https://store.example.com/apps.json";

    #[derive(Default)]
    struct RecordingOpener {
        opened: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AppOpener for RecordingOpener {
        async fn open_app(
            &self,
            source: &str,
        ) -> std::result::Result<(), Box<dyn Error + Send + Sync>> {
            self.opened.lock().unwrap().push(source.to_string());
            Ok(())
        }
    }

    fn session(
        fetcher: StaticFetcher,
        dir: &std::path::Path,
        opener: Arc<RecordingOpener>,
    ) -> AppStoreSession {
        let fetcher = Arc::new(fetcher);
        AppStoreSession::new(
            Arc::new(CatalogLoader::new(fetcher.clone())),
            Arc::new(DirectoryScanner::new(dir)),
            Arc::new(AppInstaller::new(fetcher, dir)),
            opener,
            STORE,
        )
    }

    fn install_local(dir: &std::path::Path, name: &str) {
        std::fs::create_dir_all(dir.join(name)).unwrap();
        std::fs::write(
            dir.join(name).join("package.json"),
            json!({ "name": name }).to_string(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn reload_lists_installed_when_catalog_fails() {
        let temp_dir = TempDir::new().unwrap();
        install_local(temp_dir.path(), "hello");
        let fetcher = StaticFetcher::new().with_status(STORE, 503, "Service Unavailable");

        let reply = session(fetcher, temp_dir.path(), Default::default())
            .handle(ClientMessage::ReloadApps)
            .await;

        let Some(ServerMessage::AppsLoaded { success, apps, store, error }) = reply else {
            panic!("unexpected reply {reply:?}");
        };
        assert!(success);
        assert_eq!(store.as_deref(), Some(STORE));
        let error = error.unwrap();
        assert!(error.contains("503"), "{error}");
        let apps = apps.unwrap();
        assert_eq!(apps.len(), 1);
        assert!(apps[0].is_installed);
    }

    #[tokio::test]
    async fn reload_merges_catalog() {
        let temp_dir = TempDir::new().unwrap();
        install_local(temp_dir.path(), "hello");
        let fetcher = StaticFetcher::new().with_json(
            STORE,
            json!({ "apps": [
                { "name": "hello", "source": "https://x/hello.tgz" },
                { "name": "other", "source": "https://x/other.tgz" }
            ]}),
        );

        let reply = session(fetcher, temp_dir.path(), Default::default())
            .handle(ClientMessage::ReloadApps)
            .await;

        let Some(ServerMessage::AppsLoaded { apps, store, error, .. }) = reply else {
            panic!("unexpected reply {reply:?}");
        };
        let apps = apps.unwrap();
        assert_eq!(store.as_deref(), Some(STORE));
        assert_eq!(error, None);
        assert_eq!(apps.len(), 2);
        assert!(apps[0].is_installed);
        assert_eq!(apps[1].name, "other");
    }

    #[tokio::test]
    async fn failed_install_reports_error() {
        let temp_dir = TempDir::new().unwrap();
        let reply = session(StaticFetcher::new(), temp_dir.path(), Default::default())
            .handle(ClientMessage::InstallApp(AppRef {
                name: "x".into(),
                source: "https://x/missing.tgz".into(),
            }))
            .await;

        let Some(ServerMessage::AppInstalled { success, error, .. }) = reply else {
            panic!("unexpected reply {reply:?}");
        };
        assert!(!success);
        assert!(error.unwrap().contains("404"));
    }

    #[tokio::test]
    async fn uninstall_notifies_list_update() {
        let temp_dir = TempDir::new().unwrap();
        install_local(temp_dir.path(), "hello");
        let session = session(StaticFetcher::new(), temp_dir.path(), Default::default());
        let mut updates = session.updates();

        let reply = session
            .handle(ClientMessage::UninstallApp(AppRef {
                name: "hello".into(),
                source: "hello".into(),
            }))
            .await;

        assert!(matches!(
            reply,
            Some(ServerMessage::AppUninstalled { success: true, .. })
        ));
        assert_eq!(updates.next().await, Some(ServerMessage::AppListUpdated));
    }

    #[tokio::test]
    async fn open_matches_normalized_directory_name() {
        let temp_dir = TempDir::new().unwrap();
        install_local(temp_dir.path(), "hello");
        let opener = Arc::new(RecordingOpener::default());
        let session = session(StaticFetcher::new(), temp_dir.path(), opener.clone());

        let reply = session
            .handle(ClientMessage::OpenApp(AppRef {
                name: "Hello".into(),
                source: " HELLO ".into(),
            }))
            .await;

        assert_eq!(reply, None);
        assert_eq!(*opener.opened.lock().unwrap(), vec!["hello".to_string()]);
    }
}
