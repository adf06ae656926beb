//! Installing, upgrading and uninstalling apps in the managed apps directory.
//!
//! An app package is a gzip-compressed tarball whose root, or single top-level directory,
//! holds a `package.json`. The package is installed into `<apps dir>/<package name>`;
//! installing a package whose name is already present replaces the old copy.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use flate2::read::GzDecoder;
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use workbench_types::AppRef;

use crate::catalog::has_http_scheme;
use crate::error::{Result, StoreError};
use crate::http::HttpFetcher;
use crate::scanner::{PACKAGE_FILE, PackageManifest};

/// Change to the set of installed apps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppListEvent {
    Installed(String),
    Uninstalled(String),
}

/// Result of an uninstall request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UninstallOutcome {
    Removed(PathBuf),
    /// No app directory exists for the requested source.
    NotFound,
    /// The requested source resolves outside the apps directory.
    Rejected,
}

pub struct AppInstaller {
    fetcher: Arc<dyn HttpFetcher>,
    apps_dir: PathBuf,
    events: broadcast::Sender<AppListEvent>,
}

impl AppInstaller {
    pub fn new<P: AsRef<Path>>(fetcher: Arc<dyn HttpFetcher>, apps_dir: P) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            fetcher,
            apps_dir: lexical_normalize(apps_dir.as_ref()),
            events,
        }
    }

    pub fn apps_dir(&self) -> &Path {
        &self.apps_dir
    }

    /// Subscribes to install/uninstall notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<AppListEvent> {
        self.events.subscribe()
    }

    /// Downloads and installs the package at `source`.
    ///
    /// Sources without an `http://` or `https://` scheme are ignored and yield `Ok(None)`.
    pub async fn install(&self, source: &str) -> Result<Option<PathBuf>> {
        let source = source.trim();
        if !has_http_scheme(source) {
            debug!(source, "Ignoring install request for non-HTTP source");
            return Ok(None);
        }

        info!(source, "Downloading app");
        let response = self.fetcher.get(source, None).await?.ensure_success(source)?;

        fs::create_dir_all(&self.apps_dir).await?;
        let apps_dir = self.apps_dir.clone();
        let (name, dest) =
            tokio::task::spawn_blocking(move || unpack_package(&response.body, &apps_dir))
                .await
                .map_err(|e| StoreError::IoError(std::io::Error::other(e)))??;

        info!(app = %name, path = %dest.display(), "Installed app");
        let _ = self.events.send(AppListEvent::Installed(name));
        Ok(Some(dest))
    }

    /// Installs the package found in a local tarball.
    pub async fn install_from_bytes(&self, bytes: Vec<u8>) -> Result<PathBuf> {
        fs::create_dir_all(&self.apps_dir).await?;
        let apps_dir = self.apps_dir.clone();
        let (name, dest) = tokio::task::spawn_blocking(move || unpack_package(&bytes, &apps_dir))
            .await
            .map_err(|e| StoreError::IoError(std::io::Error::other(e)))??;

        let _ = self.events.send(AppListEvent::Installed(name));
        Ok(dest)
    }

    /// Removes the app directory named by `app.source`.
    ///
    /// Requests resolving outside the apps directory are rejected with a warning and
    /// nothing is deleted.
    pub async fn uninstall(&self, app: &AppRef) -> Result<UninstallOutcome> {
        let source = app.source.trim();
        if source.is_empty() {
            return Ok(UninstallOutcome::NotFound);
        }

        let app_dir = lexical_normalize(&self.apps_dir.join(source));
        if app_dir == self.apps_dir || !app_dir.starts_with(&self.apps_dir) {
            warn!(app = %app.name, source, "Refusing to uninstall app outside the apps directory");
            return Ok(UninstallOutcome::Rejected);
        }

        if !app_dir.is_dir() {
            warn!(app = %app.name, "Directory for app not found");
            return Ok(UninstallOutcome::NotFound);
        }

        fs::remove_dir_all(&app_dir)
            .await
            .map_err(|source| StoreError::IoOperation {
                operation: "uninstall app".to_string(),
                path: app_dir.clone(),
                source,
            })?;

        info!(app = %app.name, "App has been uninstalled");
        let _ = self.events.send(AppListEvent::Uninstalled(app.name.clone()));
        Ok(UninstallOutcome::Removed(app_dir))
    }
}

fn unpack_package(bytes: &[u8], apps_dir: &Path) -> Result<(String, PathBuf)> {
    let staging = tempfile::Builder::new()
        .prefix(".install-")
        .tempdir_in(apps_dir)?;
    let unpacked = staging.path().join("package");
    std::fs::create_dir_all(&unpacked)?;

    tar::Archive::new(GzDecoder::new(bytes))
        .unpack(&unpacked)
        .map_err(|e| StoreError::InvalidPackage {
            reason: format!("not a gzip tarball: {e}"),
        })?;

    let root = package_root(&unpacked)?;
    let content = std::fs::read_to_string(root.join(PACKAGE_FILE))?;
    let manifest: PackageManifest =
        serde_json::from_str(&content).map_err(|e| StoreError::InvalidPackage {
            reason: format!("invalid {PACKAGE_FILE}: {e}"),
        })?;

    let name = manifest
        .name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    validate_package_name(&name)?;

    let dest = apps_dir.join(&name);
    if dest.exists() {
        std::fs::remove_dir_all(&dest)?;
    }
    std::fs::rename(&root, &dest)?;
    Ok((name, dest))
}

fn package_root(unpacked: &Path) -> Result<PathBuf> {
    if unpacked.join(PACKAGE_FILE).is_file() {
        return Ok(unpacked.to_path_buf());
    }

    let children: Vec<PathBuf> = std::fs::read_dir(unpacked)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();

    match children.as_slice() {
        [only] if only.is_dir() && only.join(PACKAGE_FILE).is_file() => Ok(only.clone()),
        _ => Err(StoreError::InvalidPackage {
            reason: format!("no {PACKAGE_FILE} found"),
        }),
    }
}

fn validate_package_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StoreError::InvalidPackage {
            reason: "package name cannot be empty".to_string(),
        });
    }

    if name.contains("..") || name.contains('/') || name.contains('\\') || name.starts_with('.') {
        return Err(StoreError::InvalidPackage {
            reason: format!("package name '{name}' contains invalid path characters"),
        });
    }

    Ok(())
}

/// Resolves `.` and `..` components without touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}
