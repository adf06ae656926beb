//! Discovering the apps installed in the managed apps directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs;
use tracing::debug;
use workbench_types::InstalledApp;

use crate::error::Result;

pub const PACKAGE_FILE: &str = "package.json";
const README_FILE: &str = "README.md";
const ICON_FILE: &str = "icon.png";

/// Source of the installed-app list.
#[async_trait]
pub trait InstalledAppScanner: Send + Sync {
    async fn installed_apps(&self) -> Result<Vec<InstalledApp>>;
}

/// Manifest fields read from an app's `package.json`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl PackageManifest {
    pub(crate) async fn read(dir: &Path) -> Result<Self> {
        let content = fs::read_to_string(dir.join(PACKAGE_FILE)).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Treats every sub-directory of the apps directory holding a `package.json` as an app.
///
/// The directory name is the app's local source. Unreadable manifests, readmes and icons
/// leave the corresponding fields empty instead of failing the scan.
pub struct DirectoryScanner {
    apps_dir: PathBuf,
}

impl DirectoryScanner {
    pub fn new<P: AsRef<Path>>(apps_dir: P) -> Self {
        Self {
            apps_dir: apps_dir.as_ref().to_path_buf(),
        }
    }

    async fn scan_app(&self, dir: &Path, source: String) -> InstalledApp {
        let manifest = PackageManifest::read(dir).await.unwrap_or_else(|e| {
            debug!(dir = %dir.display(), error = %e, "Unreadable package manifest");
            PackageManifest::default()
        });

        let details = fs::read_to_string(dir.join(README_FILE)).await.ok();
        let icon_path = dir.join(ICON_FILE);
        let icon = icon_path
            .is_file()
            .then(|| icon_path.to_string_lossy().to_string());

        InstalledApp {
            name: manifest.name,
            display_name: manifest.display_name,
            description: manifest.description,
            details,
            icon,
            source,
        }
    }
}

#[async_trait]
impl InstalledAppScanner for DirectoryScanner {
    async fn installed_apps(&self) -> Result<Vec<InstalledApp>> {
        if !self.apps_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut apps = Vec::new();
        let mut entries = fs::read_dir(&self.apps_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_dir() || !path.join(PACKAGE_FILE).is_file() {
                continue;
            }
            let source = entry.file_name().to_string_lossy().to_string();
            apps.push(self.scan_app(&path, source).await);
        }

        apps.sort_by(|a, b| a.source.cmp(&b.source));
        Ok(apps)
    }
}
