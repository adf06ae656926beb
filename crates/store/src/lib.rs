//! Workbench Store - app catalogs and the managed apps directory
//!
//! This crate fetches remote app catalogs, merges them with the apps installed on disk,
//! notices apps that were added to a catalog since the last check, and installs or removes
//! app packages.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use workbench_store::{CatalogLoader, DirectoryScanner, InstalledAppScanner, ReqwestFetcher, merge_apps};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = CatalogLoader::new(Arc::new(ReqwestFetcher::new()));
//! let catalog = loader.load("https://store.workbench.dev/apps.json", true).await?;
//!
//! let installed = DirectoryScanner::new("./apps").installed_apps().await?;
//! for app in merge_apps(&installed, &catalog.apps) {
//!     println!("{} ({})", app.display_name, app.source);
//! }
//! # Ok(())
//! # }
//! ```
pub mod catalog;
pub mod error;
pub mod http;
pub mod installer;
pub mod merge;
pub mod scanner;
pub mod session;
pub mod snapshot;
pub mod watcher;

pub use catalog::{CatalogLoader, DEFAULT_STORE_URL, FETCH_TIMEOUT, MAX_IMPORTS, resolve_store_url};
pub use error::{Result, StoreError};
pub use http::{HttpFetcher, HttpResponse, ReqwestFetcher, StaticFetcher};
pub use installer::{AppInstaller, AppListEvent, UninstallOutcome};
pub use merge::merge_apps;
pub use scanner::{DirectoryScanner, InstalledAppScanner};
pub use session::{AppListUpdates, AppOpener, AppStoreSession};
pub use snapshot::{JsonSnapshotStore, KEY_KNOWN_APPS, MemorySnapshotStore, SnapshotStore};
pub use watcher::{DEFAULT_CHECK_INTERVAL_DAYS, NewAppWatcher};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
