//! Fetching and parsing remote app catalogs.
//!
//! A catalog may list further catalogs under `imports`. Imports are expanded at most one
//! level deep and at most [`MAX_IMPORTS`] of them are followed, so a cyclic or hostile
//! import graph costs at most `1 + MAX_IMPORTS` requests.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use workbench_types::Catalog;

use crate::error::{Result, StoreError};
use crate::http::HttpFetcher;

/// Timeout applied to every catalog request.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum number of distinct import URLs followed per catalog.
pub const MAX_IMPORTS: usize = 5;

/// Catalog used when none is configured.
pub const DEFAULT_STORE_URL: &str = "https://store.workbench.dev/apps.json";

/// Normalizes a configured catalog URL.
///
/// Blank values fall back to [`DEFAULT_STORE_URL`]; values without an `http://` or
/// `https://` scheme get `http://` prepended.
pub fn resolve_store_url(configured: Option<&str>) -> String {
    let url = configured.map(str::trim).unwrap_or_default();
    if url.is_empty() {
        return DEFAULT_STORE_URL.to_string();
    }

    if has_http_scheme(url) {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}

pub(crate) fn has_http_scheme(value: &str) -> bool {
    let lower = value.to_lowercase();
    lower.starts_with("https://") || lower.starts_with("http://")
}

pub struct CatalogLoader {
    fetcher: Arc<dyn HttpFetcher>,
}

impl CatalogLoader {
    pub fn new(fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self { fetcher }
    }

    /// Loads the catalog at `url`.
    ///
    /// With `resolve_imports`, the apps of each imported catalog are appended after the
    /// catalog's own apps, in import order. Imported catalogs are never expanded further and
    /// an import that fails to load is skipped.
    pub async fn load(&self, url: &str, resolve_imports: bool) -> Result<Catalog> {
        let mut catalog = self.fetch(url).await?;
        info!(url, apps = catalog.apps.len(), "Loaded catalog");

        if !resolve_imports {
            return Ok(catalog);
        }

        // One request at a time.
        for import in import_urls(&catalog) {
            match self.fetch(&import).await {
                Ok(sub) => {
                    debug!(url = %import, apps = sub.apps.len(), "Loaded imported catalog");
                    catalog.apps.extend(sub.apps);
                }
                Err(e) => {
                    warn!(url = %import, error = %e, "Skipping imported catalog");
                }
            }
        }

        Ok(catalog)
    }

    async fn fetch(&self, url: &str) -> Result<Catalog> {
        let response = self
            .fetcher
            .get(url, Some(FETCH_TIMEOUT))
            .await?
            .ensure_success(url)?;

        let catalog: Option<Catalog> =
            serde_json::from_slice(&response.body).map_err(|source| StoreError::Parse {
                url: url.to_string(),
                source,
            })?;

        let mut catalog = catalog.unwrap_or_default();
        catalog.attach_origin(url);
        Ok(catalog)
    }
}

/// The import URLs a catalog load will follow: trimmed, non-empty, first occurrence of
/// each, limited to [`MAX_IMPORTS`].
pub fn import_urls(catalog: &Catalog) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for import in &catalog.imports {
        let import = import.trim();
        if import.is_empty() || urls.iter().any(|u| u == import) {
            continue;
        }
        urls.push(import.to_string());
        if urls.len() == MAX_IMPORTS {
            break;
        }
    }
    urls
}
