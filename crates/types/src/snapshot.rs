use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Names of the apps seen the last time a catalog was checked.
///
/// Always replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownAppSnapshot {
    /// Normalized app names, sorted and deduplicated.
    pub apps: Vec<String>,
    pub last_check: DateTime<Utc>,
    /// URL of the catalog the names were read from.
    pub store: String,
}
