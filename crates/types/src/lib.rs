//! Shared data model for workbench.
//!
//! These types describe the wire formats exchanged with remote catalogs, the persisted
//! new-app snapshot, the user-facing entry configuration and the presentation message
//! protocol. They carry no behavior beyond (de)serialization and small normalization helpers.

pub mod app;
pub mod catalog;
pub mod entry;
pub mod message;
pub mod snapshot;

mod serde_util;

pub use app::{InstalledApp, MergedAppEntry};
pub use catalog::{AppOrigin, Catalog, CatalogApp};
pub use entry::{
    AppEntrySpec, ButtonSpec, EntriesDocument, Entry, PlatformCondition, VisibilityCondition,
};
pub use message::{AppRef, ClientMessage, ServerMessage};
pub use snapshot::KnownAppSnapshot;

/// Folds a name into the form used for grouping and comparison.
///
/// The folded form is a lookup key only; it is never displayed.
pub fn normalize_name(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Same as [`normalize_name`] but treats `None` as the empty string.
pub fn normalize_opt(value: Option<&str>) -> String {
    value.map(normalize_name).unwrap_or_default()
}

/// Trims `value` and turns an empty result into `None`.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
