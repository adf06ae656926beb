//! Combining installed apps and catalog apps into one inventory.

use std::cmp::Ordering;

use workbench_types::{
    CatalogApp, InstalledApp, MergedAppEntry, non_empty, normalize_name, normalize_opt,
};

use crate::catalog::has_http_scheme;

/// Merges installed and catalog apps into a deduplicated, sorted list.
///
/// Entries are grouped by normalized name and each group is represented by its first
/// member, installed apps first. When a group has more than one catalog candidate, the
/// representative's `upgrade_source` points at the first of them. Catalog entries without a
/// name or source are dropped.
///
/// The result is ordered installed-first, then by display name, name, source and upgrade
/// source. The function is pure: equal inputs give equal outputs.
pub fn merge_apps(installed: &[InstalledApp], catalog: &[CatalogApp]) -> Vec<MergedAppEntry> {
    let candidates = installed
        .iter()
        .filter_map(from_installed)
        .chain(catalog.iter().filter_map(from_catalog));

    // Groups in order of first appearance.
    let mut groups: Vec<(String, Vec<MergedAppEntry>)> = Vec::new();
    for entry in candidates {
        let key = normalize_name(&entry.name);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(entry),
            None => groups.push((key, vec![entry])),
        }
    }

    let mut merged: Vec<MergedAppEntry> = groups
        .into_iter()
        .filter_map(|(_, members)| pick_representative(members))
        .collect();

    merged.sort_by(compare_entries);
    merged
}

fn pick_representative(mut members: Vec<MergedAppEntry>) -> Option<MergedAppEntry> {
    members.sort_by_key(|m| !m.is_installed);

    let store_sources: Vec<&str> = members
        .iter()
        .filter(|m| !m.is_installed && !m.source.is_empty())
        .map(|m| m.source.as_str())
        .collect();

    // A single catalog match is not reported as an upgrade.
    let upgrade = if store_sources.len() > 1 {
        Some(store_sources[0].to_string())
    } else {
        None
    };

    let mut representative = members.into_iter().next()?;
    representative.upgrade_source = upgrade.filter(|u| *u != representative.source);
    Some(representative)
}

fn from_installed(app: &InstalledApp) -> Option<MergedAppEntry> {
    let source = app.source.trim();
    let name = non_empty(app.name.as_deref()).or_else(|| non_empty(Some(source)))?;
    let display_name = non_empty(app.display_name.as_deref()).unwrap_or_else(|| name.clone());

    Some(MergedAppEntry {
        name,
        display_name,
        description: non_empty(app.description.as_deref()),
        details: non_empty(app.details.as_deref()),
        icon: non_empty(app.icon.as_deref()),
        is_installed: true,
        source: source.to_string(),
        upgrade_source: None,
    })
}

fn from_catalog(app: &CatalogApp) -> Option<MergedAppEntry> {
    let name = non_empty(Some(&app.name))?;
    let mut source = non_empty(Some(&app.source))?;
    if !has_http_scheme(&source) {
        source = format!("http://{source}");
    }
    let display_name = non_empty(app.display_name.as_deref()).unwrap_or_else(|| name.clone());

    Some(MergedAppEntry {
        name,
        display_name,
        description: non_empty(app.description.as_deref()),
        details: None,
        icon: non_empty(app.icon.as_deref()),
        is_installed: false,
        source,
        upgrade_source: None,
    })
}

fn compare_entries(a: &MergedAppEntry, b: &MergedAppEntry) -> Ordering {
    (!a.is_installed)
        .cmp(&!b.is_installed)
        .then_with(|| normalize_name(&a.display_name).cmp(&normalize_name(&b.display_name)))
        .then_with(|| normalize_name(&a.name).cmp(&normalize_name(&b.name)))
        .then_with(|| normalize_name(&a.source).cmp(&normalize_name(&b.source)))
        .then_with(|| {
            normalize_opt(a.upgrade_source.as_deref())
                .cmp(&normalize_opt(b.upgrade_source.as_deref()))
        })
}
