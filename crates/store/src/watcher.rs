//! Detecting apps that appeared in the catalog since the last check.
//!
//! The watcher keeps a snapshot of the app names it has seen. The first observation of a
//! catalog (or of a different catalog URL) only records a baseline. After that, once the
//! snapshot is at least `interval` whole days old, the catalog is reloaded and names missing
//! from the snapshot are reported as new.
//!
//! The read-decide-write cycle is not guarded against concurrent callers: two overlapping
//! checks may both report the same new app, or one may overwrite the other's snapshot.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::{debug, info, warn};
use workbench_types::{KnownAppSnapshot, normalize_name};

use crate::catalog::CatalogLoader;
use crate::error::Result;
use crate::snapshot::SnapshotStore;

/// Default minimum age of a snapshot before the catalog is checked again.
pub const DEFAULT_CHECK_INTERVAL_DAYS: i64 = 3;

pub struct NewAppWatcher {
    loader: Arc<CatalogLoader>,
    snapshots: Arc<dyn SnapshotStore>,
    store_url: String,
    interval: Duration,
}

impl NewAppWatcher {
    pub fn new(
        loader: Arc<CatalogLoader>,
        snapshots: Arc<dyn SnapshotStore>,
        store_url: impl Into<String>,
    ) -> Self {
        Self {
            loader,
            snapshots,
            store_url: store_url.into(),
            interval: Duration::days(DEFAULT_CHECK_INTERVAL_DAYS),
        }
    }

    pub fn with_interval_days(mut self, days: i64) -> Self {
        self.interval = Duration::days(days.max(0));
        self
    }

    pub fn store_url(&self) -> &str {
        &self.store_url
    }

    /// Returns the names of apps that are new since the last check.
    pub async fn check_for_new_apps(&self) -> Result<Vec<String>> {
        self.check_at(Utc::now()).await
    }

    /// Like [`check_for_new_apps`](Self::check_for_new_apps), but failures are logged and
    /// reported as "nothing new".
    pub async fn check_quietly(&self) -> Vec<String> {
        match self.check_for_new_apps().await {
            Ok(apps) => apps,
            Err(e) => {
                warn!(store = %self.store_url, error = %e, "Checking for new apps failed");
                Vec::new()
            }
        }
    }

    /// Runs a check as if the current time were `now`.
    pub async fn check_at(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let today = start_of_day(now);

        let known = match self.snapshots.load().await? {
            Some(known) if known.store == self.store_url => known,
            Some(known) => {
                info!(old = %known.store, new = %self.store_url, "Catalog changed, recording baseline");
                self.record_baseline(today).await?;
                return Ok(Vec::new());
            }
            None => {
                info!(store = %self.store_url, "No snapshot yet, recording baseline");
                self.record_baseline(today).await?;
                return Ok(Vec::new());
            }
        };

        let age = today.signed_duration_since(known.last_check);
        if age.num_days() < self.interval.num_days() {
            debug!(days = age.num_days(), "Snapshot is fresh, skipping check");
            return Ok(Vec::new());
        }

        let current = self.current_names().await?;
        let new_apps: Vec<String> = current
            .iter()
            .filter(|name| !known.apps.contains(name))
            .cloned()
            .collect();

        self.snapshots
            .save(&KnownAppSnapshot {
                apps: current,
                last_check: today,
                store: self.store_url.clone(),
            })
            .await?;

        if !new_apps.is_empty() {
            info!(count = new_apps.len(), "Found new apps");
        }
        Ok(new_apps)
    }

    async fn record_baseline(&self, today: DateTime<Utc>) -> Result<()> {
        let apps = self.current_names().await?;
        self.snapshots
            .save(&KnownAppSnapshot {
                apps,
                last_check: today,
                store: self.store_url.clone(),
            })
            .await
    }

    /// Distinct, sorted, normalized, non-empty app names of the catalog and its imports.
    async fn current_names(&self) -> Result<Vec<String>> {
        let catalog = self.loader.load(&self.store_url, true).await?;
        let names: BTreeSet<String> = catalog
            .apps
            .iter()
            .map(|a| normalize_name(&a.name))
            .filter(|n| !n.is_empty())
            .collect();
        Ok(names.into_iter().collect())
    }
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_time(chrono::NaiveTime::MIN);
    Utc.from_utc_datetime(&midnight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StaticFetcher;
    use crate::snapshot::MemorySnapshotStore;
    use serde_json::json;

    const STORE: &str = "https://store.example.com/apps.json";

    fn catalog(names: &[&str]) -> serde_json::Value {
        let apps: Vec<_> = names
            .iter()
            .map(|n| json!({ "name": n, "source": format!("https://x/{n}.tgz") }))
            .collect();
        json!({ "apps": apps })
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 15, 30, 0).unwrap()
    }

    fn watcher(
        fetcher: Arc<StaticFetcher>,
        snapshots: Arc<MemorySnapshotStore>,
    ) -> NewAppWatcher {
        NewAppWatcher::new(Arc::new(CatalogLoader::new(fetcher)), snapshots, STORE)
    }

    #[test]
    fn start_of_day_truncates_time() {
        assert_eq!(
            start_of_day(now()),
            Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn first_check_records_baseline_only() {
        let fetcher = Arc::new(StaticFetcher::new().with_json(STORE, catalog(&["Beta", "alpha", "beta", ""])));
        let snapshots = Arc::new(MemorySnapshotStore::new());

        let new_apps = watcher(fetcher, snapshots.clone()).check_at(now()).await.unwrap();

        assert!(new_apps.is_empty());
        let saved = snapshots.current().unwrap();
        assert_eq!(saved.apps, vec!["alpha", "beta"]);
        assert_eq!(saved.store, STORE);
        assert_eq!(saved.last_check, start_of_day(now()));
    }

    #[tokio::test]
    async fn different_store_resets_baseline() {
        let fetcher = Arc::new(StaticFetcher::new().with_json(STORE, catalog(&["a", "b"])));
        let snapshots = Arc::new(MemorySnapshotStore::with_snapshot(KnownAppSnapshot {
            apps: vec!["a".into()],
            last_check: now() - Duration::days(30),
            store: "https://other.example.com".into(),
        }));

        let new_apps = watcher(fetcher, snapshots.clone()).check_at(now()).await.unwrap();

        assert!(new_apps.is_empty());
        let saved = snapshots.current().unwrap();
        assert_eq!(saved.store, STORE);
        assert_eq!(saved.apps, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn stale_snapshot_reports_new_names() {
        let fetcher = Arc::new(StaticFetcher::new().with_json(STORE, catalog(&["a", "b", "NEW"])));
        let snapshots = Arc::new(MemorySnapshotStore::with_snapshot(KnownAppSnapshot {
            apps: vec!["a".into(), "b".into()],
            last_check: start_of_day(now()) - Duration::days(4),
            store: STORE.into(),
        }));

        let new_apps = watcher(fetcher, snapshots.clone()).check_at(now()).await.unwrap();

        assert_eq!(new_apps, vec!["new"]);
        let saved = snapshots.current().unwrap();
        assert_eq!(saved.apps, vec!["a", "b", "new"]);
        assert_eq!(saved.last_check, start_of_day(now()));
    }

    #[tokio::test]
    async fn fresh_snapshot_is_left_alone_without_network() {
        let fetcher = Arc::new(StaticFetcher::new().with_json(STORE, catalog(&["a", "b", "c"])));
        let original = KnownAppSnapshot {
            apps: vec!["a".into()],
            last_check: start_of_day(now()) - Duration::days(1),
            store: STORE.into(),
        };
        let snapshots = Arc::new(MemorySnapshotStore::with_snapshot(original.clone()));

        let new_apps = watcher(fetcher.clone(), snapshots.clone())
            .check_at(now())
            .await
            .unwrap();

        assert!(new_apps.is_empty());
        assert_eq!(snapshots.current(), Some(original));
        assert_eq!(snapshots.save_count(), 0);
        assert!(fetcher.requested_urls().is_empty());
    }

    #[tokio::test]
    async fn exactly_three_days_triggers_check() {
        let fetcher = Arc::new(StaticFetcher::new().with_json(STORE, catalog(&["a", "b"])));
        let snapshots = Arc::new(MemorySnapshotStore::with_snapshot(KnownAppSnapshot {
            apps: vec!["a".into()],
            last_check: start_of_day(now()) - Duration::days(3),
            store: STORE.into(),
        }));

        let new_apps = watcher(fetcher, snapshots).check_at(now()).await.unwrap();
        assert_eq!(new_apps, vec!["b"]);
    }

    #[tokio::test]
    async fn quiet_check_swallows_network_failure() {
        let fetcher = Arc::new(StaticFetcher::new().with_status(STORE, 500, "Internal Server Error"));
        let snapshots = Arc::new(MemorySnapshotStore::new());

        let new_apps = watcher(fetcher, snapshots.clone()).check_quietly().await;

        assert!(new_apps.is_empty());
        assert_eq!(snapshots.current(), None);
    }
}
