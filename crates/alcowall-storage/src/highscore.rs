//! Highscores with weekly and monthly rollover.
//!
//! The record is persisted as `highscores.json`:
//!
//! ```json
//! {
//!   "weekly_highscore": 0.42,
//!   "monthly_highscore": 0.42,
//!   "highscore": 1.3,
//!   "last_updated_week": 28,
//!   "last_updated_month": 7
//! }
//! ```
//!
//! Before any update the record rolls over: a weekly value from another ISO
//! week, or a monthly value from another month, is reset to zero. Updates
//! then merge by maximum, so applying the same value twice is a no-op.

use crate::error::StorageResult;
use alcowall_network::RemoteBackend;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Local highscore record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighscoreRecord {
    #[serde(rename = "weekly_highscore")]
    pub weekly: f64,
    #[serde(rename = "monthly_highscore")]
    pub monthly: f64,
    #[serde(rename = "highscore")]
    pub all_time: f64,
    /// ISO week number of the last update; 0 when unknown.
    pub last_updated_week: u32,
    /// Month (1-12) of the last update; 0 when unknown.
    pub last_updated_month: u32,
}

impl HighscoreRecord {
    /// Empty record for the current period.
    pub fn new(today: impl Datelike) -> Self {
        Self {
            last_updated_week: today.iso_week().week(),
            last_updated_month: today.month(),
            ..Self::default()
        }
    }

    /// Reset periodic values that belong to another week or month.
    ///
    /// Returns `true` if anything changed.
    pub fn roll_over(&mut self, today: impl Datelike) -> bool {
        let week = today.iso_week().week();
        let month = today.month();
        let mut changed = false;

        if self.last_updated_week != week {
            self.weekly = 0.0;
            self.last_updated_week = week;
            changed = true;
        }
        if self.last_updated_month != month {
            self.monthly = 0.0;
            self.last_updated_month = month;
            changed = true;
        }
        changed
    }

    /// Apply a local measurement. Returns `true` if any value rose.
    pub fn record(&mut self, level: f64, today: impl Datelike) -> bool {
        self.roll_over(today);
        if !level.is_finite() {
            return false;
        }

        let before = *self;
        self.weekly = self.weekly.max(level);
        self.monthly = self.monthly.max(level);
        self.all_time = self.all_time.max(level);
        *self != before
    }

    /// Merge the backend's global highscore.
    ///
    /// The remote value is adopted only when it exceeds the local all-time
    /// value, and then for all three fields. Returns `true` if adopted.
    pub fn merge_remote(&mut self, remote: f64, today: impl Datelike) -> bool {
        self.roll_over(today);
        if !remote.is_finite() || remote <= self.all_time {
            return false;
        }

        self.weekly = self.weekly.max(remote);
        self.monthly = self.monthly.max(remote);
        self.all_time = remote;
        true
    }
}

/// `highscores.json` on disk.
#[derive(Debug, Clone)]
pub struct HighscoreStore {
    path: PathBuf,
}

impl HighscoreStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record, starting fresh when the file is missing or unreadable.
    pub async fn load(&self, today: impl Datelike) -> StorageResult<HighscoreRecord> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(record) => Ok(record),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "corrupt highscore file, starting fresh");
                    Ok(HighscoreRecord::new(today))
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no highscore file, starting fresh");
                Ok(HighscoreRecord::new(today))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the record, replacing the file atomically.
    pub async fn save(&self, record: &HighscoreRecord) -> StorageResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(record)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Keeps the local record in step with measurements and the backend.
///
/// Invocations are serialized so the load-update-save cycles of a startup
/// reconcile and a measurement cannot interleave.
#[derive(Debug, Clone)]
pub struct HighscoreReconciler {
    store: HighscoreStore,
    lock: Arc<Mutex<()>>,
}

impl HighscoreReconciler {
    pub fn new(store: HighscoreStore) -> Self {
        Self {
            store,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &HighscoreStore {
        &self.store
    }

    /// Current record, rolled over to today. Not persisted.
    pub async fn current(&self, today: impl Datelike + Copy) -> StorageResult<HighscoreRecord> {
        let _guard = self.lock.lock().await;
        let mut record = self.store.load(today).await?;
        record.roll_over(today);
        Ok(record)
    }

    /// Apply a concluded measurement, then merge the global highscore.
    ///
    /// A failed fetch keeps the locally computed values. The record is
    /// persisted either way.
    pub async fn on_measurement<B: RemoteBackend>(
        &self,
        backend: &B,
        level: f64,
        today: impl Datelike + Copy + Send,
    ) -> StorageResult<HighscoreRecord> {
        let _guard = self.lock.lock().await;
        let mut record = self.store.load(today).await?;

        if record.record(level, today) {
            info!(level, all_time = record.all_time, "local highscore raised");
        }
        self.merge_global(backend, &mut record, today).await;

        self.store.save(&record).await?;
        Ok(record)
    }

    /// Merge the global highscore without a new measurement.
    pub async fn reconcile<B: RemoteBackend>(
        &self,
        backend: &B,
        today: impl Datelike + Copy + Send,
    ) -> StorageResult<HighscoreRecord> {
        let _guard = self.lock.lock().await;
        let mut record = self.store.load(today).await?;

        record.roll_over(today);
        self.merge_global(backend, &mut record, today).await;

        self.store.save(&record).await?;
        Ok(record)
    }

    async fn merge_global<B: RemoteBackend>(
        &self,
        backend: &B,
        record: &mut HighscoreRecord,
        today: impl Datelike + Copy + Send,
    ) {
        match backend.global_highscore().await {
            Ok(Some(remote)) => {
                if record.merge_remote(remote, today) {
                    info!(remote, "adopted global highscore");
                }
            }
            Ok(None) => debug!("backend has no global highscore"),
            Err(e) => warn!(error = %e, "global highscore unavailable, keeping local values"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alcowall_network::MockBackend;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rstest::rstest;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record_on(date: NaiveDate, weekly: f64, monthly: f64, all_time: f64) -> HighscoreRecord {
        HighscoreRecord {
            weekly,
            monthly,
            all_time,
            ..HighscoreRecord::new(date)
        }
    }

    #[rstest]
    // Same week and month
    #[case(day(2024, 7, 10), day(2024, 7, 11), 0.5, 0.5)]
    // Next ISO week, same month
    #[case(day(2024, 7, 10), day(2024, 7, 15), 0.0, 0.5)]
    // Same ISO week, next month
    #[case(day(2024, 7, 31), day(2024, 8, 1), 0.5, 0.0)]
    // Both
    #[case(day(2024, 7, 10), day(2024, 8, 20), 0.0, 0.0)]
    fn test_roll_over(
        #[case] updated: NaiveDate,
        #[case] today: NaiveDate,
        #[case] weekly: f64,
        #[case] monthly: f64,
    ) {
        let mut record = record_on(updated, 0.5, 0.5, 0.9);
        record.roll_over(today);

        assert_eq!(record.weekly, weekly);
        assert_eq!(record.monthly, monthly);
        assert_eq!(record.all_time, 0.9);
        assert_eq!(record.last_updated_week, today.iso_week().week());
        assert_eq!(record.last_updated_month, today.month());
    }

    #[test]
    fn test_record_after_rollover_starts_from_zero() {
        let mut record = record_on(day(2024, 7, 10), 0.8, 0.8, 0.8);
        assert!(record.record(0.3, day(2024, 7, 16)));

        assert_eq!(record.weekly, 0.3);
        assert_eq!(record.monthly, 0.8);
        assert_eq!(record.all_time, 0.8);
    }

    #[test]
    fn test_record_ignores_non_finite() {
        let today = day(2024, 7, 10);
        let mut record = HighscoreRecord::new(today);
        assert!(!record.record(f64::NAN, today));
        assert_eq!(record, HighscoreRecord::new(today));
    }

    #[test]
    fn test_merge_remote_only_above_all_time() {
        let today = day(2024, 7, 10);
        let mut record = record_on(today, 0.2, 0.4, 0.6);

        assert!(!record.merge_remote(0.5, today));
        assert_eq!(record, record_on(today, 0.2, 0.4, 0.6));

        assert!(record.merge_remote(1.1, today));
        assert_eq!(record, record_on(today, 1.1, 1.1, 1.1));
    }

    #[test]
    fn test_serialized_keys() {
        let record = record_on(day(2024, 7, 10), 0.1, 0.2, 0.3);
        let json = serde_json::to_value(record).unwrap();

        assert_eq!(json["weekly_highscore"], 0.1);
        assert_eq!(json["monthly_highscore"], 0.2);
        assert_eq!(json["highscore"], 0.3);
        assert_eq!(json["last_updated_week"], 28);
        assert_eq!(json["last_updated_month"], 7);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let record: HighscoreRecord = serde_json::from_str(r#"{"highscore": 2.5}"#).unwrap();
        assert_eq!(record.all_time, 2.5);
        assert_eq!(record.last_updated_week, 0);
    }

    fn date_strategy() -> impl Strategy<Value = NaiveDate> {
        (0i64..730).prop_map(|offset| day(2024, 1, 1) + chrono::Duration::days(offset))
    }

    proptest! {
        #[test]
        fn prop_record_is_idempotent(level in 0.0f64..5.0, date in date_strategy()) {
            let mut once = HighscoreRecord::default();
            once.record(level, date);
            let mut twice = once;
            twice.record(level, date);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_monotonic_within_period(
            levels in proptest::collection::vec(0.0f64..5.0, 1..20),
            date in date_strategy(),
        ) {
            let mut record = HighscoreRecord::new(date);
            for level in levels {
                let before = record;
                record.record(level, date);
                prop_assert!(record.weekly >= before.weekly);
                prop_assert!(record.monthly >= before.monthly);
                prop_assert!(record.all_time >= before.all_time);
            }
        }

        #[test]
        fn prop_all_time_never_decreases(
            steps in proptest::collection::vec((0.0f64..5.0, date_strategy(), any::<bool>()), 1..20),
        ) {
            let mut record = HighscoreRecord::default();
            for (value, date, remote) in steps {
                let before = record.all_time;
                if remote {
                    record.merge_remote(value, date);
                } else {
                    record.record(value, date);
                }
                prop_assert!(record.all_time >= before);
                prop_assert!(record.weekly <= record.all_time);
                prop_assert!(record.monthly <= record.all_time);
            }
        }
    }

    #[tokio::test]
    async fn test_store_missing_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = HighscoreStore::new(dir.path().join("highscores.json"));
        let today = day(2024, 7, 10);

        assert_eq!(store.load(today).await.unwrap(), HighscoreRecord::new(today));
    }

    #[tokio::test]
    async fn test_store_corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("highscores.json");
        std::fs::write(&path, "{not json").unwrap();
        let today = day(2024, 7, 10);

        let record = HighscoreStore::new(path).load(today).await.unwrap();
        assert_eq!(record, HighscoreRecord::new(today));
    }

    #[tokio::test]
    async fn test_store_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = HighscoreStore::new(dir.path().join("jsonFiles").join("highscores.json"));
        let today = day(2024, 7, 10);
        let record = record_on(today, 0.1, 0.2, 0.3);

        store.save(&record).await.unwrap();
        assert_eq!(store.load(today).await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_reconciler_keeps_local_when_offline() {
        let dir = tempfile::tempdir().unwrap();
        let reconciler = HighscoreReconciler::new(HighscoreStore::new(dir.path().join("h.json")));
        let backend = MockBackend::new();
        backend.set_offline(true);
        let today = day(2024, 7, 10);

        let record = reconciler.on_measurement(&backend, 0.7, today).await.unwrap();

        assert_eq!(record, record_on(today, 0.7, 0.7, 0.7));
        assert_eq!(reconciler.store().load(today).await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_reconciler_adopts_higher_global() {
        let dir = tempfile::tempdir().unwrap();
        let reconciler = HighscoreReconciler::new(HighscoreStore::new(dir.path().join("h.json")));
        let backend = MockBackend::new();
        backend.set_highscore(Some(2.0));
        let today = day(2024, 7, 10);

        let record = reconciler.on_measurement(&backend, 0.7, today).await.unwrap();
        assert_eq!(record, record_on(today, 2.0, 2.0, 2.0));
    }

    #[tokio::test]
    async fn test_reconciler_keeps_local_when_global_lower() {
        let dir = tempfile::tempdir().unwrap();
        let reconciler = HighscoreReconciler::new(HighscoreStore::new(dir.path().join("h.json")));
        let backend = MockBackend::new();
        backend.set_highscore(Some(0.5));
        let today = day(2024, 7, 10);

        let record = reconciler.on_measurement(&backend, 0.9, today).await.unwrap();
        assert_eq!(record, record_on(today, 0.9, 0.9, 0.9));
    }

    #[tokio::test]
    async fn test_reconcile_without_measurement_persists_rollover() {
        let dir = tempfile::tempdir().unwrap();
        let store = HighscoreStore::new(dir.path().join("h.json"));
        store
            .save(&record_on(day(2024, 7, 10), 0.4, 0.4, 0.4))
            .await
            .unwrap();
        let reconciler = HighscoreReconciler::new(store);

        let today = day(2024, 9, 2);
        let record = reconciler.reconcile(&MockBackend::new(), today).await.unwrap();

        assert_eq!(record, record_on(today, 0.0, 0.0, 0.4));
        assert_eq!(reconciler.store().load(today).await.unwrap(), record);
    }
}
