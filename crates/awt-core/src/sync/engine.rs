//! Sync state machine
//!
//! ```text
//! UNINITIALIZED --initial sync--> READY --incremental sync--> READY
//! ```
//!
//! Each run performs exactly one transition. The first-run marker decides
//! which: no marker (or no reachable storage) means initial sync.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::cumulative::{
    append_to_cumulative, is_empty_payload, record_count, to_dataset_json, AppendOutcome,
};
use super::records::{read_last_sync, write_last_sync, write_marker};
use crate::api::TrackingSource;
use crate::config::{Config, ConfigError};
use crate::error::SyncError;
use crate::storage::keys::{CUMULATIVE_KEY, JSON_CONTENT_TYPE, MARKER_KEY};
use crate::storage::{BlobStore, Storage, StorageError};

/// Which sync a run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// No marker yet: pull the initial window and seed the dataset
    Initial,
    /// Marker present: pull everything since the last sync
    Incremental,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Initial => write!(f, "initial"),
            SyncMode::Incremental => write!(f, "incremental"),
        }
    }
}

/// Time range requested from the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SyncWindow {
    pub fn start_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.date_naive()
    }
}

/// What a run ended up persisting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// API returned nothing; no state changed
    NoData,
    /// Data fetched but storage is unavailable
    StorageDisabled,
    /// Initial sync wrote the dataset
    Seeded { key: String, bytes: usize },
    /// Incremental sync merged into the dataset
    Appended {
        key: String,
        total_records: usize,
        bytes: usize,
    },
    /// Incremental sync wrote a standalone file after the merge failed
    FallbackWritten { key: String, bytes: usize },
}

/// Summary of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub window: SyncWindow,
    pub records_fetched: usize,
    pub outcome: SyncOutcome,
}

impl SyncReport {
    /// Bytes of tracking data written by this run
    pub fn bytes_persisted(&self) -> usize {
        match &self.outcome {
            SyncOutcome::NoData | SyncOutcome::StorageDisabled => 0,
            SyncOutcome::Seeded { bytes, .. }
            | SyncOutcome::Appended { bytes, .. }
            | SyncOutcome::FallbackWritten { bytes, .. } => *bytes,
        }
    }
}

/// Window sizes for the two sync modes
#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    /// Days pulled by the initial sync
    pub initial_window_days: u32,
    /// Lookback when the last-sync timestamp is missing
    pub incremental_fallback_hours: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            initial_window_days: 90,
            incremental_fallback_hours: 24,
        }
    }
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial_window_days: config.initial_window_days,
            incremental_fallback_hours: config.incremental_fallback_hours,
        }
    }
}

/// Decide between initial and incremental sync
///
/// Fails open: unavailable storage or a failed existence check both mean
/// initial sync.
pub async fn determine_mode(storage: &Storage) -> SyncMode {
    let Some(store) = storage.store() else {
        return SyncMode::Initial;
    };

    match store.exists(MARKER_KEY).await {
        Ok(true) => SyncMode::Incremental,
        Ok(false) => SyncMode::Initial,
        Err(e) => {
            warn!("Could not check first-run marker, assuming first run: {}", e);
            SyncMode::Initial
        }
    }
}

/// Drives one sync run against a tracking source and a storage backend
pub struct SyncEngine<S: TrackingSource> {
    source: S,
    storage: Storage,
    settings: SyncSettings,
}

impl<S: TrackingSource> SyncEngine<S> {
    pub fn new(source: S, storage: Storage) -> Self {
        Self {
            source,
            storage,
            settings: SyncSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub async fn determine_mode(&self) -> SyncMode {
        determine_mode(&self.storage).await
    }

    /// Run one sync now
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        self.run_at(Utc::now()).await
    }

    /// Run one sync as of `now`
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<SyncReport, SyncError> {
        info!("Starting AWT data sync...");

        let report = match self.determine_mode().await {
            SyncMode::Initial => {
                info!(
                    "Performing initial {}-day data sync...",
                    self.settings.initial_window_days
                );
                self.run_initial_sync(now).await?
            }
            SyncMode::Incremental => {
                info!("Performing incremental sync...");
                self.run_incremental_sync(now).await?
            }
        };

        info!("AWT data sync completed successfully");
        Ok(report)
    }

    /// Pull the initial window and seed the cumulative dataset
    ///
    /// The marker and timestamp are written only after the dataset write
    /// succeeded, so a failed seed leaves the bucket looking uninitialized.
    pub async fn run_initial_sync(&self, now: DateTime<Utc>) -> Result<SyncReport, SyncError> {
        let window = SyncWindow {
            start: lookback(
                now,
                Duration::days(i64::from(self.settings.initial_window_days)),
                "initial_window_days",
                self.settings.initial_window_days,
            )?,
            end: now,
        };
        let payload = self.fetch(&window).await?;

        let mut report = SyncReport {
            mode: SyncMode::Initial,
            window,
            records_fetched: record_count(&payload),
            outcome: SyncOutcome::NoData,
        };

        if is_empty_payload(&payload) {
            warn!("No data received from API");
            return Ok(report);
        }

        let Some(store) = self.persisting_store(report.records_fetched) else {
            report.outcome = SyncOutcome::StorageDisabled;
            return Ok(report);
        };

        let body = to_dataset_json(&payload).map_err(|source| StorageError::Encode {
            key: CUMULATIVE_KEY.to_string(),
            source,
        })?;
        store
            .write_text(CUMULATIVE_KEY, &body, JSON_CONTENT_TYPE)
            .await?;
        info!(
            "Seeded cumulative dataset with {} records ({} bytes)",
            report.records_fetched,
            body.len()
        );

        write_marker(store, now).await?;
        write_last_sync(store, now).await?;

        report.outcome = SyncOutcome::Seeded {
            key: CUMULATIVE_KEY.to_string(),
            bytes: body.len(),
        };
        Ok(report)
    }

    /// Pull everything since the last sync and append it to the dataset
    pub async fn run_incremental_sync(&self, now: DateTime<Utc>) -> Result<SyncReport, SyncError> {
        let last_sync = match self.storage.store() {
            Some(store) => read_last_sync(store).await,
            None => None,
        };
        let start = match last_sync {
            Some(start) => start,
            None => {
                info!(
                    "No last sync time found, falling back to the last {} hours",
                    self.settings.incremental_fallback_hours
                );
                lookback(
                    now,
                    Duration::hours(i64::from(self.settings.incremental_fallback_hours)),
                    "incremental_fallback_hours",
                    self.settings.incremental_fallback_hours,
                )?
            }
        };
        let window = SyncWindow { start, end: now };
        let payload = self.fetch(&window).await?;

        let mut report = SyncReport {
            mode: SyncMode::Incremental,
            window,
            records_fetched: record_count(&payload),
            outcome: SyncOutcome::NoData,
        };

        if is_empty_payload(&payload) {
            info!("No new data available");
            return Ok(report);
        }

        let Some(store) = self.persisting_store(report.records_fetched) else {
            report.outcome = SyncOutcome::StorageDisabled;
            return Ok(report);
        };

        report.outcome = match append_to_cumulative(store, &payload, now).await? {
            AppendOutcome::Merged {
                total_records,
                bytes,
            } => SyncOutcome::Appended {
                key: CUMULATIVE_KEY.to_string(),
                total_records,
                bytes,
            },
            AppendOutcome::FallbackWritten { key, bytes } => {
                warn!("New data saved to fallback file {}", key);
                SyncOutcome::FallbackWritten { key, bytes }
            }
        };

        write_last_sync(store, now).await?;
        Ok(report)
    }

    async fn fetch(&self, window: &SyncWindow) -> Result<Value, SyncError> {
        info!(
            "Fetching data from {} to {}",
            window.start_date(),
            window.end_date()
        );
        Ok(self
            .source
            .fetch(Some(window.start_date()), Some(window.end_date()))
            .await?)
    }

    /// The store to persist into, logging when there is none
    fn persisting_store(&self, records: usize) -> Option<&dyn BlobStore> {
        let store = self.storage.store();
        if store.is_none() {
            warn!(
                "Storage unavailable ({}); {} fetched records were not persisted",
                self.storage.unavailable_reason().unwrap_or("unknown reason"),
                records
            );
        }
        store
    }
}

/// Start of a window reaching `span` back from `now`
fn lookback(
    now: DateTime<Utc>,
    span: Duration,
    setting: &str,
    value: u32,
) -> Result<DateTime<Utc>, SyncError> {
    now.checked_sub_signed(span).ok_or_else(|| {
        ConfigError::InvalidValue {
            var: setting.to_string(),
            value: value.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::storage::keys::LAST_SYNC_KEY;
    use crate::storage::ObjectBlobStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::Mutex;

    /// Returns a fixed payload and records the requested ranges
    struct FixedSource {
        payload: Value,
        calls: Mutex<Vec<(Option<NaiveDate>, Option<NaiveDate>)>>,
    }

    impl FixedSource {
        fn new(payload: Value) -> Self {
            Self {
                payload,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TrackingSource for FixedSource {
        async fn fetch(
            &self,
            start: Option<NaiveDate>,
            end: Option<NaiveDate>,
        ) -> Result<Value, ApiError> {
            self.calls.lock().unwrap().push((start, end));
            Ok(self.payload.clone())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 10, 6, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_mode_initial_without_storage() {
        let storage = Storage::unavailable("not configured");
        assert_eq!(determine_mode(&storage).await, SyncMode::Initial);
    }

    #[tokio::test]
    async fn test_mode_ignores_last_sync_without_marker() {
        let store = ObjectBlobStore::memory();
        write_last_sync(&store, now()).await.unwrap();

        let storage = Storage::available(store);
        assert_eq!(determine_mode(&storage).await, SyncMode::Initial);
    }

    #[tokio::test]
    async fn test_initial_window_is_ninety_days() {
        let engine = SyncEngine::new(
            FixedSource::new(json!([{"id": 1}])),
            Storage::available(ObjectBlobStore::memory()),
        );

        let report = engine.run_at(now()).await.unwrap();
        assert_eq!(report.mode, SyncMode::Initial);
        assert_eq!(report.window.start, now() - Duration::days(90));

        let calls = engine.source.calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            &[(Some(date(2024, 1, 11)), Some(date(2024, 4, 10)))]
        );
    }

    #[tokio::test]
    async fn test_initial_sync_writes_dataset_marker_and_timestamp() {
        let store = ObjectBlobStore::memory();
        let engine = SyncEngine::new(
            FixedSource::new(json!([{"id": 1}, {"id": 2}])),
            Storage::available(store.clone()),
        );

        let report = engine.run_at(now()).await.unwrap();
        assert_eq!(report.records_fetched, 2);
        assert!(matches!(report.outcome, SyncOutcome::Seeded { .. }));
        assert!(report.bytes_persisted() > 0);

        let dataset: Value =
            serde_json::from_str(&store.read_text(CUMULATIVE_KEY).await.unwrap()).unwrap();
        assert_eq!(dataset, json!([{"id": 1}, {"id": 2}]));
        assert!(store.exists(MARKER_KEY).await.unwrap());
        assert_eq!(read_last_sync(&store).await, Some(now()));
    }

    #[tokio::test]
    async fn test_initial_sync_without_storage_succeeds() {
        let engine = SyncEngine::new(
            FixedSource::new(json!([{"id": 1}])),
            Storage::unavailable("not configured"),
        );

        let report = engine.run_at(now()).await.unwrap();
        assert_eq!(report.outcome, SyncOutcome::StorageDisabled);
        assert_eq!(report.bytes_persisted(), 0);
    }

    #[tokio::test]
    async fn test_incremental_uses_fallback_hours_without_timestamp() {
        let store = ObjectBlobStore::memory();
        write_marker(&store, now()).await.unwrap();

        let engine = SyncEngine::new(
            FixedSource::new(json!([])),
            Storage::available(store.clone()),
        )
        .with_settings(SyncSettings {
            initial_window_days: 90,
            incremental_fallback_hours: 48,
        });

        let report = engine.run_at(now()).await.unwrap();
        assert_eq!(report.mode, SyncMode::Incremental);
        assert_eq!(report.window.start, now() - Duration::hours(48));
        assert_eq!(report.outcome, SyncOutcome::NoData);
        assert!(!store.exists(LAST_SYNC_KEY).await.unwrap());
    }

    #[tokio::test]
    async fn test_incremental_single_record_payload() {
        let store = ObjectBlobStore::memory();
        write_marker(&store, now()).await.unwrap();
        store
            .write_text(CUMULATIVE_KEY, "[1, 2]", JSON_CONTENT_TYPE)
            .await
            .unwrap();

        let engine = SyncEngine::new(
            FixedSource::new(json!({"id": 3})),
            Storage::available(store.clone()),
        );

        let report = engine.run_at(now()).await.unwrap();
        assert_eq!(report.records_fetched, 1);
        assert!(matches!(
            report.outcome,
            SyncOutcome::Appended {
                total_records: 3,
                ..
            }
        ));

        let dataset: Value =
            serde_json::from_str(&store.read_text(CUMULATIVE_KEY).await.unwrap()).unwrap();
        assert_eq!(dataset, json!([1, 2, {"id": 3}]));
    }

    #[tokio::test]
    async fn test_oversized_initial_window_is_config_error() {
        let engine = SyncEngine::new(
            FixedSource::new(json!([{"id": 1}])),
            Storage::unavailable("not configured"),
        )
        .with_settings(SyncSettings {
            initial_window_days: u32::MAX,
            incremental_fallback_hours: 24,
        });

        let err = engine.run_at(now()).await.unwrap_err();
        assert_eq!(err.step(), "configuration");
        assert!(err.to_string().contains("initial_window_days"));
        assert!(engine.source.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_fallback_lookback_is_config_error() {
        let store = ObjectBlobStore::memory();
        write_marker(&store, now()).await.unwrap();

        let engine = SyncEngine::new(
            FixedSource::new(json!([{"id": 1}])),
            Storage::available(store.clone()),
        )
        .with_settings(SyncSettings {
            initial_window_days: 90,
            incremental_fallback_hours: u32::MAX,
        });

        let err = engine.run_at(now()).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Config(ConfigError::InvalidValue { .. })
        ));
        assert!(engine.source.calls.lock().unwrap().is_empty());
        assert!(!store.exists(CUMULATIVE_KEY).await.unwrap());
    }
}
