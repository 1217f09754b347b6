//! Read-only view of the persisted sync state

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::cumulative::record_count;
use super::engine::{determine_mode, SyncMode};
use super::records::{read_last_sync, read_marker};
use crate::storage::keys::CUMULATIVE_KEY;
use crate::storage::Storage;

/// Snapshot of what the next run will see
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    /// Where blobs are stored, if anywhere
    pub location: Option<String>,
    /// Why storage is disabled, if it is
    pub unavailable_reason: Option<String>,
    /// Mode the next run would take
    pub next_mode: SyncMode,
    /// When the initial sync completed
    pub first_run_completed_at: Option<DateTime<Utc>>,
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Records in the cumulative dataset, if it could be read
    pub cumulative_records: Option<usize>,
}

/// Inspect the persisted state without writing anything
pub async fn inspect(storage: &Storage) -> SyncStatus {
    let next_mode = determine_mode(storage).await;

    let Some(store) = storage.store() else {
        return SyncStatus {
            location: None,
            unavailable_reason: storage.unavailable_reason().map(str::to_string),
            next_mode,
            first_run_completed_at: None,
            last_sync_time: None,
            cumulative_records: None,
        };
    };

    let cumulative_records = store
        .read_text(CUMULATIVE_KEY)
        .await
        .ok()
        .and_then(|text| serde_json::from_str::<Value>(&text).ok())
        .map(|value| record_count(&value));

    SyncStatus {
        location: Some(store.location()),
        unavailable_reason: None,
        next_mode,
        first_run_completed_at: read_marker(store).await.map(|m| m.completed_at),
        last_sync_time: read_last_sync(store).await,
        cumulative_records,
    }
}
