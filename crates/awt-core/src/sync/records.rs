//! Persisted sync state records
//!
//! Small JSON documents stored next to the dataset:
//! - the first-run marker (`{"completed_at": ..., "status": "completed"}`)
//! - the last-sync timestamp (`{"last_sync_time": ...}`)
//!
//! Timestamps are written as RFC 3339 UTC. Older deployments wrote naive
//! ISO-8601 without an offset; those are read back as UTC.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::storage::keys::{JSON_CONTENT_TYPE, LAST_SYNC_KEY, MARKER_KEY};
use crate::storage::{BlobStore, StorageError, StorageResult};

/// Status string recorded in the marker
const COMPLETED: &str = "completed";

/// Marks that the initial sync has completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMarker {
    #[serde(with = "timestamp")]
    pub completed_at: DateTime<Utc>,
    pub status: String,
}

impl SyncMarker {
    pub fn completed(at: DateTime<Utc>) -> Self {
        Self {
            completed_at: at,
            status: COMPLETED.to_string(),
        }
    }
}

/// End of the most recently completed fetch window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastSync {
    #[serde(with = "timestamp")]
    pub last_sync_time: DateTime<Utc>,
}

/// Parse a stored timestamp, accepting RFC 3339 and offset-less ISO-8601
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Format a timestamp the way every record stores it
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

mod timestamp {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(*dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_timestamp(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", s)))
    }
}

/// Write the first-run marker
pub async fn write_marker(store: &dyn BlobStore, at: DateTime<Utc>) -> StorageResult<()> {
    write_record(store, MARKER_KEY, &SyncMarker::completed(at)).await
}

/// Write the last-sync timestamp
pub async fn write_last_sync(store: &dyn BlobStore, at: DateTime<Utc>) -> StorageResult<()> {
    write_record(store, LAST_SYNC_KEY, &LastSync { last_sync_time: at }).await
}

async fn write_record<T: Serialize>(
    store: &dyn BlobStore,
    key: &str,
    record: &T,
) -> StorageResult<()> {
    let body = serde_json::to_string(record).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.write_text(key, &body, JSON_CONTENT_TYPE).await
}

/// Read the last-sync timestamp
///
/// Absent, unreadable and malformed records all read as `None`.
pub async fn read_last_sync(store: &dyn BlobStore) -> Option<DateTime<Utc>> {
    let text = match store.read_text(LAST_SYNC_KEY).await {
        Ok(text) => text,
        Err(e) if e.is_not_found() => {
            debug!("No last sync time recorded");
            return None;
        }
        Err(e) => {
            warn!("Could not retrieve last sync time: {}", e);
            return None;
        }
    };

    match serde_json::from_str::<LastSync>(&text) {
        Ok(record) => Some(record.last_sync_time),
        Err(e) => {
            warn!("Ignoring malformed last sync record: {}", e);
            None
        }
    }
}

/// Read the first-run marker
///
/// Returns `None` when the marker is absent or cannot be parsed.
pub async fn read_marker(store: &dyn BlobStore) -> Option<SyncMarker> {
    let text = store.read_text(MARKER_KEY).await.ok()?;
    serde_json::from_str(&text).ok()
}
