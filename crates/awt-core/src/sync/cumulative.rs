//! Cumulative dataset maintenance
//!
//! The dataset is one JSON array holding every record ever fetched. New
//! records are appended after the existing ones; nothing is ever removed.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::storage::keys::{fallback_key, CUMULATIVE_KEY, JSON_CONTENT_TYPE};
use crate::storage::{BlobStore, StorageError, StorageResult};

/// Result of appending a payload to the dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Payload merged into the cumulative dataset
    Merged { total_records: usize, bytes: usize },
    /// Merge failed; payload written to its own file instead
    FallbackWritten { key: String, bytes: usize },
}

/// Check whether a payload carries no data
///
/// `null`, `false`, `0`, `""`, `[]` and `{}` are all treated as "nothing
/// returned".
pub fn is_empty_payload(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Number of records in a payload (a single value counts as one)
pub fn record_count(payload: &Value) -> usize {
    match payload {
        Value::Array(items) => items.len(),
        other if is_empty_payload(other) => 0,
        _ => 1,
    }
}

/// Merge new records after existing ones
///
/// Arrays contribute their elements, any other value contributes itself.
pub fn merge_payloads(existing: Value, incoming: Value) -> Vec<Value> {
    let mut merged = match existing {
        Value::Array(items) => items,
        other => vec![other],
    };
    match incoming {
        Value::Array(items) => merged.extend(items),
        other => merged.push(other),
    }
    merged
}

/// Serialize a payload the way the dataset is stored
pub fn to_dataset_json(value: &Value) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

/// Read the current dataset, substituting an empty one on any failure
pub async fn read_existing(store: &dyn BlobStore) -> Value {
    let text = match store.read_text(CUMULATIVE_KEY).await {
        Ok(text) => text,
        Err(e) if e.is_not_found() => {
            info!("No cumulative dataset yet, starting a new one");
            return Value::Array(Vec::new());
        }
        Err(e) => {
            warn!(
                "Could not read cumulative dataset, continuing with empty history: {}",
                e
            );
            return Value::Array(Vec::new());
        }
    };

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Null) => Value::Array(Vec::new()),
        Ok(value) => value,
        Err(e) => {
            warn!(
                "Cumulative dataset is not valid JSON, continuing with empty history: {}",
                e
            );
            Value::Array(Vec::new())
        }
    }
}

/// Append a payload to the cumulative dataset
///
/// Reading the existing dataset never fails this step. If the merged
/// dataset cannot be written, the payload is written to a timestamped
/// fallback file instead so the fetched data is not lost. Only a failure of
/// that fallback write is returned as an error.
pub async fn append_to_cumulative(
    store: &dyn BlobStore,
    payload: &Value,
    now: DateTime<Utc>,
) -> StorageResult<AppendOutcome> {
    let existing = read_existing(store).await;
    let merged = Value::Array(merge_payloads(existing, payload.clone()));
    let total_records = record_count(&merged);

    let failure = match to_dataset_json(&merged) {
        Ok(body) => match store
            .write_text(CUMULATIVE_KEY, &body, JSON_CONTENT_TYPE)
            .await
        {
            Ok(()) => {
                info!(
                    "Cumulative dataset now holds {} records ({} bytes)",
                    total_records,
                    body.len()
                );
                return Ok(AppendOutcome::Merged {
                    total_records,
                    bytes: body.len(),
                });
            }
            Err(e) => e.to_string(),
        },
        Err(e) => e.to_string(),
    };

    let key = fallback_key(now);
    warn!(
        "Failed to update cumulative dataset ({}); writing new data to {} instead",
        failure, key
    );

    let body = to_dataset_json(payload).map_err(|source| StorageError::Encode {
        key: key.clone(),
        source,
    })?;
    store.write_text(&key, &body, JSON_CONTENT_TYPE).await?;
    Ok(AppendOutcome::FallbackWritten {
        key,
        bytes: body.len(),
    })
}
