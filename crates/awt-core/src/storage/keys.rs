//! Bucket-relative blob keys

use chrono::{DateTime, Utc};

/// Written once the first sync has seeded the dataset
pub const MARKER_KEY: &str = "awt_sync/.first_run_complete";

/// End of the most recently completed fetch window
pub const LAST_SYNC_KEY: &str = "awt_sync/.last_sync";

/// Full accumulated history of fetched records
pub const CUMULATIVE_KEY: &str = "awt_data/awt_tracking_data_cumulative.json";

/// Content type for every blob this crate writes
pub const JSON_CONTENT_TYPE: &str = "application/json";

const FALLBACK_PREFIX: &str = "awt_data/awt_tracking_data_incremental_";

/// Key for a standalone incremental file, used when merging fails
pub fn fallback_key(at: DateTime<Utc>) -> String {
    format!("{}{}.json", FALLBACK_PREFIX, at.format("%Y%m%d_%H%M%S"))
}
