//! Sync state machine
//!
//! Decides between initial and incremental sync, fetches the matching
//! window from the tracking API and folds the result into the cumulative
//! dataset.
//!
//! ## Persisted state
//!
//! - `awt_sync/.first_run_complete`: written once, after the first seed
//! - `awt_sync/.last_sync`: end of the last completed window
//! - `awt_data/awt_tracking_data_cumulative.json`: every record so far
//!
//! ## Known hazard
//!
//! The dataset is read, merged and rewritten without locking. Two runs
//! overlapping in time can lose one run's records.

mod cumulative;
mod engine;
mod records;
mod status;

pub use cumulative::{
    append_to_cumulative, is_empty_payload, merge_payloads, read_existing, record_count,
    AppendOutcome,
};
pub use engine::{
    determine_mode, SyncEngine, SyncMode, SyncOutcome, SyncReport, SyncSettings, SyncWindow,
};
pub use records::{
    format_timestamp, parse_timestamp, read_last_sync, read_marker, write_last_sync,
    write_marker, LastSync, SyncMarker,
};
pub use status::{inspect, SyncStatus};
