//! Run-level errors
//!
//! Everything here aborts a sync run. Degraded-but-successful paths
//! (storage disabled, unreadable history, fallback file) are logged instead
//! and never reach this type.

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::storage::StorageError;

/// Fatal errors of a sync run
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration is incomplete or unreadable
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Could not obtain an API token
    #[error(transparent)]
    Auth(ApiError),

    /// Could not fetch tracking data
    #[error(transparent)]
    Fetch(ApiError),

    /// A required storage write failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ApiError> for SyncError {
    fn from(error: ApiError) -> Self {
        if error.is_auth() {
            SyncError::Auth(error)
        } else {
            SyncError::Fetch(error)
        }
    }
}

impl SyncError {
    /// Name of the step that failed, for the final log line
    pub fn step(&self) -> &'static str {
        match self {
            SyncError::Config(_) => "configuration",
            SyncError::Auth(_) => "authentication",
            SyncError::Fetch(_) => "fetch",
            SyncError::Storage(_) => "storage",
        }
    }
}
