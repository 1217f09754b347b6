//! Storage layer
//!
//! Blob storage for sync state and the tracking dataset.
//!
//! ## Architecture
//!
//! - **BlobStore**: existence check, read-as-text and write-as-text for
//!   named blobs under one bucket
//! - **ObjectBlobStore**: `object_store` backed implementation (GCS, local
//!   directory, memory)
//! - **Storage**: whether a store could be reached at all. Decided once at
//!   startup; an unavailable store disables persistence for the run instead
//!   of failing it.

mod error;
pub mod keys;
mod object;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::Config;

pub use error::{StorageError, StorageResult};
pub use object::ObjectBlobStore;

/// Named-blob storage under a single bucket
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Check whether a blob exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Read a blob as UTF-8 text
    ///
    /// Returns `StorageError::NotFound` if the blob is absent.
    async fn read_text(&self, key: &str) -> StorageResult<String>;

    /// Write a blob, replacing any previous content
    async fn write_text(&self, key: &str, content: &str, content_type: &str) -> StorageResult<()>;

    /// Human-readable location for log lines (e.g. `gs://bucket`)
    fn location(&self) -> String;
}

/// Storage availability, resolved once per run
pub enum Storage {
    /// A reachable store
    Available(Box<dyn BlobStore>),
    /// Persistence is disabled for this run
    Unavailable { reason: String },
}

impl Storage {
    /// Wrap an already constructed store
    pub fn available(store: impl BlobStore + 'static) -> Self {
        Storage::Available(Box::new(store))
    }

    /// Mark storage as unavailable
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Storage::Unavailable {
            reason: reason.into(),
        }
    }

    /// Build the configured backend and check that it can be reached
    ///
    /// Backend selection:
    /// 1. `storage_dir` set: local directory
    /// 2. `gcs_bucket` and `gcs_project_id` set: Google Cloud Storage
    /// 3. otherwise: unavailable
    ///
    /// Never fails; every problem becomes `Storage::Unavailable`.
    pub async fn connect(config: &Config) -> Self {
        let store = if let Some(ref dir) = config.storage_dir {
            ObjectBlobStore::local(dir).await
        } else {
            match (
                config.gcs_bucket.as_deref().filter(|s| !s.is_empty()),
                config.gcs_project_id.as_deref().filter(|s| !s.is_empty()),
            ) {
                (Some(bucket), Some(project)) => {
                    debug!("Using GCS bucket {} in project {}", bucket, project);
                    ObjectBlobStore::gcs(bucket)
                }
                _ => {
                    let reason = "GCS_BUCKET_NAME and GCS_PROJECT_ID are not both set";
                    warn!("Storage disabled: {}", reason);
                    return Self::unavailable(reason);
                }
            }
        };

        match store {
            Ok(store) => Self::probe(store).await,
            Err(e) => {
                warn!("Storage disabled: could not initialize backend: {}", e);
                Self::unavailable(e.to_string())
            }
        }
    }

    /// Confirm the store answers requests before relying on it
    async fn probe(store: ObjectBlobStore) -> Self {
        match store.exists(keys::MARKER_KEY).await {
            Ok(_) => {
                info!("Storage available at {}", store.location());
                Self::available(store)
            }
            Err(e) => {
                warn!(
                    "Storage disabled: {} is not reachable: {}",
                    store.location(),
                    e
                );
                Self::unavailable(e.to_string())
            }
        }
    }

    /// The store, if available
    pub fn store(&self) -> Option<&dyn BlobStore> {
        match self {
            Storage::Available(store) => Some(store.as_ref()),
            Storage::Unavailable { .. } => None,
        }
    }

    /// Check if persistence is enabled
    pub fn is_available(&self) -> bool {
        matches!(self, Storage::Available(_))
    }

    /// Why storage is unavailable, if it is
    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            Storage::Available(_) => None,
            Storage::Unavailable { reason } => Some(reason),
        }
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Storage::Available(store) => f
                .debug_tuple("Available")
                .field(&store.location())
                .finish(),
            Storage::Unavailable { reason } => f
                .debug_struct("Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}
