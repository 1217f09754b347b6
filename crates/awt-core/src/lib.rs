//! AWT Sync Core Library
//!
//! Pulls wildlife tracking data from the Africa Wildlife Tracking API and
//! keeps a cumulative copy of it in cloud object storage.
//!
//! # Architecture
//!
//! - **API client**: token auth plus one date-ranged data request
//! - **Blob store**: GCS (or a local directory) behind a small trait
//! - **Sync engine**: first-run vs. incremental decision and cumulative
//!   append with a fallback file
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let client = AwtClient::new(config.api_credentials()?, config.request_timeout())?;
//! let storage = Storage::connect(&config).await;
//!
//! let report = SyncEngine::new(client, storage).run().await?;
//! ```
//!
//! # Modules
//!
//! - `config`: Application configuration
//! - `api`: Tracking API client
//! - `storage`: Blob storage adapter
//! - `sync`: Sync state machine
//! - `error`: Run-level errors

pub mod api;
pub mod config;
pub mod error;
pub mod storage;
pub mod sync;

pub use api::{ApiError, AwtClient, TrackingSource};
pub use config::{ApiCredentials, Config, ConfigError};
pub use error::SyncError;
pub use storage::{BlobStore, ObjectBlobStore, Storage, StorageError};
pub use sync::{SyncEngine, SyncMode, SyncOutcome, SyncReport, SyncSettings, SyncStatus};
