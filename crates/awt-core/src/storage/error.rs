//! Storage error handling
//!
//! Typed errors for blob operations, keyed by the blob that failed.

use std::io;
use thiserror::Error;

/// Errors that can occur during blob storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Blob does not exist (when expected to)
    #[error("Blob not found: '{key}'")]
    NotFound { key: String },

    /// Existence check failed
    #[error("Failed to check '{key}': {source}")]
    Head {
        key: String,
        #[source]
        source: object_store::Error,
    },

    /// Failed to read blob
    #[error("Failed to read '{key}': {source}")]
    Read {
        key: String,
        #[source]
        source: object_store::Error,
    },

    /// Failed to write blob
    #[error("Failed to write '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: object_store::Error,
    },

    /// Blob content is not text
    #[error("Blob '{key}' is not valid UTF-8: {source}")]
    InvalidText {
        key: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// Content could not be serialized for writing
    #[error("Failed to encode '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Backend could not be constructed
    #[error("Invalid storage configuration: {0}")]
    InvalidConfig(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    /// Classify a read failure, mapping the backend's not-found to `NotFound`
    pub fn from_read(error: object_store::Error, key: &str) -> Self {
        match error {
            object_store::Error::NotFound { .. } => StorageError::NotFound {
                key: key.to_string(),
            },
            source => StorageError::Read {
                key: key.to_string(),
                source,
            },
        }
    }

    /// Check if this error means the blob is simply absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let err = object_store::Error::NotFound {
            path: "awt_sync/.last_sync".to_string(),
            source: "missing".into(),
        };
        let err = StorageError::from_read(err, "awt_sync/.last_sync");

        assert!(err.is_not_found());
        assert!(err.to_string().contains("awt_sync/.last_sync"));
    }

    #[test]
    fn test_other_errors_stay_read_errors() {
        let err = object_store::Error::Generic {
            store: "test",
            source: "connection reset".into(),
        };
        let err = StorageError::from_read(err, "awt_data/x.json");

        assert!(!err.is_not_found());
        assert!(matches!(err, StorageError::Read { .. }));
        assert!(err.to_string().contains("awt_data/x.json"));
    }
}
