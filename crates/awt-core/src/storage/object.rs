//! Object storage backend (Google Cloud Storage / local filesystem / memory)

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};

use super::error::{StorageError, StorageResult};
use super::BlobStore;

/// Blob store backed by any `object_store` implementation
#[derive(Debug, Clone)]
pub struct ObjectBlobStore {
    inner: Arc<dyn ObjectStore>,
    location: String,
    /// Whether the backend accepts content-type attributes on put
    content_types: bool,
}

impl ObjectBlobStore {
    /// Connect to a Google Cloud Storage bucket
    ///
    /// Credentials come from the standard environment
    /// (`GOOGLE_APPLICATION_CREDENTIALS`, `GOOGLE_SERVICE_ACCOUNT`, ...).
    pub fn gcs(bucket: &str) -> StorageResult<Self> {
        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| StorageError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(store),
            location: format!("gs://{}", bucket),
            content_types: true,
        })
    }

    /// Use a local directory as the bucket
    pub async fn local(path: &Path) -> StorageResult<Self> {
        tokio::fs::create_dir_all(path).await?;
        let store = LocalFileSystem::new_with_prefix(path)
            .map_err(|e| StorageError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(store),
            location: path.display().to_string(),
            // LocalFileSystem rejects put attributes
            content_types: false,
        })
    }

    /// In-memory store (tests and dry runs)
    pub fn memory() -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
            location: "memory://".to_string(),
            content_types: true,
        }
    }

    fn object_path(key: &str) -> ObjectPath {
        ObjectPath::from(key)
    }
}

#[async_trait]
impl BlobStore for ObjectBlobStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.inner.head(&Self::object_path(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(source) => Err(StorageError::Head {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn read_text(&self, key: &str) -> StorageResult<String> {
        let result = self
            .inner
            .get(&Self::object_path(key))
            .await
            .map_err(|e| StorageError::from_read(e, key))?;
        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::from_read(e, key))?;

        String::from_utf8(bytes.to_vec()).map_err(|source| StorageError::InvalidText {
            key: key.to_string(),
            source,
        })
    }

    async fn write_text(&self, key: &str, content: &str, content_type: &str) -> StorageResult<()> {
        let mut attributes = Attributes::new();
        if self.content_types {
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
        }
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        let payload = PutPayload::from(Bytes::from(content.to_string()));
        self.inner
            .put_opts(&Self::object_path(key), payload, opts)
            .await
            .map_err(|source| StorageError::Write {
                key: key.to_string(),
                source,
            })?;
        Ok(())
    }

    fn location(&self) -> String {
        self.location.clone()
    }
}
