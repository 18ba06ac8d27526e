use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use parking_lot::RwLock;
use pdfchunk_core::{ServiceConfig, StorageBackendKind};
use tracing::info;

use crate::error::StorageError;

#[derive(Debug, Clone)]
enum Backend {
    /// Each bucket is a directory under `root`.
    Local { root: PathBuf },
    S3 {
        region: String,
        endpoint: Option<String>,
    },
    Memory,
}

/// Bucket-addressed document storage over `object_store`.
///
/// Bucket handles are created lazily and cached for the life of the value.
#[derive(Clone)]
pub struct DocumentStorage {
    backend: Backend,
    buckets: Arc<RwLock<HashMap<String, Arc<dyn ObjectStore>>>>,
}

impl DocumentStorage {
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self::with_backend(Backend::Local { root: root.into() })
    }

    pub fn memory() -> Self {
        Self::with_backend(Backend::Memory)
    }

    pub fn s3(region: impl Into<String>, endpoint: Option<String>) -> Self {
        Self::with_backend(Backend::S3 {
            region: region.into(),
            endpoint,
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        match config.storage_backend {
            StorageBackendKind::Local => Self::local(config.storage_root.clone()),
            StorageBackendKind::S3 => Self::s3(config.aws_region.clone(), config.s3_endpoint.clone()),
            StorageBackendKind::Memory => Self::memory(),
        }
    }

    fn with_backend(backend: Backend) -> Self {
        Self {
            backend,
            buckets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Local { .. } => "local",
            Backend::S3 { .. } => "s3",
            Backend::Memory => "memory",
        }
    }

    pub fn bucket(&self, name: &str) -> Result<Arc<dyn ObjectStore>, StorageError> {
        if let Some(store) = self.buckets.read().get(name) {
            return Ok(store.clone());
        }

        let store = self.open_bucket(name)?;
        let mut guard = self.buckets.write();
        Ok(guard.entry(name.to_string()).or_insert(store).clone())
    }

    fn open_bucket(&self, name: &str) -> Result<Arc<dyn ObjectStore>, StorageError> {
        if name.trim().is_empty() {
            return Err(StorageError::NotConfigured("bucket name is empty".to_string()));
        }

        match &self.backend {
            Backend::Local { root } => {
                let dir = root.join(name);
                std::fs::create_dir_all(&dir)?;
                let store = LocalFileSystem::new_with_prefix(&dir)?;
                info!(bucket = name, path = %dir.display(), "opened local bucket");
                Ok(Arc::new(store))
            }
            Backend::S3 { region, endpoint } => {
                let mut builder = AmazonS3Builder::from_env()
                    .with_region(region)
                    .with_bucket_name(name);

                if let Some(endpoint) = endpoint {
                    // object_store requires an absolute endpoint URL
                    let endpoint_url =
                        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
                            endpoint.clone()
                        } else {
                            format!("https://{}", endpoint)
                        };
                    builder = builder
                        .with_endpoint(&endpoint_url)
                        .with_allow_http(endpoint_url.starts_with("http://"));
                }

                let store = builder.build()?;
                info!(bucket = name, region = %region, "opened s3 bucket");
                Ok(Arc::new(store))
            }
            Backend::Memory => Ok(Arc::new(InMemory::new())),
        }
    }

    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        let store = self.bucket(bucket)?;
        let result = store.get(&ObjectPath::from(key)).await?;
        Ok(result.bytes().await?)
    }

    pub async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<(), StorageError> {
        let store = self.bucket(bucket)?;
        store
            .put(&ObjectPath::from(key), PutPayload::from(body))
            .await?;
        Ok(())
    }

    /// Writes a UTF-8 text object, tagging it `text/plain` where the backend keeps attributes.
    pub async fn put_text(&self, bucket: &str, key: &str, body: &str) -> Result<(), StorageError> {
        let store = self.bucket(bucket)?;
        let payload = PutPayload::from(Bytes::from(body.to_string()));

        // The local filesystem backend rejects object attributes.
        let options = match self.backend {
            Backend::Local { .. } => PutOptions::default(),
            Backend::S3 { .. } | Backend::Memory => {
                let mut attributes = Attributes::new();
                attributes.insert(Attribute::ContentType, "text/plain".into());
                PutOptions {
                    attributes,
                    ..Default::default()
                }
            }
        };

        store
            .put_opts(&ObjectPath::from(key), payload, options)
            .await?;
        Ok(())
    }
}
