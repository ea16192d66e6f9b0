//! S3-compatible blob store implementation on `object_store`.
//!
//! Depot provisions one bucket per workspace while `object_store` binds a
//! client to a single bucket, so clients are built lazily per bucket and
//! cached.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::{Attribute, Attributes, Error as ObjectStoreError, ObjectStore, ObjectStoreExt, PutOptions, PutPayload};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::traits::{BlobStore, ObjectStat, StorageError, StorageResult};

#[derive(Clone)]
pub struct S3BlobStore {
    region: String,
    endpoint_url: Option<String>,
    stores: Arc<RwLock<HashMap<String, Arc<AmazonS3>>>>,
}

impl S3BlobStore {
    /// Create a new S3BlobStore.
    ///
    /// Credentials come from the environment (`AWS_ACCESS_KEY_ID`,
    /// `AWS_SECRET_ACCESS_KEY`); `endpoint_url` points at S3-compatible
    /// providers such as MinIO.
    pub fn new(region: String, endpoint_url: Option<String>) -> Self {
        Self {
            region,
            endpoint_url,
            stores: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn store_for_bucket(&self, bucket: &str) -> StorageResult<Arc<AmazonS3>> {
        {
            let stores = self.stores.read().await;
            if let Some(store) = stores.get(bucket) {
                return Ok(store.clone());
            }
        }

        let mut builder = AmazonS3Builder::from_env()
            .with_region(self.region.clone())
            .with_bucket_name(bucket.to_string());
        if let Some(ref endpoint) = self.endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }
        let store = Arc::new(
            builder
                .build()
                .map_err(|e| StorageError::ConfigError(e.to_string()))?,
        );

        let mut stores = self.stores.write().await;
        Ok(stores
            .entry(bucket.to_string())
            .or_insert(store)
            .clone())
    }

    fn map_error(kind: &str, key: &str, err: ObjectStoreError) -> StorageError {
        match err {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => StorageError::BackendError(format!("{}: {}", kind, other)),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    #[tracing::instrument(skip(self, data), fields(storage.key = %key, storage.bucket = %bucket, size = data.len()))]
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        bucket: &str,
    ) -> StorageResult<()> {
        let store = self.store_for_bucket(bucket).await?;
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };
        store
            .put_opts(&Path::from(key), PutPayload::from(data), options)
            .await
            .map_err(|e| StorageError::UploadFailed(format!("{}: {}", key, e)))?;
        Ok(())
    }

    async fn put_text(
        &self,
        key: &str,
        text: &str,
        content_type: &str,
        bucket: &str,
    ) -> StorageResult<()> {
        self.put_object(key, Bytes::from(text.to_string()), content_type, bucket)
            .await
    }

    #[tracing::instrument(skip(self), fields(storage.key = %key, storage.bucket = %bucket))]
    async fn get_object(&self, key: &str, bucket: &str) -> StorageResult<Bytes> {
        let store = self.store_for_bucket(bucket).await?;
        let result = store
            .get(&Path::from(key))
            .await
            .map_err(|e| Self::map_error("download", key, e))?;
        result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(format!("{}: {}", key, e)))
    }

    async fn get_text(&self, key: &str, bucket: &str) -> StorageResult<String> {
        let bytes = self.get_object(key, bucket).await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| StorageError::DownloadFailed(format!("{}: {}", key, e)))
    }

    #[tracing::instrument(skip(self), fields(storage.key = %key, storage.bucket = %bucket))]
    async fn remove_object(&self, key: &str, bucket: &str) -> StorageResult<()> {
        let store = self.store_for_bucket(bucket).await?;
        match store.delete(&Path::from(key)).await {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!("{}: {}", key, e))),
        }
    }

    #[tracing::instrument(skip(self), fields(storage.prefix = %prefix, storage.bucket = %bucket))]
    async fn remove_folder(&self, prefix: &str, bucket: &str) -> StorageResult<()> {
        let store = self.store_for_bucket(bucket).await?;
        let prefix_path = Path::from(prefix);
        let mut entries = store.list(Some(&prefix_path));
        while let Some(entry) = entries.next().await {
            let meta = entry.map_err(|e| Self::map_error("list", prefix, e))?;
            match store.delete(&meta.location).await {
                Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
                Err(e) => {
                    return Err(StorageError::DeleteFailed(format!(
                        "{}: {}",
                        meta.location, e
                    )))
                }
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(storage.key = %key, storage.bucket = %bucket))]
    async fn stat_object(&self, key: &str, bucket: &str) -> StorageResult<ObjectStat> {
        let store = self.store_for_bucket(bucket).await?;
        let meta = store
            .head(&Path::from(key))
            .await
            .map_err(|e| Self::map_error("stat", key, e))?;
        Ok(ObjectStat {
            size: meta.size as i64,
            last_modified: Some(meta.last_modified),
        })
    }
}
