//! In-memory blob store for tests.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::traits::{BlobStore, ObjectStat, StorageError, StorageResult};

#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    objects: Arc<Mutex<HashMap<(String, String), (Bytes, String)>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects across all buckets.
    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str, bucket: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&(bucket.to_string(), key.to_string()))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        bucket: &str,
    ) -> StorageResult<()> {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            (data, content_type.to_string()),
        );
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

    async fn get_object(&self, key: &str, bucket: &str) -> StorageResult<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(data, _)| data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn get_text(&self, key: &str, bucket: &str) -> StorageResult<String> {
        let bytes = self.get_object(key, bucket).await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| StorageError::DownloadFailed(format!("{}: {}", key, e)))
    }

    async fn remove_object(&self, key: &str, bucket: &str) -> StorageResult<()> {
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn remove_folder(&self, prefix: &str, bucket: &str) -> StorageResult<()> {
        let normalized = format!("{}/", prefix.trim_end_matches('/'));
        self.objects
            .lock()
            .unwrap()
            .retain(|(b, k), _| !(b == bucket && (k.starts_with(&normalized) || k == prefix)));
        Ok(())
    }

    async fn stat_object(&self, key: &str, bucket: &str) -> StorageResult<ObjectStat> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(data, _)| ObjectStat {
                size: data.len() as i64,
                last_modified: Some(Utc::now()),
            })
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_remove() {
        let store = MemoryBlobStore::new();
        store
            .put_text("s1/text.txt", "hello", "text/plain", "bucket")
            .await
            .unwrap();
        assert_eq!(store.get_text("s1/text.txt", "bucket").await.unwrap(), "hello");
        assert_eq!(store.stat_object("s1/text.txt", "bucket").await.unwrap().size, 5);

        store.remove_object("s1/text.txt", "bucket").await.unwrap();
        assert!(matches!(
            store.get_object("s1/text.txt", "bucket").await,
            Err(StorageError::NotFound(_))
        ));
        // Idempotent
        store.remove_object("s1/text.txt", "bucket").await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_folder_deletes_prefix_only() {
        let store = MemoryBlobStore::new();
        store
            .put_text("s1/mosaic/0/0.png", "a", "image/png", "bucket")
            .await
            .unwrap();
        store
            .put_text("s1/mosaic/0/1.png", "b", "image/png", "bucket")
            .await
            .unwrap();
        store
            .put_text("s1/original.png", "c", "image/png", "bucket")
            .await
            .unwrap();

        store.remove_folder("s1/mosaic", "bucket").await.unwrap();
        assert!(!store.contains("s1/mosaic/0/0.png", "bucket"));
        assert!(!store.contains("s1/mosaic/0/1.png", "bucket"));
        assert!(store.contains("s1/original.png", "bucket"));
    }
}
