//! Shared write-through helper for file mutations.
//!
//! Foreground mutation paths persist to the store, then refresh the cache
//! and the search index before returning, giving the mutating caller
//! read-after-write consistency.

use std::sync::Arc;
use uuid::Uuid;

use depot_core::models::File;
use depot_core::AppError;
use depot_db::FileRepo;
use depot_search::FileSearch;

use crate::cache::FileCache;

#[derive(Clone)]
pub struct FileSync {
    file_repo: Arc<dyn FileRepo>,
    file_cache: FileCache,
    file_search: FileSearch,
}

impl FileSync {
    pub fn new(file_repo: Arc<dyn FileRepo>, file_cache: FileCache, file_search: FileSearch) -> Self {
        Self {
            file_repo,
            file_cache,
            file_search,
        }
    }

    /// Push an already-persisted file into cache and search.
    pub async fn sync(&self, file: &File) -> Result<(), AppError> {
        self.file_cache.set(file).await;
        self.file_search.update(std::slice::from_ref(file)).await?;
        Ok(())
    }

    /// Persist, then sync.
    pub async fn save_and_sync(&self, file: &File) -> Result<(), AppError> {
        self.file_repo.save(file).await?;
        self.sync(file).await
    }

    /// Sibling lookup used by every name-collision check.
    pub async fn child_with_name(
        &self,
        parent_id: Uuid,
        name: &str,
    ) -> Result<Option<File>, AppError> {
        self.file_repo.find_child_with_name(parent_id, name).await
    }
}
