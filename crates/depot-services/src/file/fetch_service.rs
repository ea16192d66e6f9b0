//! File lookup: by id, by path, and authorized children listings.

use std::sync::Arc;
use uuid::Uuid;

use depot_core::models::{File, Permission};
use depot_core::AppError;
use depot_db::FileRepo;
use depot_search::FileSearch;

use crate::cache::FileCache;
use crate::guard::FileGuard;

#[derive(Clone)]
pub struct FileFetchService {
    file_repo: Arc<dyn FileRepo>,
    file_cache: FileCache,
    file_guard: FileGuard,
    file_search: FileSearch,
}

impl FileFetchService {
    pub fn new(
        file_repo: Arc<dyn FileRepo>,
        file_cache: FileCache,
        file_guard: FileGuard,
        file_search: FileSearch,
    ) -> Self {
        Self {
            file_repo,
            file_cache,
            file_guard,
            file_search,
        }
    }

    /// Resolve a set of ids. Missing ids are skipped; an id the caller
    /// cannot view fails the whole lookup with not-found.
    pub async fn find(&self, ids: &[Uuid], user_id: Uuid) -> Result<Vec<File>, AppError> {
        let mut result = Vec::new();
        for &id in ids {
            let file = match self.file_cache.get(id).await {
                Ok(file) => file,
                Err(AppError::FileNotFound(_)) => continue,
                Err(err) => return Err(err),
            };
            self.file_guard
                .authorize(user_id, &file, Permission::Viewer)
                .await?;
            result.push(file);
        }
        Ok(result)
    }

    /// Root-to-node path, requiring viewer on the node itself.
    pub async fn find_path(&self, id: Uuid, user_id: Uuid) -> Result<Vec<File>, AppError> {
        let file = self.file_cache.get(id).await?;
        self.file_guard
            .authorize(user_id, &file, Permission::Viewer)
            .await?;
        self.file_repo.find_path(id).await
    }

    /// Children the caller can see. Unauthorized entries are filtered, not
    /// errors; their existence stays hidden.
    pub async fn find_children(&self, id: Uuid, user_id: Uuid) -> Result<Vec<File>, AppError> {
        let folder = self.file_cache.get(id).await?;
        self.file_guard
            .authorize(user_id, &folder, Permission::Viewer)
            .await?;
        let mut result = Vec::new();
        for child in self.file_repo.find_children(id).await? {
            if self
                .file_guard
                .is_authorized(user_id, &child, Permission::Viewer)
                .await
            {
                result.push(child);
            }
        }
        Ok(result)
    }

    /// Workspace-scoped text search, viewer-filtered.
    pub async fn query(
        &self,
        text: &str,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<File>, AppError> {
        let ids = self.file_search.query(text, workspace_id).await?;
        let mut result = Vec::new();
        for id in ids {
            let file = match self.file_cache.get(id).await {
                Ok(file) => file,
                // The index may briefly reference deleted files.
                Err(AppError::FileNotFound(_)) => continue,
                Err(err) => return Err(err),
            };
            if self
                .file_guard
                .is_authorized(user_id, &file, Permission::Viewer)
                .await
            {
                result.push(file);
            }
        }
        Ok(result)
    }
}
