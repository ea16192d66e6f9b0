//! File and folder creation.

use std::sync::Arc;
use uuid::Uuid;

use depot_core::models::{File, FileType, Permission};
use depot_core::AppError;
use depot_db::FileRepo;
use depot_search::FileSearch;

use crate::cache::FileCache;
use crate::file::sync::FileSync;
use crate::guard::FileGuard;

#[derive(Debug, Clone)]
pub struct FileCreateOptions {
    pub workspace_id: Uuid,
    pub name: String,
    pub file_type: FileType,
    pub parent_id: Uuid,
}

#[derive(Clone)]
pub struct FileCreateService {
    file_repo: Arc<dyn FileRepo>,
    file_cache: FileCache,
    file_guard: FileGuard,
    file_search: FileSearch,
    file_sync: FileSync,
}

impl FileCreateService {
    pub fn new(
        file_repo: Arc<dyn FileRepo>,
        file_cache: FileCache,
        file_guard: FileGuard,
        file_search: FileSearch,
        file_sync: FileSync,
    ) -> Self {
        Self {
            file_repo,
            file_cache,
            file_guard,
            file_search,
            file_sync,
        }
    }

    /// Create a file or folder under a parent folder. Creating a name that
    /// already exists under the parent returns the existing node; creation
    /// is idempotent per (parent, name).
    #[tracing::instrument(skip(self, options), fields(user_id = %user_id))]
    pub async fn create(
        &self,
        options: FileCreateOptions,
        user_id: Uuid,
    ) -> Result<File, AppError> {
        self.validate_parent(options.parent_id, user_id).await?;
        if let Some(existing) = self
            .file_sync
            .child_with_name(options.parent_id, &options.name)
            .await?
        {
            return Ok(existing);
        }

        let file = File::new(options.workspace_id, options.name, options.file_type)
            .with_parent(options.parent_id);
        self.file_repo.insert(&file).await?;
        self.file_repo
            .grant_user_permission(file.id, user_id, Permission::Owner)
            .await?;
        let file = self.file_cache.refresh(file.id).await?;
        self.file_search.index(std::slice::from_ref(&file)).await?;
        Ok(file)
    }

    async fn validate_parent(&self, id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        let parent = self.file_cache.get(id).await?;
        self.file_guard
            .authorize(user_id, &parent, Permission::Editor)
            .await?;
        if !parent.is_folder() {
            return Err(AppError::FileIsNotAFolder(parent.id.to_string()));
        }
        Ok(())
    }
}
