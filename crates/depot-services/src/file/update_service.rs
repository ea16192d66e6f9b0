//! Rename.
//!
//! Rename shares move's collision policy: a sibling with the same name
//! fails the operation loudly.

use uuid::Uuid;

use depot_core::models::{File, Permission};
use depot_core::AppError;

use crate::cache::FileCache;
use crate::file::sync::FileSync;
use crate::guard::FileGuard;

#[derive(Clone)]
pub struct FileUpdateService {
    file_cache: FileCache,
    file_guard: FileGuard,
    file_sync: FileSync,
}

impl FileUpdateService {
    pub fn new(file_cache: FileCache, file_guard: FileGuard, file_sync: FileSync) -> Self {
        Self {
            file_cache,
            file_guard,
            file_sync,
        }
    }

    #[tracing::instrument(skip(self, name), fields(file_id = %id, user_id = %user_id))]
    pub async fn rename(&self, id: Uuid, name: &str, user_id: Uuid) -> Result<File, AppError> {
        if name.is_empty() {
            return Err(AppError::InvalidInput("name must not be empty".to_string()));
        }
        let mut file = self.file_cache.get(id).await?;
        self.file_guard
            .authorize(user_id, &file, Permission::Editor)
            .await?;
        if let Some(parent_id) = file.parent_id {
            if let Some(existing) = self.file_sync.child_with_name(parent_id, name).await? {
                if existing.id != file.id {
                    return Err(AppError::FileWithSimilarNameExists(name.to_string()));
                }
            }
        }
        file.name = name.to_string();
        file.touch();
        self.file_sync.save_and_sync(&file).await?;
        Ok(file)
    }
}
