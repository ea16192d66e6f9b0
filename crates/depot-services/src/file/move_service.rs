//! Subtree move.
//!
//! Move is a directed placement: a single parent-pointer update guarded by
//! cycle and collision checks. Unlike copy, a destination name collision
//! fails loudly; nothing is ever silently renamed.

use std::sync::Arc;
use uuid::Uuid;

use depot_core::models::{File, Permission, Task, TaskStatus};
use depot_core::AppError;
use depot_db::FileRepo;

use crate::cache::FileCache;
use crate::file::sync::FileSync;
use crate::guard::FileGuard;
use crate::task_service::TaskService;

#[derive(Debug, Clone, Default)]
pub struct FileMoveManyResult {
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<Uuid>,
}

#[derive(Clone)]
pub struct FileMoveService {
    file_repo: Arc<dyn FileRepo>,
    file_cache: FileCache,
    file_guard: FileGuard,
    file_sync: FileSync,
    task_service: TaskService,
}

impl FileMoveService {
    pub fn new(
        file_repo: Arc<dyn FileRepo>,
        file_cache: FileCache,
        file_guard: FileGuard,
        file_sync: FileSync,
        task_service: TaskService,
    ) -> Self {
        Self {
            file_repo,
            file_cache,
            file_guard,
            file_sync,
            task_service,
        }
    }

    #[tracing::instrument(skip(self), fields(source_id = %source_id, target_id = %target_id, user_id = %user_id))]
    pub async fn move_one(
        &self,
        source_id: Uuid,
        target_id: Uuid,
        user_id: Uuid,
    ) -> Result<File, AppError> {
        let target = self.file_cache.get(target_id).await?;
        let source = self.file_cache.get(source_id).await?;
        let task = self.create_task(&source, user_id).await?;

        let result = async {
            self.check(&source, &target, user_id).await?;
            self.perform_move(&source, &target).await
        }
        .await;

        if let Err(err) = self.task_service.delete_and_sync(task.id).await {
            tracing::error!(error = %err, task_id = %task.id, "Failed to delete progress task");
        }
        result
    }

    pub async fn move_many(
        &self,
        source_ids: &[Uuid],
        target_id: Uuid,
        user_id: Uuid,
    ) -> Result<FileMoveManyResult, AppError> {
        let mut result = FileMoveManyResult::default();
        for &source_id in source_ids {
            match self.move_one(source_id, target_id, user_id).await {
                Ok(_) => result.succeeded.push(source_id),
                Err(err) => {
                    tracing::error!(error = %err, source_id = %source_id, "Move failed");
                    result.failed.push(source_id);
                }
            }
        }
        Ok(result)
    }

    async fn create_task(&self, file: &File, user_id: Uuid) -> Result<Task, AppError> {
        self.task_service
            .insert_and_sync(
                Task::new(user_id, "Moving.", TaskStatus::Running)
                    .with_payload_object(file.name.clone()),
            )
            .await
    }

    async fn check(&self, source: &File, target: &File, user_id: Uuid) -> Result<(), AppError> {
        if source.parent_id.is_some() {
            if let Some(existing) = self.file_sync.child_with_name(target.id, &source.name).await? {
                if existing.id != source.id {
                    return Err(AppError::FileWithSimilarNameExists(source.name.clone()));
                }
            }
        }
        self.file_guard
            .authorize(user_id, target, Permission::Editor)
            .await?;
        self.file_guard
            .authorize(user_id, source, Permission::Editor)
            .await?;
        if source.parent_id == Some(target.id) {
            return Err(AppError::FileAlreadyChildOfDestination(
                source.id.to_string(),
            ));
        }
        if source.id == target.id {
            return Err(AppError::FileCannotBeMovedIntoItself(source.id.to_string()));
        }
        if !target.is_folder() {
            return Err(AppError::FileIsNotAFolder(target.id.to_string()));
        }
        if self.file_repo.is_grandchild_of(target.id, source.id).await? {
            return Err(AppError::TargetIsGrandChildOfSource(source.id.to_string()));
        }
        Ok(())
    }

    async fn perform_move(&self, source: &File, target: &File) -> Result<File, AppError> {
        self.file_repo
            .move_source_into_target(target.id, source.id)
            .await?;
        let source = self.file_repo.find(source.id).await?;
        self.refresh_update_time(source.clone(), target.clone())
            .await?;
        Ok(source)
    }

    /// Source and target timestamps, cache entries and index entries are
    /// all refreshed before returning; move has a bounded blast radius, so
    /// the work stays synchronous.
    async fn refresh_update_time(&self, mut source: File, mut target: File) -> Result<(), AppError> {
        source.touch();
        self.file_sync.save_and_sync(&source).await?;
        target.touch();
        self.file_sync.save_and_sync(&target).await?;
        Ok(())
    }
}
