//! File and folder deletion.
//!
//! A folder delete removes the root from cache and store immediately for
//! fast user feedback, then fans out descendant cleanup (snapshots, cache
//! entries, store rows in chunks, search entries) on the detached queue.
//! File deletes are bounded and run fully synchronously. Every deletion
//! path is idempotent; cleanup failures after the committed root delete
//! are logged, never escalated.

use std::sync::Arc;
use uuid::Uuid;

use depot_core::models::{File, Permission, Task, TaskStatus};
use depot_core::AppError;
use depot_db::FileRepo;
use depot_search::FileSearch;

use crate::cache::{FileCache, WorkspaceCache};
use crate::fanout::Fanout;
use crate::guard::FileGuard;
use crate::snapshot_service::SnapshotService;
use crate::task_service::TaskService;
use crate::BULK_CHUNK_SIZE;

#[derive(Debug, Clone, Default)]
pub struct FileDeleteManyResult {
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<Uuid>,
}

#[derive(Clone)]
pub struct FileDeleteService {
    file_repo: Arc<dyn FileRepo>,
    file_cache: FileCache,
    file_guard: FileGuard,
    file_search: FileSearch,
    workspace_cache: WorkspaceCache,
    snapshot_service: SnapshotService,
    task_service: TaskService,
    fanout: Fanout,
}

impl FileDeleteService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_repo: Arc<dyn FileRepo>,
        file_cache: FileCache,
        file_guard: FileGuard,
        file_search: FileSearch,
        workspace_cache: WorkspaceCache,
        snapshot_service: SnapshotService,
        task_service: TaskService,
        fanout: Fanout,
    ) -> Self {
        Self {
            file_repo,
            file_cache,
            file_guard,
            file_search,
            workspace_cache,
            snapshot_service,
            task_service,
            fanout,
        }
    }

    #[tracing::instrument(skip(self), fields(file_id = %id, user_id = %user_id))]
    pub async fn delete_one(&self, id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        let file = self.file_cache.get(id).await?;
        self.file_guard
            .authorize(user_id, &file, Permission::Owner)
            .await?;
        let task = self.create_task(&file, user_id).await?;

        let result = async {
            self.check(&file).await?;
            if file.is_folder() {
                self.delete_folder(file.id).await
            } else {
                self.delete_file(file.id).await;
                Ok(())
            }
        }
        .await;

        if let Err(err) = self.task_service.delete_and_sync(task.id).await {
            tracing::error!(error = %err, task_id = %task.id, "Failed to delete progress task");
        }
        result
    }

    /// Delete each id independently; an unauthorized or missing entry goes
    /// to `failed` and never aborts the batch.
    pub async fn delete_many(
        &self,
        ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<FileDeleteManyResult, AppError> {
        let mut result = FileDeleteManyResult::default();
        for &id in ids {
            match self.delete_one(id, user_id).await {
                Ok(()) => result.succeeded.push(id),
                Err(err) => {
                    tracing::error!(error = %err, file_id = %id, "Delete failed");
                    result.failed.push(id);
                }
            }
        }
        Ok(result)
    }

    async fn check(&self, file: &File) -> Result<(), AppError> {
        if file.parent_id.is_none() {
            // The workspace row may already be gone for orphaned roots.
            let workspace = self.workspace_cache.get(file.workspace_id).await.ok();
            let label = workspace
                .map(|w| w.name)
                .unwrap_or_else(|| file.id.to_string());
            return Err(AppError::CannotDeleteWorkspaceRoot(label));
        }
        Ok(())
    }

    async fn create_task(&self, file: &File, user_id: Uuid) -> Result<Task, AppError> {
        self.task_service
            .insert_and_sync(
                Task::new(user_id, "Deleting.", TaskStatus::Running)
                    .with_payload_object(file.name.clone()),
            )
            .await
    }

    async fn delete_folder(&self, id: Uuid) -> Result<(), AppError> {
        let tree_ids = self.file_repo.find_tree_ids(id).await?;
        // The root goes first, synchronously, for quick user feedback.
        self.file_cache.delete(id).await;
        self.file_repo.delete(id).await?;

        let file_repo = self.file_repo.clone();
        let file_cache = self.file_cache.clone();
        let file_search = self.file_search.clone();
        let snapshot_service = self.snapshot_service.clone();
        self.fanout.spawn(async move {
            for &tree_id in &tree_ids {
                snapshot_service.delete_for_file(tree_id).await;
            }
            for &tree_id in &tree_ids {
                file_cache.delete(tree_id).await;
            }
            for chunk in tree_ids.chunks(BULK_CHUNK_SIZE) {
                if let Err(err) = file_repo.delete_chunk(chunk).await {
                    tracing::error!(error = %err, "Failed to delete subtree chunk");
                }
            }
            if let Err(err) = file_search.delete(&tree_ids).await {
                tracing::error!(error = %err, "Failed to delete subtree from search");
            }
        });
        Ok(())
    }

    /// Bounded cost, so fully synchronous. Each step is idempotent and
    /// logged on failure; none can roll back the others.
    async fn delete_file(&self, id: Uuid) {
        self.snapshot_service.delete_for_file(id).await;
        self.file_cache.delete(id).await;
        if let Err(err) = self.file_repo.delete(id).await {
            tracing::error!(error = %err, file_id = %id, "Failed to delete file row");
        }
        if let Err(err) = self.file_search.delete(&[id]).await {
            tracing::error!(error = %err, file_id = %id, "Failed to delete file from search");
        }
    }
}
