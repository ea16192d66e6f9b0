//! Subtree copy.
//!
//! Copy clones every node of the source subtree with fresh ids, re-parents
//! the cloned root under the target, and shares the originals' snapshots
//! through the mapping table instead of duplicating blob content. A name
//! collision under the target silently renames the cloned root; copy must
//! always succeed where move surfaces the conflict.

use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use depot_core::models::{
    File, Permission, SnapshotFileMapping, Task, TaskStatus, UserPermission,
};
use depot_core::AppError;
use depot_db::{FileRepo, SnapshotRepo};
use depot_search::FileSearch;

use crate::cache::FileCache;
use crate::fanout::Fanout;
use crate::file::sync::FileSync;
use crate::file::unique_name;
use crate::guard::FileGuard;
use crate::task_service::TaskService;
use crate::BULK_CHUNK_SIZE;

#[derive(Debug, Clone, Default)]
pub struct FileCopyManyResult {
    pub new: Vec<Uuid>,
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<Uuid>,
}

#[derive(Clone)]
pub struct FileCopyService {
    file_repo: Arc<dyn FileRepo>,
    file_cache: FileCache,
    file_guard: FileGuard,
    file_search: FileSearch,
    file_sync: FileSync,
    snapshot_repo: Arc<dyn SnapshotRepo>,
    task_service: TaskService,
    fanout: Fanout,
}

impl FileCopyService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_repo: Arc<dyn FileRepo>,
        file_cache: FileCache,
        file_guard: FileGuard,
        file_search: FileSearch,
        file_sync: FileSync,
        snapshot_repo: Arc<dyn SnapshotRepo>,
        task_service: TaskService,
        fanout: Fanout,
    ) -> Self {
        Self {
            file_repo,
            file_cache,
            file_guard,
            file_search,
            file_sync,
            snapshot_repo,
            task_service,
            fanout,
        }
    }

    #[tracing::instrument(skip(self), fields(source_id = %source_id, target_id = %target_id, user_id = %user_id))]
    pub async fn copy_one(
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
            self.copy(&source, &target, user_id).await
        }
        .await;

        // The progress task dies with the operation, success or failure.
        if let Err(err) = self.task_service.delete_and_sync(task.id).await {
            tracing::error!(error = %err, task_id = %task.id, "Failed to delete progress task");
        }
        result
    }

    /// Copy each source independently; one failure never aborts the batch.
    pub async fn copy_many(
        &self,
        source_ids: &[Uuid],
        target_id: Uuid,
        user_id: Uuid,
    ) -> Result<FileCopyManyResult, AppError> {
        let mut result = FileCopyManyResult::default();
        for &source_id in source_ids {
            match self.copy_one(source_id, target_id, user_id).await {
                Ok(clone) => {
                    result.new.push(clone.id);
                    result.succeeded.push(source_id);
                }
                Err(err) => {
                    tracing::error!(error = %err, source_id = %source_id, "Copy failed");
                    result.failed.push(source_id);
                }
            }
        }
        Ok(result)
    }

    async fn create_task(&self, file: &File, user_id: Uuid) -> Result<Task, AppError> {
        self.task_service
            .insert_and_sync(
                Task::new(user_id, "Copying.", TaskStatus::Running)
                    .with_payload_object(file.name.clone()),
            )
            .await
    }

    async fn check(&self, source: &File, target: &File, user_id: Uuid) -> Result<(), AppError> {
        self.file_guard
            .authorize(user_id, target, Permission::Editor)
            .await?;
        self.file_guard
            .authorize(user_id, source, Permission::Editor)
            .await?;
        if source.id == target.id {
            return Err(AppError::FileCannotBeCopiedIntoItself(
                source.id.to_string(),
            ));
        }
        if !target.is_folder() {
            return Err(AppError::FileIsNotAFolder(target.id.to_string()));
        }
        if self.file_repo.is_grandchild_of(target.id, source.id).await? {
            return Err(AppError::FileCannotBeCopiedIntoOwnSubtree(
                source.id.to_string(),
            ));
        }
        Ok(())
    }

    async fn copy(&self, source: &File, target: &File, user_id: Uuid) -> Result<File, AppError> {
        let tree = self.load_tree(source.id).await?;
        let (root, clones, permissions) = self.clone_tree(source, target, &tree, user_id).await?;

        self.file_repo.bulk_insert(&clones, BULK_CHUNK_SIZE).await?;
        self.file_repo
            .bulk_insert_user_permissions(&permissions, BULK_CHUNK_SIZE)
            .await?;
        self.attach_snapshots(&clones, &tree).await?;

        // Cache synchronously; search re-index is detached and must not
        // fail the copy.
        for clone in &clones {
            self.file_cache.set(clone).await;
        }
        let file_search = self.file_search.clone();
        let detached = clones.clone();
        self.fanout.spawn(async move {
            if let Err(err) = file_search.index(&detached).await {
                tracing::error!(error = %err, "Failed to index copied subtree");
            }
        });

        self.refresh_update_time(target.clone()).await?;
        Ok(root)
    }

    async fn load_tree(&self, source_id: Uuid) -> Result<Vec<File>, AppError> {
        let ids = self.file_repo.find_tree_ids(source_id).await?;
        let mut tree = Vec::with_capacity(ids.len());
        for id in ids {
            tree.push(self.file_cache.get(id).await?);
        }
        Ok(tree)
    }

    /// Clone the subtree in two passes: every clone gets its fresh id
    /// first, then parent pointers are remapped through the id table. A
    /// child's clone parent id only exists once its parent's clone does.
    async fn clone_tree(
        &self,
        source: &File,
        target: &File,
        tree: &[File],
        user_id: Uuid,
    ) -> Result<(File, Vec<File>, Vec<UserPermission>), AppError> {
        let mut ids: HashMap<Uuid, Uuid> = HashMap::new();
        let mut clones: Vec<File> = Vec::with_capacity(tree.len());
        let mut permissions: Vec<UserPermission> = Vec::with_capacity(tree.len());
        let mut root_index = 0;

        for (index, leaf) in tree.iter().enumerate() {
            let mut clone = leaf.clone();
            clone.id = Uuid::new_v4();
            clone.create_time = chrono::Utc::now();
            clone.update_time = None;
            if leaf.id == source.id {
                root_index = index;
            }
            ids.insert(leaf.id, clone.id);
            permissions.push(UserPermission::new(user_id, clone.id, Permission::Owner));
            clones.push(clone);
        }

        for clone in clones.iter_mut() {
            if let Some(mapped) = clone.parent_id.and_then(|parent_id| ids.get(&parent_id)) {
                clone.parent_id = Some(*mapped);
            }
        }
        clones[root_index].parent_id = Some(target.id);

        if self
            .file_sync
            .child_with_name(target.id, &clones[root_index].name)
            .await?
            .is_some()
        {
            clones[root_index].name = unique_name(&clones[root_index].name);
        }
        Ok((clones[root_index].clone(), clones, permissions))
    }

    /// Point every clone at its original's snapshots through the mapping
    /// table; content is shared, never duplicated.
    async fn attach_snapshots(&self, clones: &[File], tree: &[File]) -> Result<(), AppError> {
        let mut mappings = Vec::new();
        for (clone, leaf) in clones.iter().zip(tree) {
            if let Some(snapshot_id) = leaf.snapshot_id {
                mappings.push(SnapshotFileMapping::new(snapshot_id, clone.id));
            }
        }
        self.snapshot_repo
            .bulk_map_with_file(&mappings, BULK_CHUNK_SIZE)
            .await?;
        Ok(())
    }

    async fn refresh_update_time(&self, mut target: File) -> Result<(), AppError> {
        target.touch();
        self.file_sync.save_and_sync(&target).await
    }
}
