//! Bulk reprocessing.
//!
//! Reprocess sweeps a file or folder subtree and resubmits eligible files
//! to the pipeline. Rejections are silent and per-item: a leaf that is not
//! a file, lacks editor permission, has no active snapshot, no original
//! artifact, or a pending task simply lands in the rejected list. Bulk
//! calls never fail as a batch.

use std::sync::Arc;
use uuid::Uuid;

use depot_core::models::{File, Permission};
use depot_core::AppError;
use depot_db::FileRepo;

use crate::cache::FileCache;
use crate::guard::FileGuard;
use crate::pipeline::PipelineService;

#[derive(Debug, Clone, Default)]
pub struct FileReprocessResult {
    pub accepted: Vec<Uuid>,
    pub rejected: Vec<Uuid>,
}

impl FileReprocessResult {
    fn append_accepted(&mut self, id: Uuid) {
        if !self.accepted.contains(&id) {
            self.accepted.push(id);
        }
    }

    fn append_rejected(&mut self, id: Uuid) {
        if !self.rejected.contains(&id) {
            self.rejected.push(id);
        }
    }
}

#[derive(Clone)]
pub struct FileReprocessService {
    file_repo: Arc<dyn FileRepo>,
    file_cache: FileCache,
    file_guard: FileGuard,
    pipeline_service: PipelineService,
}

impl FileReprocessService {
    pub fn new(
        file_repo: Arc<dyn FileRepo>,
        file_cache: FileCache,
        file_guard: FileGuard,
        pipeline_service: PipelineService,
    ) -> Self {
        Self {
            file_repo,
            file_cache,
            file_guard,
            pipeline_service,
        }
    }

    #[tracing::instrument(skip(self), fields(file_id = %id, user_id = %user_id))]
    pub async fn reprocess(&self, id: Uuid, user_id: Uuid) -> Result<FileReprocessResult, AppError> {
        let mut result = FileReprocessResult::default();
        let file = self.file_cache.get(id).await?;
        for leaf in self.resolve_tree(&file, user_id).await? {
            if self.reprocess_leaf(&leaf, user_id).await {
                result.append_accepted(leaf.id);
            } else {
                result.append_rejected(leaf.id);
            }
        }
        Ok(result)
    }

    async fn resolve_tree(&self, file: &File, user_id: Uuid) -> Result<Vec<File>, AppError> {
        if file.is_folder() {
            self.file_guard
                .authorize(user_id, file, Permission::Viewer)
                .await?;
            self.file_repo.find_tree(file.id).await
        } else {
            Ok(vec![file.clone()])
        }
    }

    async fn reprocess_leaf(&self, leaf: &File, user_id: Uuid) -> bool {
        if !leaf.is_file() {
            return false;
        }
        match self.pipeline_service.submit(leaf.id, user_id).await {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(error = %err, file_id = %leaf.id, "Reprocess rejected");
                false
            }
        }
    }
}
