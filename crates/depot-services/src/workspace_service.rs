//! Workspace provisioning and lookup.
//!
//! Creating a workspace is the only place a null-parent file comes into
//! existence: the workspace and its root folder are born together, with
//! owner grants for the creating user on both.

use std::sync::Arc;
use uuid::Uuid;

use depot_core::models::{File, FileType, Permission, Workspace};
use depot_core::AppError;
use depot_db::{FileRepo, WorkspaceRepo};
use depot_search::FileSearch;

use crate::cache::{FileCache, WorkspaceCache};
use crate::guard::WorkspaceGuard;

#[derive(Debug, Clone)]
pub struct WorkspaceCreateOptions {
    pub name: String,
    pub organization_id: Uuid,
}

#[derive(Clone)]
pub struct WorkspaceService {
    workspace_repo: Arc<dyn WorkspaceRepo>,
    workspace_cache: WorkspaceCache,
    workspace_guard: WorkspaceGuard,
    file_repo: Arc<dyn FileRepo>,
    file_cache: FileCache,
    file_search: FileSearch,
}

impl WorkspaceService {
    pub fn new(
        workspace_repo: Arc<dyn WorkspaceRepo>,
        workspace_cache: WorkspaceCache,
        workspace_guard: WorkspaceGuard,
        file_repo: Arc<dyn FileRepo>,
        file_cache: FileCache,
        file_search: FileSearch,
    ) -> Self {
        Self {
            workspace_repo,
            workspace_cache,
            workspace_guard,
            file_repo,
            file_cache,
            file_search,
        }
    }

    #[tracing::instrument(skip(self, options), fields(user_id = %user_id))]
    pub async fn create(
        &self,
        options: WorkspaceCreateOptions,
        user_id: Uuid,
    ) -> Result<Workspace, AppError> {
        let workspace_id = Uuid::new_v4();
        let root = File::new(workspace_id, options.name.clone(), FileType::Folder);
        let workspace = Workspace {
            id: workspace_id,
            organization_id: options.organization_id,
            name: options.name,
            root_id: root.id,
            // Bucket provisioning itself is an ops concern; the name is
            // recorded so artifact writes land in the right place.
            bucket: format!("depot-{}", workspace_id),
            create_time: chrono::Utc::now(),
            update_time: None,
        };

        self.workspace_repo.insert(&workspace).await?;
        self.file_repo.insert(&root).await?;
        // Grants live in one resource-keyed table; the workspace row and
        // its root folder are both resources.
        self.file_repo
            .grant_user_permission(workspace.id, user_id, Permission::Owner)
            .await?;
        self.file_repo
            .grant_user_permission(root.id, user_id, Permission::Owner)
            .await?;

        self.workspace_cache.set(&workspace).await;
        let root = self.file_cache.refresh(root.id).await?;
        self.file_search.index(std::slice::from_ref(&root)).await?;
        Ok(workspace)
    }

    pub async fn find(&self, id: Uuid, user_id: Uuid) -> Result<Workspace, AppError> {
        let workspace = self.workspace_cache.get(id).await?;
        self.workspace_guard
            .authorize(user_id, &workspace, Permission::Viewer)
            .await?;
        Ok(workspace)
    }

    pub async fn find_all(&self, user_id: Uuid) -> Result<Vec<Workspace>, AppError> {
        let mut result = Vec::new();
        for workspace in self.workspace_repo.find_all().await? {
            if self
                .workspace_guard
                .is_authorized(user_id, &workspace, Permission::Viewer)
                .await
            {
                result.push(workspace);
            }
        }
        Ok(result)
    }
}
