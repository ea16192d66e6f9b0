//! Grant and revoke permissions on files.
//!
//! Granting requires owner on every target resource. Grants refresh the
//! cache along the node's path and subtree synchronously so permission
//! changes are visible to the next read.

use std::sync::Arc;
use uuid::Uuid;

use depot_core::models::{GroupPermission, Permission, UserPermission};
use depot_core::AppError;
use depot_db::{FileRepo, GroupRepo, PermissionRepo};

use crate::cache::FileCache;
use crate::file::sync::FileSync;
use crate::guard::{FileGuard, GroupGuard};

#[derive(Clone)]
pub struct FilePermissionService {
    file_repo: Arc<dyn FileRepo>,
    file_cache: FileCache,
    file_guard: FileGuard,
    file_sync: FileSync,
    group_repo: Arc<dyn GroupRepo>,
    group_guard: GroupGuard,
    permission_repo: Arc<dyn PermissionRepo>,
}

impl FilePermissionService {
    pub fn new(
        file_repo: Arc<dyn FileRepo>,
        file_cache: FileCache,
        file_guard: FileGuard,
        file_sync: FileSync,
        group_repo: Arc<dyn GroupRepo>,
        group_guard: GroupGuard,
        permission_repo: Arc<dyn PermissionRepo>,
    ) -> Self {
        Self {
            file_repo,
            file_cache,
            file_guard,
            file_sync,
            group_repo,
            group_guard,
            permission_repo,
        }
    }

    #[tracing::instrument(skip(self, ids), fields(assignee_id = %assignee_id, user_id = %user_id, count = ids.len()))]
    pub async fn grant_user_permission(
        &self,
        ids: &[Uuid],
        assignee_id: Uuid,
        permission: Permission,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        for &id in ids {
            let file = self.file_cache.get(id).await?;
            self.file_guard
                .authorize(user_id, &file, Permission::Owner)
                .await?;
            self.file_repo
                .grant_user_permission(id, assignee_id, permission)
                .await?;
            self.file_cache.refresh(id).await?;
            self.sync_path_and_tree(id).await?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, ids), fields(assignee_id = %assignee_id, user_id = %user_id, count = ids.len()))]
    pub async fn revoke_user_permission(
        &self,
        ids: &[Uuid],
        assignee_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        for &id in ids {
            let file = self.file_cache.get(id).await?;
            self.file_guard
                .authorize(user_id, &file, Permission::Owner)
                .await?;
            // Revocation walks the subtree: leaving grants on descendants
            // would keep the subtree reachable through direct lookups.
            let tree_ids = self.file_repo.find_tree_ids(id).await?;
            self.file_repo
                .revoke_user_permission(&tree_ids, assignee_id)
                .await?;
            for &tree_id in &tree_ids {
                self.file_cache.refresh(tree_id).await?;
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, ids), fields(group_id = %group_id, user_id = %user_id, count = ids.len()))]
    pub async fn grant_group_permission(
        &self,
        ids: &[Uuid],
        group_id: Uuid,
        permission: Permission,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        let group = self.group_repo.find(group_id).await?;
        self.group_guard
            .authorize(user_id, &group, Permission::Viewer)
            .await?;
        for &id in ids {
            let file = self.file_cache.get(id).await?;
            self.file_guard
                .authorize(user_id, &file, Permission::Owner)
                .await?;
            self.file_repo
                .grant_group_permission(id, group_id, permission)
                .await?;
            self.file_cache.refresh(id).await?;
            self.sync_path_and_tree(id).await?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, ids), fields(group_id = %group_id, user_id = %user_id, count = ids.len()))]
    pub async fn revoke_group_permission(
        &self,
        ids: &[Uuid],
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        let group = self.group_repo.find(group_id).await?;
        self.group_guard
            .authorize(user_id, &group, Permission::Viewer)
            .await?;
        for &id in ids {
            let file = self.file_cache.get(id).await?;
            self.file_guard
                .authorize(user_id, &file, Permission::Owner)
                .await?;
            let tree_ids = self.file_repo.find_tree_ids(id).await?;
            self.file_repo
                .revoke_group_permission(&tree_ids, group_id)
                .await?;
            for &tree_id in &tree_ids {
                self.file_cache.refresh(tree_id).await?;
            }
        }
        Ok(())
    }

    /// Grants on the file, owner excluded from the listing.
    pub async fn find_user_permissions(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<UserPermission>, AppError> {
        let file = self.file_cache.get(id).await?;
        self.file_guard
            .authorize(user_id, &file, Permission::Owner)
            .await?;
        let permissions = self
            .permission_repo
            .find_user_permissions(id)
            .await?
            .into_iter()
            .filter(|p| p.user_id != user_id)
            .collect();
        Ok(permissions)
    }

    pub async fn find_group_permissions(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<GroupPermission>, AppError> {
        let file = self.file_cache.get(id).await?;
        self.file_guard
            .authorize(user_id, &file, Permission::Owner)
            .await?;
        self.permission_repo.find_group_permissions(id).await
    }

    /// Refresh cache and index along the root-to-node path and the node's
    /// subtree; effective permissions of all of them may have changed.
    async fn sync_path_and_tree(&self, id: Uuid) -> Result<(), AppError> {
        for file in self.file_repo.find_path(id).await? {
            self.file_sync.sync(&file).await?;
        }
        for file in self.file_repo.find_tree(id).await? {
            self.file_sync.sync(&file).await?;
        }
        Ok(())
    }
}
