//! Permission guards.
//!
//! Effective permission for a principal on a resource is the maximum level
//! across their direct grants and the grants of every group they belong
//! to. Failing an authorization at viewer level reports the resource as
//! not found so that existence does not leak; failures above viewer report
//! a permission error.

use std::sync::Arc;
use uuid::Uuid;

use depot_core::models::{File, Group, Permission, Workspace};
use depot_core::AppError;
use depot_db::{GroupRepo, PermissionRepo};

async fn effective_permission(
    permission_repo: &Arc<dyn PermissionRepo>,
    group_repo: &Arc<dyn GroupRepo>,
    user_id: Uuid,
    resource_id: Uuid,
) -> Result<Permission, AppError> {
    let mut effective = Permission::None;
    for grant in permission_repo.find_user_permissions(resource_id).await? {
        if grant.user_id == user_id && grant.permission > effective {
            effective = grant.permission;
        }
    }
    let group_grants = permission_repo.find_group_permissions(resource_id).await?;
    if !group_grants.is_empty() {
        let memberships = group_repo.find_ids_for_user(user_id).await?;
        for grant in group_grants {
            if memberships.contains(&grant.group_id) && grant.permission > effective {
                effective = grant.permission;
            }
        }
    }
    Ok(effective)
}

fn deny(required: Permission, not_found: AppError, resource_id: Uuid) -> AppError {
    if required == Permission::Viewer {
        not_found
    } else {
        AppError::PermissionDenied(resource_id.to_string())
    }
}

#[derive(Clone)]
pub struct FileGuard {
    permission_repo: Arc<dyn PermissionRepo>,
    group_repo: Arc<dyn GroupRepo>,
}

impl FileGuard {
    pub fn new(permission_repo: Arc<dyn PermissionRepo>, group_repo: Arc<dyn GroupRepo>) -> Self {
        Self {
            permission_repo,
            group_repo,
        }
    }

    pub async fn effective_permission(
        &self,
        user_id: Uuid,
        file: &File,
    ) -> Result<Permission, AppError> {
        effective_permission(&self.permission_repo, &self.group_repo, user_id, file.id).await
    }

    /// Authorize `user_id` at `required` or better.
    pub async fn authorize(
        &self,
        user_id: Uuid,
        file: &File,
        required: Permission,
    ) -> Result<(), AppError> {
        let effective = self.effective_permission(user_id, file).await?;
        if effective >= required {
            Ok(())
        } else {
            Err(deny(
                required,
                AppError::FileNotFound(file.id.to_string()),
                file.id,
            ))
        }
    }

    /// Non-failing check used for bulk filtering of listings.
    pub async fn is_authorized(&self, user_id: Uuid, file: &File, required: Permission) -> bool {
        match self.effective_permission(user_id, file).await {
            Ok(effective) => effective >= required,
            Err(err) => {
                tracing::error!(error = %err, file_id = %file.id, "Permission lookup failed");
                false
            }
        }
    }
}

#[derive(Clone)]
pub struct WorkspaceGuard {
    permission_repo: Arc<dyn PermissionRepo>,
    group_repo: Arc<dyn GroupRepo>,
}

impl WorkspaceGuard {
    pub fn new(permission_repo: Arc<dyn PermissionRepo>, group_repo: Arc<dyn GroupRepo>) -> Self {
        Self {
            permission_repo,
            group_repo,
        }
    }

    pub async fn effective_permission(
        &self,
        user_id: Uuid,
        workspace: &Workspace,
    ) -> Result<Permission, AppError> {
        effective_permission(
            &self.permission_repo,
            &self.group_repo,
            user_id,
            workspace.id,
        )
        .await
    }

    pub async fn authorize(
        &self,
        user_id: Uuid,
        workspace: &Workspace,
        required: Permission,
    ) -> Result<(), AppError> {
        let effective = self.effective_permission(user_id, workspace).await?;
        if effective >= required {
            Ok(())
        } else {
            Err(deny(
                required,
                AppError::WorkspaceNotFound(workspace.id.to_string()),
                workspace.id,
            ))
        }
    }

    pub async fn is_authorized(
        &self,
        user_id: Uuid,
        workspace: &Workspace,
        required: Permission,
    ) -> bool {
        match self.effective_permission(user_id, workspace).await {
            Ok(effective) => effective >= required,
            Err(err) => {
                tracing::error!(error = %err, workspace_id = %workspace.id, "Permission lookup failed");
                false
            }
        }
    }
}

#[derive(Clone)]
pub struct GroupGuard {
    permission_repo: Arc<dyn PermissionRepo>,
    group_repo: Arc<dyn GroupRepo>,
}

impl GroupGuard {
    pub fn new(permission_repo: Arc<dyn PermissionRepo>, group_repo: Arc<dyn GroupRepo>) -> Self {
        Self {
            permission_repo,
            group_repo,
        }
    }

    pub async fn effective_permission(
        &self,
        user_id: Uuid,
        group: &Group,
    ) -> Result<Permission, AppError> {
        effective_permission(&self.permission_repo, &self.group_repo, user_id, group.id).await
    }

    pub async fn authorize(
        &self,
        user_id: Uuid,
        group: &Group,
        required: Permission,
    ) -> Result<(), AppError> {
        let effective = self.effective_permission(user_id, group).await?;
        if effective >= required {
            Ok(())
        } else {
            Err(deny(
                required,
                AppError::GroupNotFound(group.id.to_string()),
                group.id,
            ))
        }
    }
}
