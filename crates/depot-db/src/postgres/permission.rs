use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use depot_core::models::{GroupPermission, UserPermission};
use depot_core::AppError;

use crate::repo::PermissionRepo;

/// Read-side repository over the grant tables
#[derive(Clone)]
pub struct PermissionRepository {
    pool: PgPool,
}

impl PermissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionRepo for PermissionRepository {
    #[tracing::instrument(skip(self), fields(db.table = "userpermission", db.operation = "select"))]
    async fn find_user_permissions(
        &self,
        resource_id: Uuid,
    ) -> Result<Vec<UserPermission>, AppError> {
        let permissions = sqlx::query_as::<Postgres, UserPermission>(
            "SELECT id, user_id, resource_id, permission, create_time FROM userpermission WHERE resource_id = $1",
        )
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(permissions)
    }

    #[tracing::instrument(skip(self), fields(db.table = "grouppermission", db.operation = "select"))]
    async fn find_group_permissions(
        &self,
        resource_id: Uuid,
    ) -> Result<Vec<GroupPermission>, AppError> {
        let permissions = sqlx::query_as::<Postgres, GroupPermission>(
            "SELECT id, group_id, resource_id, permission, create_time FROM grouppermission WHERE resource_id = $1",
        )
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(permissions)
    }
}
