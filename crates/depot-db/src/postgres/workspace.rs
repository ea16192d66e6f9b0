use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use depot_core::models::Workspace;
use depot_core::AppError;

use crate::repo::WorkspaceRepo;

#[derive(Clone)]
pub struct WorkspaceRepository {
    pool: PgPool,
}

impl WorkspaceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const WORKSPACE_COLUMNS: &str =
    "id, organization_id, name, root_id, bucket, create_time, update_time";

#[async_trait]
impl WorkspaceRepo for WorkspaceRepository {
    #[tracing::instrument(skip(self, workspace), fields(db.table = "workspace", db.operation = "insert", db.record_id = %workspace.id))]
    async fn insert(&self, workspace: &Workspace) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO workspace (id, organization_id, name, root_id, bucket, create_time, update_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(workspace.id)
        .bind(workspace.organization_id)
        .bind(&workspace.name)
        .bind(workspace.root_id)
        .bind(&workspace.bucket)
        .bind(workspace.create_time)
        .bind(workspace.update_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "workspace", db.operation = "select", db.record_id = %id))]
    async fn find(&self, id: Uuid) -> Result<Workspace, AppError> {
        sqlx::query_as::<Postgres, Workspace>(&format!(
            "SELECT {WORKSPACE_COLUMNS} FROM workspace WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::WorkspaceNotFound(id.to_string()))
    }

    #[tracing::instrument(skip(self, workspace), fields(db.table = "workspace", db.operation = "update", db.record_id = %workspace.id))]
    async fn save(&self, workspace: &Workspace) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE workspace
            SET organization_id = $2, name = $3, root_id = $4, bucket = $5, update_time = $6
            WHERE id = $1
            "#,
        )
        .bind(workspace.id)
        .bind(workspace.organization_id)
        .bind(&workspace.name)
        .bind(workspace.root_id)
        .bind(&workspace.bucket)
        .bind(workspace.update_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "workspace", db.operation = "select"))]
    async fn find_all(&self) -> Result<Vec<Workspace>, AppError> {
        let workspaces = sqlx::query_as::<Postgres, Workspace>(&format!(
            "SELECT {WORKSPACE_COLUMNS} FROM workspace ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(workspaces)
    }
}
