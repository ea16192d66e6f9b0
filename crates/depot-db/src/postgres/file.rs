use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use depot_core::models::{File, Permission, UserPermission};
use depot_core::AppError;

use crate::repo::FileRepo;

/// Repository for file tree rows
#[derive(Clone)]
pub struct FileRepository {
    pool: PgPool,
}

impl FileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const FILE_COLUMNS: &str =
    "id, workspace_id, name, file_type, parent_id, snapshot_id, create_time, update_time";

#[async_trait]
impl FileRepo for FileRepository {
    #[tracing::instrument(skip(self, file), fields(db.table = "file", db.operation = "insert", db.record_id = %file.id))]
    async fn insert(&self, file: &File) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO file (id, workspace_id, name, file_type, parent_id, snapshot_id, create_time, update_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(file.id)
        .bind(file.workspace_id)
        .bind(&file.name)
        .bind(file.file_type.to_string())
        .bind(file.parent_id)
        .bind(file.snapshot_id)
        .bind(file.create_time)
        .bind(file.update_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "file", db.operation = "select", db.record_id = %id))]
    async fn find(&self, id: Uuid) -> Result<File, AppError> {
        self.find_optional(id)
            .await?
            .ok_or_else(|| AppError::FileNotFound(id.to_string()))
    }

    #[tracing::instrument(skip(self), fields(db.table = "file", db.operation = "select", db.record_id = %id))]
    async fn find_optional(&self, id: Uuid) -> Result<Option<File>, AppError> {
        let file = sqlx::query_as::<Postgres, File>(&format!(
            "SELECT {FILE_COLUMNS} FROM file WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(file)
    }

    #[tracing::instrument(skip(self, file), fields(db.table = "file", db.operation = "update", db.record_id = %file.id))]
    async fn save(&self, file: &File) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE file
            SET workspace_id = $2, name = $3, file_type = $4, parent_id = $5,
                snapshot_id = $6, update_time = $7
            WHERE id = $1
            "#,
        )
        .bind(file.id)
        .bind(file.workspace_id)
        .bind(&file.name)
        .bind(file.file_type.to_string())
        .bind(file.parent_id)
        .bind(file.snapshot_id)
        .bind(file.update_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "file", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM file WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = "file", db.operation = "delete", count = ids.len()))]
    async fn delete_chunk(&self, ids: &[Uuid]) -> Result<(), AppError> {
        sqlx::query("DELETE FROM file WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, files), fields(db.table = "file", db.operation = "insert", count = files.len()))]
    async fn bulk_insert(&self, files: &[File], chunk_size: usize) -> Result<(), AppError> {
        for chunk in files.chunks(chunk_size.max(1)) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO file (id, workspace_id, name, file_type, parent_id, snapshot_id, create_time, update_time) ",
            );
            builder.push_values(chunk, |mut b, file| {
                b.push_bind(file.id)
                    .push_bind(file.workspace_id)
                    .push_bind(&file.name)
                    .push_bind(file.file_type.to_string())
                    .push_bind(file.parent_id)
                    .push_bind(file.snapshot_id)
                    .push_bind(file.create_time)
                    .push_bind(file.update_time);
            });
            builder.build().execute(&self.pool).await?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "file", db.operation = "select", db.record_id = %id))]
    async fn find_children(&self, id: Uuid) -> Result<Vec<File>, AppError> {
        let children = sqlx::query_as::<Postgres, File>(&format!(
            "SELECT {FILE_COLUMNS} FROM file WHERE parent_id = $1 ORDER BY name ASC"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(children)
    }

    #[tracing::instrument(skip(self, name), fields(db.table = "file", db.operation = "select"))]
    async fn find_child_with_name(
        &self,
        parent_id: Uuid,
        name: &str,
    ) -> Result<Option<File>, AppError> {
        let child = sqlx::query_as::<Postgres, File>(&format!(
            "SELECT {FILE_COLUMNS} FROM file WHERE parent_id = $1 AND name = $2"
        ))
        .bind(parent_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(child)
    }

    #[tracing::instrument(skip(self), fields(db.table = "file", db.operation = "select", db.record_id = %id))]
    async fn find_path(&self, id: Uuid) -> Result<Vec<File>, AppError> {
        let path = sqlx::query_as::<Postgres, File>(&format!(
            r#"
            WITH RECURSIVE rec (id, workspace_id, name, file_type, parent_id, snapshot_id, create_time, update_time, depth) AS (
                SELECT {FILE_COLUMNS}, 0 FROM file WHERE id = $1
                UNION ALL
                SELECT f.id, f.workspace_id, f.name, f.file_type, f.parent_id, f.snapshot_id, f.create_time, f.update_time, rec.depth + 1
                FROM file f
                INNER JOIN rec ON f.id = rec.parent_id
            )
            SELECT {FILE_COLUMNS} FROM rec ORDER BY depth DESC
            "#
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(path)
    }

    #[tracing::instrument(skip(self), fields(db.table = "file", db.operation = "select", db.record_id = %id))]
    async fn find_tree(&self, id: Uuid) -> Result<Vec<File>, AppError> {
        let tree = sqlx::query_as::<Postgres, File>(&format!(
            r#"
            WITH RECURSIVE rec (id, workspace_id, name, file_type, parent_id, snapshot_id, create_time, update_time) AS (
                SELECT {FILE_COLUMNS} FROM file WHERE id = $1
                UNION ALL
                SELECT f.id, f.workspace_id, f.name, f.file_type, f.parent_id, f.snapshot_id, f.create_time, f.update_time
                FROM file f
                INNER JOIN rec ON f.parent_id = rec.id
            )
            SELECT {FILE_COLUMNS} FROM rec
            "#
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tree)
    }

    #[tracing::instrument(skip(self), fields(db.table = "file", db.operation = "select", db.record_id = %id))]
    async fn find_tree_ids(&self, id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<Postgres, Uuid>(
            r#"
            WITH RECURSIVE rec (id) AS (
                SELECT id FROM file WHERE id = $1
                UNION ALL
                SELECT f.id FROM file f INNER JOIN rec ON f.parent_id = rec.id
            )
            SELECT id FROM rec
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    #[tracing::instrument(skip(self), fields(db.table = "file", db.operation = "select"))]
    async fn is_grandchild_of(
        &self,
        candidate_id: Uuid,
        ancestor_id: Uuid,
    ) -> Result<bool, AppError> {
        let is_grandchild = sqlx::query_scalar::<Postgres, bool>(
            r#"
            WITH RECURSIVE rec (id) AS (
                SELECT id FROM file WHERE id = $2
                UNION ALL
                SELECT f.id FROM file f INNER JOIN rec ON f.parent_id = rec.id
            )
            SELECT EXISTS(SELECT 1 FROM rec WHERE id = $1)
            "#,
        )
        .bind(candidate_id)
        .bind(ancestor_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(is_grandchild)
    }

    #[tracing::instrument(skip(self), fields(db.table = "file", db.operation = "update"))]
    async fn move_source_into_target(
        &self,
        target_id: Uuid,
        source_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE file SET parent_id = $1 WHERE id = $2")
            .bind(target_id)
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "file", db.operation = "select"))]
    async fn find_ids_by_snapshot(&self, snapshot_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<Postgres, Uuid>(
            "SELECT file_id FROM snapshot_file WHERE snapshot_id = $1",
        )
        .bind(snapshot_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    #[tracing::instrument(skip(self), fields(db.table = "file", db.operation = "update", db.record_id = %file_id))]
    async fn clear_snapshot_id(&self, file_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE file SET snapshot_id = NULL WHERE id = $1")
            .bind(file_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "userpermission", db.operation = "insert"))]
    async fn grant_user_permission(
        &self,
        resource_id: Uuid,
        user_id: Uuid,
        permission: Permission,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO userpermission (id, user_id, resource_id, permission, create_time)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(resource_id)
        .bind(permission.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, resource_ids), fields(db.table = "userpermission", db.operation = "delete", count = resource_ids.len()))]
    async fn revoke_user_permission(
        &self,
        resource_ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM userpermission WHERE resource_id = ANY($1) AND user_id = $2")
            .bind(resource_ids.to_vec())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "grouppermission", db.operation = "insert"))]
    async fn grant_group_permission(
        &self,
        resource_id: Uuid,
        group_id: Uuid,
        permission: Permission,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO grouppermission (id, group_id, resource_id, permission, create_time)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(group_id)
        .bind(resource_id)
        .bind(permission.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, resource_ids), fields(db.table = "grouppermission", db.operation = "delete", count = resource_ids.len()))]
    async fn revoke_group_permission(
        &self,
        resource_ids: &[Uuid],
        group_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM grouppermission WHERE resource_id = ANY($1) AND group_id = $2")
            .bind(resource_ids.to_vec())
            .bind(group_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, permissions), fields(db.table = "userpermission", db.operation = "insert", count = permissions.len()))]
    async fn bulk_insert_user_permissions(
        &self,
        permissions: &[UserPermission],
        chunk_size: usize,
    ) -> Result<(), AppError> {
        for chunk in permissions.chunks(chunk_size.max(1)) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO userpermission (id, user_id, resource_id, permission, create_time) ",
            );
            builder.push_values(chunk, |mut b, p| {
                b.push_bind(p.id)
                    .push_bind(p.user_id)
                    .push_bind(p.resource_id)
                    .push_bind(p.permission.to_string())
                    .push_bind(p.create_time);
            });
            builder.build().execute(&self.pool).await?;
        }
        Ok(())
    }
}
