use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use depot_core::models::{S3Object, Snapshot, SnapshotFileMapping};
use depot_core::AppError;

use crate::repo::SnapshotRepo;

/// Repository for snapshot rows and the snapshot_file mapping table
#[derive(Clone)]
pub struct SnapshotRepository {
    pool: PgPool,
}

impl SnapshotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SNAPSHOT_COLUMNS: &str = "id, version, status, language, original, preview, ocr, text, \
     entities, mosaic, thumbnail, watermark, task_id, create_time, update_time";

// Qualified variant for joins against snapshot_file, which has its own
// create_time column.
const SNAPSHOT_COLUMNS_QUALIFIED: &str =
    "s.id, s.version, s.status, s.language, s.original, s.preview, s.ocr, s.text, \
     s.entities, s.mosaic, s.thumbnail, s.watermark, s.task_id, s.create_time, s.update_time";

fn json(artifact: &Option<S3Object>) -> Option<Json<&S3Object>> {
    artifact.as_ref().map(Json)
}

#[async_trait]
impl SnapshotRepo for SnapshotRepository {
    #[tracing::instrument(skip(self, snapshot), fields(db.table = "snapshot", db.operation = "insert", db.record_id = %snapshot.id))]
    async fn insert(&self, snapshot: &Snapshot) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO snapshot (id, version, status, language, original, preview, ocr, text,
                                  entities, mosaic, thumbnail, watermark, task_id, create_time, update_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(snapshot.id)
        .bind(snapshot.version)
        .bind(snapshot.status.to_string())
        .bind(&snapshot.language)
        .bind(json(&snapshot.original))
        .bind(json(&snapshot.preview))
        .bind(json(&snapshot.ocr))
        .bind(json(&snapshot.text))
        .bind(json(&snapshot.entities))
        .bind(json(&snapshot.mosaic))
        .bind(json(&snapshot.thumbnail))
        .bind(json(&snapshot.watermark))
        .bind(snapshot.task_id)
        .bind(snapshot.create_time)
        .bind(snapshot.update_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, snapshot), fields(db.table = "snapshot", db.operation = "update", db.record_id = %snapshot.id))]
    async fn save(&self, snapshot: &Snapshot) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE snapshot
            SET version = $2, status = $3, language = $4, original = $5, preview = $6,
                ocr = $7, text = $8, entities = $9, mosaic = $10, thumbnail = $11,
                watermark = $12, task_id = $13, update_time = $14
            WHERE id = $1
            "#,
        )
        .bind(snapshot.id)
        .bind(snapshot.version)
        .bind(snapshot.status.to_string())
        .bind(&snapshot.language)
        .bind(json(&snapshot.original))
        .bind(json(&snapshot.preview))
        .bind(json(&snapshot.ocr))
        .bind(json(&snapshot.text))
        .bind(json(&snapshot.entities))
        .bind(json(&snapshot.mosaic))
        .bind(json(&snapshot.thumbnail))
        .bind(json(&snapshot.watermark))
        .bind(snapshot.task_id)
        .bind(snapshot.update_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "snapshot", db.operation = "select", db.record_id = %id))]
    async fn find(&self, id: Uuid) -> Result<Snapshot, AppError> {
        self.find_optional(id)
            .await?
            .ok_or_else(|| AppError::SnapshotNotFound(id.to_string()))
    }

    #[tracing::instrument(skip(self), fields(db.table = "snapshot", db.operation = "select", db.record_id = %id))]
    async fn find_optional(&self, id: Uuid) -> Result<Option<Snapshot>, AppError> {
        let snapshot = sqlx::query_as::<Postgres, Snapshot>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM snapshot WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(snapshot)
    }

    #[tracing::instrument(skip(self), fields(db.table = "snapshot", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM snapshot WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "snapshot", db.operation = "select"))]
    async fn find_all_for_file(&self, file_id: Uuid) -> Result<Vec<Snapshot>, AppError> {
        let snapshots = sqlx::query_as::<Postgres, Snapshot>(&format!(
            r#"
            SELECT {SNAPSHOT_COLUMNS_QUALIFIED} FROM snapshot s
            INNER JOIN snapshot_file map ON s.id = map.snapshot_id
            WHERE map.file_id = $1
            ORDER BY s.version ASC
            "#
        ))
        .bind(file_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(snapshots)
    }

    #[tracing::instrument(skip(self), fields(db.table = "snapshot_file", db.operation = "select"))]
    async fn find_ids_by_file(&self, file_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        // The join drops ledger rows whose snapshot is gone.
        let ids = sqlx::query_scalar::<Postgres, Uuid>(
            r#"
            SELECT map.snapshot_id FROM snapshot_file map
            INNER JOIN snapshot s ON s.id = map.snapshot_id
            WHERE map.file_id = $1
            "#,
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    #[tracing::instrument(skip(self), fields(db.table = "snapshot", db.operation = "select"))]
    async fn find_exclusive_for_file(&self, file_id: Uuid) -> Result<Vec<Snapshot>, AppError> {
        let snapshots = sqlx::query_as::<Postgres, Snapshot>(&format!(
            r#"
            SELECT {SNAPSHOT_COLUMNS_QUALIFIED} FROM snapshot s
            WHERE EXISTS(SELECT 1 FROM snapshot_file m WHERE m.snapshot_id = s.id AND m.file_id = $1)
              AND NOT EXISTS(SELECT 1 FROM snapshot_file m WHERE m.snapshot_id = s.id AND m.file_id <> $1)
            "#
        ))
        .bind(file_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(snapshots)
    }

    #[tracing::instrument(skip(self), fields(db.table = "snapshot_file", db.operation = "select"))]
    async fn find_latest_version_for_file(&self, file_id: Uuid) -> Result<i64, AppError> {
        // Computed over the ledger, not live snapshot rows: versions of
        // deleted snapshots stay burned and are never reissued.
        let version = sqlx::query_scalar::<Postgres, i64>(
            "SELECT coalesce(max(version), 0) FROM snapshot_file WHERE file_id = $1",
        )
        .bind(file_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(version)
    }

    #[tracing::instrument(skip(self), fields(db.table = "snapshot_file", db.operation = "insert"))]
    async fn map_with_file(&self, snapshot_id: Uuid, file_id: Uuid) -> Result<(), AppError> {
        // The ledger row records the snapshot's version at mapping time.
        sqlx::query(
            r#"
            INSERT INTO snapshot_file (snapshot_id, file_id, version, create_time)
            SELECT s.id, $2, s.version, NOW() FROM snapshot s WHERE s.id = $1
            ON CONFLICT (snapshot_id, file_id) DO NOTHING
            "#,
        )
        .bind(snapshot_id)
        .bind(file_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, mappings), fields(db.table = "snapshot_file", db.operation = "insert", count = mappings.len()))]
    async fn bulk_map_with_file(
        &self,
        mappings: &[SnapshotFileMapping],
        chunk_size: usize,
    ) -> Result<(), AppError> {
        for chunk in mappings.chunks(chunk_size.max(1)) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO snapshot_file (snapshot_id, file_id, version, create_time) \
                 SELECT v.snapshot_id, v.file_id, s.version, v.create_time FROM (",
            );
            builder.push_values(chunk, |mut b, m| {
                b.push_bind(m.snapshot_id)
                    .push_bind(m.file_id)
                    .push_bind(m.create_time);
            });
            builder.push(
                ") AS v(snapshot_id, file_id, create_time) \
                 INNER JOIN snapshot s ON s.id = v.snapshot_id \
                 ON CONFLICT (snapshot_id, file_id) DO NOTHING",
            );
            builder.build().execute(&self.pool).await?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "snapshot_file", db.operation = "delete"))]
    async fn delete_mappings_for_file(&self, file_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM snapshot_file WHERE file_id = $1")
            .bind(file_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "snapshot_file", db.operation = "select"))]
    async fn count_associations(&self, snapshot_id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COUNT(*) FROM snapshot_file WHERE snapshot_id = $1",
        )
        .bind(snapshot_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self), fields(db.table = "snapshot_file", db.operation = "delete"))]
    async fn detach(&self, snapshot_id: Uuid, file_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM snapshot_file WHERE snapshot_id = $1 AND file_id = $2")
            .bind(snapshot_id)
            .bind(file_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "snapshot_file", db.operation = "select"))]
    async fn find_file_id(&self, snapshot_id: Uuid) -> Result<Uuid, AppError> {
        let file_id = sqlx::query_scalar::<Postgres, Uuid>(
            "SELECT file_id FROM snapshot_file WHERE snapshot_id = $1 LIMIT 1",
        )
        .bind(snapshot_id)
        .fetch_optional(&self.pool)
        .await?;
        file_id.ok_or_else(|| AppError::SnapshotNotFound(snapshot_id.to_string()))
    }
}
