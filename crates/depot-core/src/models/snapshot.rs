use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Reference to a stored object in the blob store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct S3Object {
    pub bucket: String,
    pub key: String,
    pub size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl S3Object {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            size: None,
            content_type: None,
        }
    }

    pub fn with_size(mut self, size: i64) -> Self {
        self.size = Some(size);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    Waiting,
    Running,
    Ready,
    Error,
    Processing,
}

impl Display for SnapshotStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SnapshotStatus::Waiting => write!(f, "waiting"),
            SnapshotStatus::Running => write!(f, "running"),
            SnapshotStatus::Ready => write!(f, "ready"),
            SnapshotStatus::Error => write!(f, "error"),
            SnapshotStatus::Processing => write!(f, "processing"),
        }
    }
}

impl FromStr for SnapshotStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(SnapshotStatus::Waiting),
            "running" => Ok(SnapshotStatus::Running),
            "ready" => Ok(SnapshotStatus::Ready),
            "error" => Ok(SnapshotStatus::Error),
            "processing" => Ok(SnapshotStatus::Processing),
            _ => Err(anyhow::anyhow!("Invalid snapshot status: {}", s)),
        }
    }
}

/// An immutable versioned bundle of content artifacts associated with a
/// file at a point in time. Versions are scoped per file, strictly
/// increasing and never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub version: i64,
    pub status: SnapshotStatus,
    pub language: Option<String>,
    pub original: Option<S3Object>,
    pub preview: Option<S3Object>,
    pub ocr: Option<S3Object>,
    pub text: Option<S3Object>,
    pub entities: Option<S3Object>,
    pub mosaic: Option<S3Object>,
    pub thumbnail: Option<S3Object>,
    pub watermark: Option<S3Object>,
    /// Task tracking in-flight processing of this snapshot. Lifecycle
    /// belongs to the task orchestrator; this is a weak reference.
    pub task_id: Option<Uuid>,
    pub create_time: DateTime<Utc>,
    pub update_time: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn new(version: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            version,
            status: SnapshotStatus::Waiting,
            language: None,
            original: None,
            preview: None,
            ocr: None,
            text: None,
            entities: None,
            mosaic: None,
            thumbnail: None,
            watermark: None,
            task_id: None,
            create_time: Utc::now(),
            update_time: None,
        }
    }

    pub fn has_original(&self) -> bool {
        self.original.is_some()
    }

    pub fn has_preview(&self) -> bool {
        self.preview.is_some()
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }

    pub fn has_entities(&self) -> bool {
        self.entities.is_some()
    }

    pub fn has_mosaic(&self) -> bool {
        self.mosaic.is_some()
    }

    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail.is_some()
    }

    pub fn has_watermark(&self) -> bool {
        self.watermark.is_some()
    }

    pub fn touch(&mut self) {
        self.update_time = Some(Utc::now());
    }
}

/// Association between a snapshot and every file that currently or
/// historically referenced it. Copies share snapshots through this table
/// instead of duplicating blob content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFileMapping {
    pub snapshot_id: Uuid,
    pub file_id: Uuid,
    pub create_time: DateTime<Utc>,
}

impl SnapshotFileMapping {
    pub fn new(snapshot_id: Uuid, file_id: Uuid) -> Self {
        Self {
            snapshot_id,
            file_id,
            create_time: Utc::now(),
        }
    }
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Snapshot {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::types::Json;
        use sqlx::Row;

        fn artifact(
            row: &sqlx::postgres::PgRow,
            column: &str,
        ) -> Result<Option<S3Object>, sqlx::Error> {
            use sqlx::Row;
            Ok(row
                .try_get::<Option<Json<S3Object>>, _>(column)?
                .map(|json| json.0))
        }

        Ok(Snapshot {
            id: row.get("id"),
            version: row.get("version"),
            status: row.get::<String, _>("status").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse snapshot status: {}", e).into())
            })?,
            language: row.get("language"),
            original: artifact(row, "original")?,
            preview: artifact(row, "preview")?,
            ocr: artifact(row, "ocr")?,
            text: artifact(row, "text")?,
            entities: artifact(row, "entities")?,
            mosaic: artifact(row, "mosaic")?,
            thumbnail: artifact(row, "thumbnail")?,
            watermark: artifact(row, "watermark")?,
            task_id: row.get("task_id"),
            create_time: row.get("create_time"),
            update_time: row.get("update_time"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_snapshot_is_waiting_and_empty() {
        let s = Snapshot::new(1);
        assert_eq!(s.status, SnapshotStatus::Waiting);
        assert!(!s.has_original());
        assert!(s.task_id.is_none());
    }

    #[test]
    fn test_artifact_flags() {
        let mut s = Snapshot::new(2);
        s.original = Some(S3Object::new("bucket", "s1/original.pdf").with_size(42));
        s.mosaic = Some(S3Object::new("bucket", "s1/mosaic"));
        assert!(s.has_original());
        assert!(s.has_mosaic());
        assert!(!s.has_preview());
    }

    #[test]
    fn test_status_round_trip() {
        for s in ["waiting", "running", "ready", "error", "processing"] {
            assert_eq!(s.parse::<SnapshotStatus>().unwrap().to_string(), s);
        }
        assert!("done".parse::<SnapshotStatus>().is_err());
    }
}
