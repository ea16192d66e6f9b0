use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scoping container for a file tree. Each workspace owns exactly one root
/// folder (the only file with a null parent) and one blob bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub root_id: Uuid,
    pub bucket: String,
    pub create_time: DateTime<Utc>,
    pub update_time: Option<DateTime<Utc>>,
}

/// A named set of users; group grants apply to every member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub members: Vec<Uuid>,
    pub create_time: DateTime<Utc>,
    pub update_time: Option<DateTime<Utc>>,
}

impl Group {
    pub fn has_member(&self, user_id: Uuid) -> bool {
        self.members.contains(&user_id)
    }
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Workspace {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Workspace {
            id: row.get("id"),
            organization_id: row.get("organization_id"),
            name: row.get("name"),
            root_id: row.get("root_id"),
            bucket: row.get("bucket"),
            create_time: row.get("create_time"),
            update_time: row.get("update_time"),
        })
    }
}
