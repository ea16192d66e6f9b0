use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Permission level on a resource. The derived ordering is the
/// authorization order: `None < Viewer < Editor < Owner`. Effective
/// permission is always the maximum over applicable grants, never a sum.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    #[default]
    None,
    Viewer,
    Editor,
    Owner,
}

impl Display for Permission {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Permission::None => write!(f, "none"),
            Permission::Viewer => write!(f, "viewer"),
            Permission::Editor => write!(f, "editor"),
            Permission::Owner => write!(f, "owner"),
        }
    }
}

impl FromStr for Permission {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Permission::None),
            "viewer" => Ok(Permission::Viewer),
            "editor" => Ok(Permission::Editor),
            "owner" => Ok(Permission::Owner),
            _ => Err(anyhow::anyhow!("Invalid permission: {}", s)),
        }
    }
}

/// Direct grant of a permission level to a user on a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPermission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resource_id: Uuid,
    pub permission: Permission,
    pub create_time: DateTime<Utc>,
}

impl UserPermission {
    pub fn new(user_id: Uuid, resource_id: Uuid, permission: Permission) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            resource_id,
            permission,
            create_time: Utc::now(),
        }
    }
}

/// Grant of a permission level to every member of a group on a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupPermission {
    pub id: Uuid,
    pub group_id: Uuid,
    pub resource_id: Uuid,
    pub permission: Permission,
    pub create_time: DateTime<Utc>,
}

impl GroupPermission {
    pub fn new(group_id: Uuid, resource_id: Uuid, permission: Permission) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            resource_id,
            permission,
            create_time: Utc::now(),
        }
    }
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for UserPermission {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(UserPermission {
            id: row.get("id"),
            user_id: row.get("user_id"),
            resource_id: row.get("resource_id"),
            permission: row.get::<String, _>("permission").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse permission: {}", e).into())
            })?,
            create_time: row.get("create_time"),
        })
    }
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for GroupPermission {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(GroupPermission {
            id: row.get("id"),
            group_id: row.get("group_id"),
            resource_id: row.get("resource_id"),
            permission: row.get::<String, _>("permission").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse permission: {}", e).into())
            })?,
            create_time: row.get("create_time"),
        })
    }
}
