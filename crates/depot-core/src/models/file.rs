use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    File,
    Folder,
}

impl Display for FileType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FileType::File => write!(f, "file"),
            FileType::Folder => write!(f, "folder"),
        }
    }
}

impl FromStr for FileType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(FileType::File),
            "folder" => Ok(FileType::Folder),
            _ => Err(anyhow::anyhow!("Invalid file type: {}", s)),
        }
    }
}

/// A node of the workspace file tree. Siblings under one parent have unique
/// names; `parent_id` is `None` only for the workspace root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub file_type: FileType,
    pub parent_id: Option<Uuid>,
    /// The snapshot currently presented as the content of this file.
    pub snapshot_id: Option<Uuid>,
    pub create_time: DateTime<Utc>,
    pub update_time: Option<DateTime<Utc>>,
}

impl File {
    pub fn new(workspace_id: Uuid, name: impl Into<String>, file_type: FileType) -> Self {
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            name: name.into(),
            file_type,
            parent_id: None,
            snapshot_id: None,
            create_time: Utc::now(),
            update_time: None,
        }
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn is_folder(&self) -> bool {
        self.file_type == FileType::Folder
    }

    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    pub fn is_workspace_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn touch(&mut self) {
        self.update_time = Some(Utc::now());
    }
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for File {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(File {
            id: row.get("id"),
            workspace_id: row.get("workspace_id"),
            name: row.get("name"),
            file_type: row.get::<String, _>("file_type").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse file_type: {}", e).into())
            })?,
            parent_id: row.get("parent_id"),
            snapshot_id: row.get("snapshot_id"),
            create_time: row.get("create_time"),
            update_time: row.get("update_time"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_has_no_parent() {
        let ws = Uuid::new_v4();
        let root = File::new(ws, "root", FileType::Folder);
        assert!(root.is_workspace_root());
        assert!(root.is_folder());

        let child = File::new(ws, "child", FileType::File).with_parent(root.id);
        assert!(!child.is_workspace_root());
        assert_eq!(child.parent_id, Some(root.id));
    }

    #[test]
    fn test_file_type_round_trip() {
        assert_eq!("folder".parse::<FileType>().unwrap(), FileType::Folder);
        assert_eq!(FileType::File.to_string(), "file");
        assert!("symlink".parse::<FileType>().is_err());
    }
}
