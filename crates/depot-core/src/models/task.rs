use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Key under which the display name of the object being worked on is stored
/// in a task payload.
pub const TASK_PAYLOAD_OBJECT_KEY: &str = "object";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Waiting,
    Running,
    Error,
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskStatus::Waiting => write!(f, "waiting"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(TaskStatus::Waiting),
            "running" => Ok(TaskStatus::Running),
            "error" => Ok(TaskStatus::Error),
            _ => Err(anyhow::anyhow!("Invalid task status: {}", s)),
        }
    }
}

/// A tracked unit of asynchronous work surfaced to users as progress.
/// Tasks are deleted on success and linger for dismissal on error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub status: TaskStatus,
    pub is_indeterminate: bool,
    pub percentage: Option<i32>,
    pub payload: HashMap<String, String>,
    pub error: Option<String>,
    pub create_time: DateTime<Utc>,
    pub update_time: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(user_id: Uuid, name: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            status,
            is_indeterminate: true,
            percentage: None,
            payload: HashMap::new(),
            error: None,
            create_time: Utc::now(),
            update_time: None,
        }
    }

    pub fn with_payload_object(mut self, object: impl Into<String>) -> Self {
        self.payload
            .insert(TASK_PAYLOAD_OBJECT_KEY.to_string(), object.into());
        self
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// A pending task blocks new pipeline submissions for its snapshot.
    pub fn is_pending(&self) -> bool {
        matches!(self.status, TaskStatus::Waiting | TaskStatus::Running)
    }

    pub fn touch(&mut self) {
        self.update_time = Some(Utc::now());
    }
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Task {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::types::Json;
        use sqlx::Row;
        Ok(Task {
            id: row.get("id"),
            user_id: row.get("user_id"),
            name: row.get("name"),
            status: row.get::<String, _>("status").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse task status: {}", e).into())
            })?,
            is_indeterminate: row.get("is_indeterminate"),
            percentage: row.get("percentage"),
            payload: row
                .try_get::<Option<Json<HashMap<String, String>>>, _>("payload")?
                .map(|json| json.0)
                .unwrap_or_default(),
            error: row.get("error"),
            create_time: row.get("create_time"),
            update_time: row.get("update_time"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_states() {
        let user = Uuid::new_v4();
        let waiting = Task::new(user, "Waiting.", TaskStatus::Waiting);
        let running = Task::new(user, "Running.", TaskStatus::Running);
        let mut errored = Task::new(user, "Failed.", TaskStatus::Error);
        errored.error = Some("conversion failed".to_string());

        assert!(waiting.is_pending());
        assert!(running.is_pending());
        assert!(!errored.is_pending());
        assert!(errored.has_error());
    }

    #[test]
    fn test_payload_object() {
        let task =
            Task::new(Uuid::new_v4(), "Copying.", TaskStatus::Running).with_payload_object("a.pdf");
        assert_eq!(
            task.payload.get(TASK_PAYLOAD_OBJECT_KEY).map(String::as_str),
            Some("a.pdf")
        );
    }
}
