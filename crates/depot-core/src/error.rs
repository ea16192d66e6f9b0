//! Error types module
//!
//! All errors are unified under the `AppError` enum which can represent
//! database, storage, search, pipeline, and domain-specific errors.
//!
//! Viewer-level authorization failures map to the NotFound variants on
//! purpose: existence of a resource must not leak to callers that cannot
//! see it. Owner-only operations use `PermissionDenied` instead.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the
//! `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "FILE_NOT_FOUND")
    fn error_code(&self) -> &'static str;

    /// HTTP status code an API layer would return
    fn http_status_code(&self) -> u16;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Permission denied on resource: {0}")]
    PermissionDenied(String),

    #[error("File is not a folder: {0}")]
    FileIsNotAFolder(String),

    #[error("File is not a file: {0}")]
    FileIsNotAFile(String),

    #[error("File cannot be copied into itself: {0}")]
    FileCannotBeCopiedIntoItself(String),

    #[error("File cannot be copied into its own subtree: {0}")]
    FileCannotBeCopiedIntoOwnSubtree(String),

    #[error("File cannot be moved into itself: {0}")]
    FileCannotBeMovedIntoItself(String),

    #[error("File is already a child of the destination: {0}")]
    FileAlreadyChildOfDestination(String),

    #[error("Target is a grandchild of the source: {0}")]
    TargetIsGrandChildOfSource(String),

    #[error("A file with a similar name already exists: {0}")]
    FileWithSimilarNameExists(String),

    #[error("Workspace root cannot be deleted: {0}")]
    CannotDeleteWorkspaceRoot(String),

    #[error("Snapshot has a pending task: {0}")]
    SnapshotHasPendingTask(String),

    #[error("Snapshot has no original artifact: {0}")]
    MissingOriginalArtifact(String),

    #[error("Task is still running: {0}")]
    TaskIsRunning(String),

    #[error("Task belongs to another user: {0}")]
    TaskBelongsToAnotherUser(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Static metadata per variant: (error_code, http_status, log_level).
fn static_metadata(err: &AppError) -> (&'static str, u16, LogLevel) {
    match err {
        AppError::Database(_) => ("DATABASE_ERROR", 500, LogLevel::Error),
        AppError::Storage(_) => ("STORAGE_ERROR", 500, LogLevel::Error),
        AppError::Search(_) => ("SEARCH_ERROR", 500, LogLevel::Error),
        AppError::Pipeline(_) => ("PIPELINE_ERROR", 502, LogLevel::Error),
        AppError::FileNotFound(_) => ("FILE_NOT_FOUND", 404, LogLevel::Debug),
        AppError::SnapshotNotFound(_) => ("SNAPSHOT_NOT_FOUND", 404, LogLevel::Debug),
        AppError::TaskNotFound(_) => ("TASK_NOT_FOUND", 404, LogLevel::Debug),
        AppError::WorkspaceNotFound(_) => ("WORKSPACE_NOT_FOUND", 404, LogLevel::Debug),
        AppError::GroupNotFound(_) => ("GROUP_NOT_FOUND", 404, LogLevel::Debug),
        AppError::PermissionDenied(_) => ("PERMISSION_DENIED", 403, LogLevel::Debug),
        AppError::FileIsNotAFolder(_) => ("FILE_IS_NOT_A_FOLDER", 400, LogLevel::Debug),
        AppError::FileIsNotAFile(_) => ("FILE_IS_NOT_A_FILE", 400, LogLevel::Debug),
        AppError::FileCannotBeCopiedIntoItself(_) => {
            ("FILE_CANNOT_BE_COPIED_INTO_ITSELF", 400, LogLevel::Debug)
        }
        AppError::FileCannotBeCopiedIntoOwnSubtree(_) => (
            "FILE_CANNOT_BE_COPIED_INTO_OWN_SUBTREE",
            400,
            LogLevel::Debug,
        ),
        AppError::FileCannotBeMovedIntoItself(_) => {
            ("FILE_CANNOT_BE_MOVED_INTO_ITSELF", 400, LogLevel::Debug)
        }
        AppError::FileAlreadyChildOfDestination(_) => {
            ("FILE_ALREADY_CHILD_OF_DESTINATION", 400, LogLevel::Debug)
        }
        AppError::TargetIsGrandChildOfSource(_) => {
            ("TARGET_IS_GRAND_CHILD_OF_SOURCE", 400, LogLevel::Debug)
        }
        AppError::FileWithSimilarNameExists(_) => {
            ("FILE_WITH_SIMILAR_NAME_EXISTS", 409, LogLevel::Debug)
        }
        AppError::CannotDeleteWorkspaceRoot(_) => {
            ("CANNOT_DELETE_WORKSPACE_ROOT", 400, LogLevel::Debug)
        }
        AppError::SnapshotHasPendingTask(_) => ("SNAPSHOT_HAS_PENDING_TASK", 409, LogLevel::Debug),
        AppError::MissingOriginalArtifact(_) => ("MISSING_ORIGINAL_ARTIFACT", 400, LogLevel::Debug),
        AppError::TaskIsRunning(_) => ("TASK_IS_RUNNING", 400, LogLevel::Debug),
        AppError::TaskBelongsToAnotherUser(_) => {
            ("TASK_BELONGS_TO_ANOTHER_USER", 403, LogLevel::Debug)
        }
        AppError::InvalidInput(_) => ("INVALID_INPUT", 400, LogLevel::Debug),
        AppError::Internal(_) => ("INTERNAL_ERROR", 500, LogLevel::Error),
    }
}

impl AppError {
    /// True for the NotFound class, which deliberately also covers
    /// resources the caller is not allowed to see.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::FileNotFound(_)
                | AppError::SnapshotNotFound(_)
                | AppError::TaskNotFound(_)
                | AppError::WorkspaceNotFound(_)
                | AppError::GroupNotFound(_)
        )
    }

    /// Get detailed error information including the source chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();
        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }
        details
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        static_metadata(self).0
    }

    fn http_status_code(&self) -> u16 {
        static_metadata(self).1
    }

    fn log_level(&self) -> LogLevel {
        static_metadata(self).2
    }
}
