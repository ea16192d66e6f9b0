//! PostgreSQL repository implementations.

mod file;
mod group;
mod permission;
mod snapshot;
mod task;
mod workspace;

pub use file::FileRepository;
pub use group::GroupRepository;
pub use permission::PermissionRepository;
pub use snapshot::SnapshotRepository;
pub use task::TaskRepository;
pub use workspace::WorkspaceRepository;

/// Run pending migrations from the crate's `migrations/` directory.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
