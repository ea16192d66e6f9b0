//! Database layer for Depot
//!
//! Repository traits describe the persistence operations the services need;
//! the `postgres` module provides the production implementations on sqlx.
//! Keeping the traits object-safe lets tests substitute in-memory doubles
//! without a database.

pub mod postgres;
pub mod repo;

pub use repo::{FileRepo, GroupRepo, PermissionRepo, SnapshotRepo, TaskRepo, WorkspaceRepo};

pub use postgres::{
    FileRepository, GroupRepository, PermissionRepository, SnapshotRepository, TaskRepository,
    WorkspaceRepository,
};
