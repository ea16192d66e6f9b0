//! Repository trait abstractions
//!
//! These traits define the persistence interface consumed by the service
//! layer. The Postgres implementations live in [`crate::postgres`];
//! in-memory doubles used by service tests implement the same traits.

use async_trait::async_trait;
use depot_core::models::{
    File, Group, GroupPermission, Permission, Snapshot, SnapshotFileMapping, Task, UserPermission,
    Workspace,
};
use depot_core::AppError;
use uuid::Uuid;

/// Persistence operations over the file tree.
///
/// Tree queries (`find_tree*`, `find_path`, `is_grandchild_of`) are
/// expressed against the parent-pointer representation; implementations are
/// expected to resolve them without loading unrelated subtrees.
#[async_trait]
pub trait FileRepo: Send + Sync {
    async fn insert(&self, file: &File) -> Result<(), AppError>;

    /// Find by id, failing with `FileNotFound`.
    async fn find(&self, id: Uuid) -> Result<File, AppError>;

    async fn find_optional(&self, id: Uuid) -> Result<Option<File>, AppError>;

    async fn save(&self, file: &File) -> Result<(), AppError>;

    async fn delete(&self, id: Uuid) -> Result<(), AppError>;

    /// Delete a bounded chunk of rows by id. Idempotent.
    async fn delete_chunk(&self, ids: &[Uuid]) -> Result<(), AppError>;

    /// Insert many rows in bounded chunks.
    async fn bulk_insert(&self, files: &[File], chunk_size: usize) -> Result<(), AppError>;

    async fn find_children(&self, id: Uuid) -> Result<Vec<File>, AppError>;

    async fn find_child_with_name(
        &self,
        parent_id: Uuid,
        name: &str,
    ) -> Result<Option<File>, AppError>;

    /// Root-to-node path, inclusive.
    async fn find_path(&self, id: Uuid) -> Result<Vec<File>, AppError>;

    /// Every node of the subtree rooted at `id`, root included.
    async fn find_tree(&self, id: Uuid) -> Result<Vec<File>, AppError>;

    async fn find_tree_ids(&self, id: Uuid) -> Result<Vec<Uuid>, AppError>;

    /// Whether `candidate_id` lies anywhere in the subtree rooted at
    /// `ancestor_id`. Used to block cyclic moves and copies.
    async fn is_grandchild_of(
        &self,
        candidate_id: Uuid,
        ancestor_id: Uuid,
    ) -> Result<bool, AppError>;

    /// Re-parent `source_id` under `target_id` with a single parent-pointer
    /// update.
    async fn move_source_into_target(
        &self,
        target_id: Uuid,
        source_id: Uuid,
    ) -> Result<(), AppError>;

    async fn find_ids_by_snapshot(&self, snapshot_id: Uuid) -> Result<Vec<Uuid>, AppError>;

    async fn clear_snapshot_id(&self, file_id: Uuid) -> Result<(), AppError>;

    async fn grant_user_permission(
        &self,
        resource_id: Uuid,
        user_id: Uuid,
        permission: Permission,
    ) -> Result<(), AppError>;

    async fn revoke_user_permission(
        &self,
        resource_ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<(), AppError>;

    async fn grant_group_permission(
        &self,
        resource_id: Uuid,
        group_id: Uuid,
        permission: Permission,
    ) -> Result<(), AppError>;

    async fn revoke_group_permission(
        &self,
        resource_ids: &[Uuid],
        group_id: Uuid,
    ) -> Result<(), AppError>;

    async fn bulk_insert_user_permissions(
        &self,
        permissions: &[UserPermission],
        chunk_size: usize,
    ) -> Result<(), AppError>;
}

/// Persistence operations over snapshots and the snapshot-file mapping
/// table.
///
/// The mapping table serves two purposes: it lets copies share snapshot
/// content without duplicating blobs, and it is the per-file version
/// ledger. Mapping rows record the version at association time and
/// outlive snapshot deletion, so version numbers are never reissued.
#[async_trait]
pub trait SnapshotRepo: Send + Sync {
    async fn insert(&self, snapshot: &Snapshot) -> Result<(), AppError>;

    async fn save(&self, snapshot: &Snapshot) -> Result<(), AppError>;

    /// Find by id, failing with `SnapshotNotFound`.
    async fn find(&self, id: Uuid) -> Result<Snapshot, AppError>;

    async fn find_optional(&self, id: Uuid) -> Result<Option<Snapshot>, AppError>;

    /// Delete the snapshot row. Ledger rows in the mapping table survive;
    /// only `detach` and `delete_mappings_for_file` remove them.
    async fn delete(&self, id: Uuid) -> Result<(), AppError>;

    async fn find_all_for_file(&self, file_id: Uuid) -> Result<Vec<Snapshot>, AppError>;

    async fn find_ids_by_file(&self, file_id: Uuid) -> Result<Vec<Uuid>, AppError>;

    /// Snapshots whose only remaining association is `file_id`; these are
    /// owned exclusively and die with the file.
    async fn find_exclusive_for_file(&self, file_id: Uuid) -> Result<Vec<Snapshot>, AppError>;

    /// Highest version the file has ever been mapped to, 0 when none.
    /// Computed over the ledger so deleted versions stay burned.
    async fn find_latest_version_for_file(&self, file_id: Uuid) -> Result<i64, AppError>;

    async fn map_with_file(&self, snapshot_id: Uuid, file_id: Uuid) -> Result<(), AppError>;

    async fn bulk_map_with_file(
        &self,
        mappings: &[SnapshotFileMapping],
        chunk_size: usize,
    ) -> Result<(), AppError>;

    async fn delete_mappings_for_file(&self, file_id: Uuid) -> Result<(), AppError>;

    async fn count_associations(&self, snapshot_id: Uuid) -> Result<i64, AppError>;

    async fn detach(&self, snapshot_id: Uuid, file_id: Uuid) -> Result<(), AppError>;

    /// A file currently associated with the snapshot, failing with
    /// `SnapshotNotFound` when no mapping exists.
    async fn find_file_id(&self, snapshot_id: Uuid) -> Result<Uuid, AppError>;
}

#[async_trait]
pub trait TaskRepo: Send + Sync {
    async fn insert(&self, task: &Task) -> Result<(), AppError>;

    async fn save(&self, task: &Task) -> Result<(), AppError>;

    /// Find by id, failing with `TaskNotFound`.
    async fn find(&self, id: Uuid) -> Result<Task, AppError>;

    async fn find_optional(&self, id: Uuid) -> Result<Option<Task>, AppError>;

    async fn delete(&self, id: Uuid) -> Result<(), AppError>;

    async fn find_ids_by_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, AppError>;

    async fn count_by_user(&self, user_id: Uuid) -> Result<i64, AppError>;
}

/// Read side of the permission store; writes go through [`FileRepo`] so
/// that grants and tree mutations stay in one place.
#[async_trait]
pub trait PermissionRepo: Send + Sync {
    async fn find_user_permissions(
        &self,
        resource_id: Uuid,
    ) -> Result<Vec<UserPermission>, AppError>;

    async fn find_group_permissions(
        &self,
        resource_id: Uuid,
    ) -> Result<Vec<GroupPermission>, AppError>;
}

#[async_trait]
pub trait WorkspaceRepo: Send + Sync {
    async fn insert(&self, workspace: &Workspace) -> Result<(), AppError>;

    /// Find by id, failing with `WorkspaceNotFound`.
    async fn find(&self, id: Uuid) -> Result<Workspace, AppError>;

    async fn save(&self, workspace: &Workspace) -> Result<(), AppError>;

    async fn find_all(&self) -> Result<Vec<Workspace>, AppError>;
}

#[async_trait]
pub trait GroupRepo: Send + Sync {
    async fn insert(&self, group: &Group) -> Result<(), AppError>;

    /// Find by id, failing with `GroupNotFound`.
    async fn find(&self, id: Uuid) -> Result<Group, AppError>;

    /// Ids of every group the user belongs to.
    async fn find_ids_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, AppError>;
}
