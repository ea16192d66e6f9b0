//! In-memory repository doubles.
//!
//! One shared state behind a mutex, with a view struct per repository
//! trait. Tree queries mirror the semantics of the Postgres recursive
//! CTEs; grant rows are additive, exactly like the production tables.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use depot_core::models::{
    File, Group, GroupPermission, Permission, Snapshot, SnapshotFileMapping, Task, UserPermission,
    Workspace,
};
use depot_core::AppError;
use depot_db::{FileRepo, GroupRepo, PermissionRepo, SnapshotRepo, TaskRepo, WorkspaceRepo};

/// Ledger row of the snapshot_file table: survives snapshot deletion and
/// pins the version number it was issued under.
struct MappingRow {
    snapshot_id: Uuid,
    file_id: Uuid,
    version: i64,
}

#[derive(Default)]
struct State {
    files: HashMap<Uuid, File>,
    snapshots: HashMap<Uuid, Snapshot>,
    mappings: Vec<MappingRow>,
    tasks: HashMap<Uuid, Task>,
    user_permissions: Vec<UserPermission>,
    group_permissions: Vec<GroupPermission>,
    workspaces: HashMap<Uuid, Workspace>,
    groups: HashMap<Uuid, Group>,
}

impl State {
    fn children_of(&self, id: Uuid) -> Vec<&File> {
        let mut children: Vec<&File> = self
            .files
            .values()
            .filter(|f| f.parent_id == Some(id))
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        children
    }

    /// Subtree ids rooted at `id`, root included, parents before children.
    fn tree_ids(&self, id: Uuid) -> Vec<Uuid> {
        let mut result = Vec::new();
        let mut queue = vec![id];
        while let Some(current) = queue.pop() {
            if !self.files.contains_key(&current) && current != id {
                continue;
            }
            result.push(current);
            for child in self.children_of(current) {
                queue.push(child.id);
            }
        }
        result
    }
}

/// Shared in-memory database handed to every repository view.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_repo(&self) -> MemoryFileRepo {
        MemoryFileRepo { db: self.clone() }
    }

    pub fn snapshot_repo(&self) -> MemorySnapshotRepo {
        MemorySnapshotRepo { db: self.clone() }
    }

    pub fn task_repo(&self) -> MemoryTaskRepo {
        MemoryTaskRepo { db: self.clone() }
    }

    pub fn permission_repo(&self) -> MemoryPermissionRepo {
        MemoryPermissionRepo { db: self.clone() }
    }

    pub fn workspace_repo(&self) -> MemoryWorkspaceRepo {
        MemoryWorkspaceRepo { db: self.clone() }
    }

    pub fn group_repo(&self) -> MemoryGroupRepo {
        MemoryGroupRepo { db: self.clone() }
    }

    pub fn file_count(&self) -> usize {
        self.state.lock().unwrap().files.len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.state.lock().unwrap().snapshots.len()
    }

    pub fn task_count(&self) -> usize {
        self.state.lock().unwrap().tasks.len()
    }
}

#[derive(Clone)]
pub struct MemoryFileRepo {
    db: MemoryDatabase,
}

#[async_trait]
impl FileRepo for MemoryFileRepo {
    async fn insert(&self, file: &File) -> Result<(), AppError> {
        self.db
            .state
            .lock()
            .unwrap()
            .files
            .insert(file.id, file.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<File, AppError> {
        self.find_optional(id)
            .await?
            .ok_or_else(|| AppError::FileNotFound(id.to_string()))
    }

    async fn find_optional(&self, id: Uuid) -> Result<Option<File>, AppError> {
        Ok(self.db.state.lock().unwrap().files.get(&id).cloned())
    }

    async fn save(&self, file: &File) -> Result<(), AppError> {
        self.db
            .state
            .lock()
            .unwrap()
            .files
            .insert(file.id, file.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.db.state.lock().unwrap().files.remove(&id);
        Ok(())
    }

    async fn delete_chunk(&self, ids: &[Uuid]) -> Result<(), AppError> {
        let mut state = self.db.state.lock().unwrap();
        for id in ids {
            state.files.remove(id);
        }
        Ok(())
    }

    async fn bulk_insert(&self, files: &[File], _chunk_size: usize) -> Result<(), AppError> {
        let mut state = self.db.state.lock().unwrap();
        for file in files {
            state.files.insert(file.id, file.clone());
        }
        Ok(())
    }

    async fn find_children(&self, id: Uuid) -> Result<Vec<File>, AppError> {
        let state = self.db.state.lock().unwrap();
        Ok(state.children_of(id).into_iter().cloned().collect())
    }

    async fn find_child_with_name(
        &self,
        parent_id: Uuid,
        name: &str,
    ) -> Result<Option<File>, AppError> {
        let state = self.db.state.lock().unwrap();
        Ok(state
            .files
            .values()
            .find(|f| f.parent_id == Some(parent_id) && f.name == name)
            .cloned())
    }

    async fn find_path(&self, id: Uuid) -> Result<Vec<File>, AppError> {
        let state = self.db.state.lock().unwrap();
        let mut path = Vec::new();
        let mut current = state.files.get(&id);
        while let Some(file) = current {
            path.insert(0, file.clone());
            current = file.parent_id.and_then(|pid| state.files.get(&pid));
        }
        Ok(path)
    }

    async fn find_tree(&self, id: Uuid) -> Result<Vec<File>, AppError> {
        let state = self.db.state.lock().unwrap();
        Ok(state
            .tree_ids(id)
            .into_iter()
            .filter_map(|tree_id| state.files.get(&tree_id).cloned())
            .collect())
    }

    async fn find_tree_ids(&self, id: Uuid) -> Result<Vec<Uuid>, AppError> {
        Ok(self.db.state.lock().unwrap().tree_ids(id))
    }

    async fn is_grandchild_of(
        &self,
        candidate_id: Uuid,
        ancestor_id: Uuid,
    ) -> Result<bool, AppError> {
        Ok(self
            .db
            .state
            .lock()
            .unwrap()
            .tree_ids(ancestor_id)
            .contains(&candidate_id))
    }

    async fn move_source_into_target(
        &self,
        target_id: Uuid,
        source_id: Uuid,
    ) -> Result<(), AppError> {
        let mut state = self.db.state.lock().unwrap();
        let source = state
            .files
            .get_mut(&source_id)
            .ok_or_else(|| AppError::FileNotFound(source_id.to_string()))?;
        source.parent_id = Some(target_id);
        Ok(())
    }

    async fn find_ids_by_snapshot(&self, snapshot_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let state = self.db.state.lock().unwrap();
        Ok(state
            .mappings
            .iter()
            .filter(|m| m.snapshot_id == snapshot_id)
            .map(|m| m.file_id)
            .collect())
    }

    async fn clear_snapshot_id(&self, file_id: Uuid) -> Result<(), AppError> {
        let mut state = self.db.state.lock().unwrap();
        if let Some(file) = state.files.get_mut(&file_id) {
            file.snapshot_id = None;
        }
        Ok(())
    }

    async fn grant_user_permission(
        &self,
        resource_id: Uuid,
        user_id: Uuid,
        permission: Permission,
    ) -> Result<(), AppError> {
        self.db
            .state
            .lock()
            .unwrap()
            .user_permissions
            .push(UserPermission::new(user_id, resource_id, permission));
        Ok(())
    }

    async fn revoke_user_permission(
        &self,
        resource_ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<(), AppError> {
        self.db
            .state
            .lock()
            .unwrap()
            .user_permissions
            .retain(|p| !(p.user_id == user_id && resource_ids.contains(&p.resource_id)));
        Ok(())
    }

    async fn grant_group_permission(
        &self,
        resource_id: Uuid,
        group_id: Uuid,
        permission: Permission,
    ) -> Result<(), AppError> {
        self.db
            .state
            .lock()
            .unwrap()
            .group_permissions
            .push(GroupPermission::new(group_id, resource_id, permission));
        Ok(())
    }

    async fn revoke_group_permission(
        &self,
        resource_ids: &[Uuid],
        group_id: Uuid,
    ) -> Result<(), AppError> {
        self.db
            .state
            .lock()
            .unwrap()
            .group_permissions
            .retain(|p| !(p.group_id == group_id && resource_ids.contains(&p.resource_id)));
        Ok(())
    }

    async fn bulk_insert_user_permissions(
        &self,
        permissions: &[UserPermission],
        _chunk_size: usize,
    ) -> Result<(), AppError> {
        self.db
            .state
            .lock()
            .unwrap()
            .user_permissions
            .extend_from_slice(permissions);
        Ok(())
    }
}

#[derive(Clone)]
pub struct MemorySnapshotRepo {
    db: MemoryDatabase,
}

#[async_trait]
impl SnapshotRepo for MemorySnapshotRepo {
    async fn insert(&self, snapshot: &Snapshot) -> Result<(), AppError> {
        self.db
            .state
            .lock()
            .unwrap()
            .snapshots
            .insert(snapshot.id, snapshot.clone());
        Ok(())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), AppError> {
        self.db
            .state
            .lock()
            .unwrap()
            .snapshots
            .insert(snapshot.id, snapshot.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Snapshot, AppError> {
        self.find_optional(id)
            .await?
            .ok_or_else(|| AppError::SnapshotNotFound(id.to_string()))
    }

    async fn find_optional(&self, id: Uuid) -> Result<Option<Snapshot>, AppError> {
        Ok(self.db.state.lock().unwrap().snapshots.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        // Ledger rows stay; the version is burned.
        self.db.state.lock().unwrap().snapshots.remove(&id);
        Ok(())
    }

    async fn find_all_for_file(&self, file_id: Uuid) -> Result<Vec<Snapshot>, AppError> {
        let state = self.db.state.lock().unwrap();
        let mut snapshots: Vec<Snapshot> = state
            .mappings
            .iter()
            .filter(|m| m.file_id == file_id)
            .filter_map(|m| state.snapshots.get(&m.snapshot_id).cloned())
            .collect();
        snapshots.sort_by_key(|s| s.version);
        Ok(snapshots)
    }

    async fn find_ids_by_file(&self, file_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let state = self.db.state.lock().unwrap();
        Ok(state
            .mappings
            .iter()
            .filter(|m| m.file_id == file_id && state.snapshots.contains_key(&m.snapshot_id))
            .map(|m| m.snapshot_id)
            .collect())
    }

    async fn find_exclusive_for_file(&self, file_id: Uuid) -> Result<Vec<Snapshot>, AppError> {
        let state = self.db.state.lock().unwrap();
        let mut result = Vec::new();
        for snapshot in state.snapshots.values() {
            let file_ids: Vec<Uuid> = state
                .mappings
                .iter()
                .filter(|m| m.snapshot_id == snapshot.id)
                .map(|m| m.file_id)
                .collect();
            if !file_ids.is_empty() && file_ids.iter().all(|&f| f == file_id) {
                result.push(snapshot.clone());
            }
        }
        Ok(result)
    }

    async fn find_latest_version_for_file(&self, file_id: Uuid) -> Result<i64, AppError> {
        let state = self.db.state.lock().unwrap();
        Ok(state
            .mappings
            .iter()
            .filter(|m| m.file_id == file_id)
            .map(|m| m.version)
            .max()
            .unwrap_or(0))
    }

    async fn map_with_file(&self, snapshot_id: Uuid, file_id: Uuid) -> Result<(), AppError> {
        let mut state = self.db.state.lock().unwrap();
        let Some(version) = state.snapshots.get(&snapshot_id).map(|s| s.version) else {
            return Ok(());
        };
        if !state
            .mappings
            .iter()
            .any(|m| m.snapshot_id == snapshot_id && m.file_id == file_id)
        {
            state.mappings.push(MappingRow {
                snapshot_id,
                file_id,
                version,
            });
        }
        Ok(())
    }

    async fn bulk_map_with_file(
        &self,
        mappings: &[SnapshotFileMapping],
        _chunk_size: usize,
    ) -> Result<(), AppError> {
        for mapping in mappings {
            self.map_with_file(mapping.snapshot_id, mapping.file_id)
                .await?;
        }
        Ok(())
    }

    async fn delete_mappings_for_file(&self, file_id: Uuid) -> Result<(), AppError> {
        self.db
            .state
            .lock()
            .unwrap()
            .mappings
            .retain(|m| m.file_id != file_id);
        Ok(())
    }

    async fn count_associations(&self, snapshot_id: Uuid) -> Result<i64, AppError> {
        let state = self.db.state.lock().unwrap();
        Ok(state
            .mappings
            .iter()
            .filter(|m| m.snapshot_id == snapshot_id)
            .count() as i64)
    }

    async fn detach(&self, snapshot_id: Uuid, file_id: Uuid) -> Result<(), AppError> {
        self.db
            .state
            .lock()
            .unwrap()
            .mappings
            .retain(|m| !(m.snapshot_id == snapshot_id && m.file_id == file_id));
        Ok(())
    }

    async fn find_file_id(&self, snapshot_id: Uuid) -> Result<Uuid, AppError> {
        let state = self.db.state.lock().unwrap();
        state
            .mappings
            .iter()
            .find(|m| m.snapshot_id == snapshot_id)
            .map(|m| m.file_id)
            .ok_or_else(|| AppError::SnapshotNotFound(snapshot_id.to_string()))
    }
}

#[derive(Clone)]
pub struct MemoryTaskRepo {
    db: MemoryDatabase,
}

#[async_trait]
impl TaskRepo for MemoryTaskRepo {
    async fn insert(&self, task: &Task) -> Result<(), AppError> {
        self.db
            .state
            .lock()
            .unwrap()
            .tasks
            .insert(task.id, task.clone());
        Ok(())
    }

    async fn save(&self, task: &Task) -> Result<(), AppError> {
        self.db
            .state
            .lock()
            .unwrap()
            .tasks
            .insert(task.id, task.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Task, AppError> {
        self.find_optional(id)
            .await?
            .ok_or_else(|| AppError::TaskNotFound(id.to_string()))
    }

    async fn find_optional(&self, id: Uuid) -> Result<Option<Task>, AppError> {
        Ok(self.db.state.lock().unwrap().tasks.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.db.state.lock().unwrap().tasks.remove(&id);
        Ok(())
    }

    async fn find_ids_by_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let state = self.db.state.lock().unwrap();
        let mut tasks: Vec<&Task> = state
            .tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .collect();
        tasks.sort_by_key(|t| t.create_time);
        Ok(tasks.into_iter().map(|t| t.id).collect())
    }

    async fn count_by_user(&self, user_id: Uuid) -> Result<i64, AppError> {
        let state = self.db.state.lock().unwrap();
        Ok(state
            .tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .count() as i64)
    }
}

#[derive(Clone)]
pub struct MemoryPermissionRepo {
    db: MemoryDatabase,
}

#[async_trait]
impl PermissionRepo for MemoryPermissionRepo {
    async fn find_user_permissions(
        &self,
        resource_id: Uuid,
    ) -> Result<Vec<UserPermission>, AppError> {
        let state = self.db.state.lock().unwrap();
        Ok(state
            .user_permissions
            .iter()
            .filter(|p| p.resource_id == resource_id)
            .cloned()
            .collect())
    }

    async fn find_group_permissions(
        &self,
        resource_id: Uuid,
    ) -> Result<Vec<GroupPermission>, AppError> {
        let state = self.db.state.lock().unwrap();
        Ok(state
            .group_permissions
            .iter()
            .filter(|p| p.resource_id == resource_id)
            .cloned()
            .collect())
    }
}

#[derive(Clone)]
pub struct MemoryWorkspaceRepo {
    db: MemoryDatabase,
}

#[async_trait]
impl WorkspaceRepo for MemoryWorkspaceRepo {
    async fn insert(&self, workspace: &Workspace) -> Result<(), AppError> {
        self.db
            .state
            .lock()
            .unwrap()
            .workspaces
            .insert(workspace.id, workspace.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Workspace, AppError> {
        self.db
            .state
            .lock()
            .unwrap()
            .workspaces
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::WorkspaceNotFound(id.to_string()))
    }

    async fn save(&self, workspace: &Workspace) -> Result<(), AppError> {
        self.insert(workspace).await
    }

    async fn find_all(&self) -> Result<Vec<Workspace>, AppError> {
        let state = self.db.state.lock().unwrap();
        let mut workspaces: Vec<Workspace> = state.workspaces.values().cloned().collect();
        workspaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(workspaces)
    }
}

#[derive(Clone)]
pub struct MemoryGroupRepo {
    db: MemoryDatabase,
}

#[async_trait]
impl GroupRepo for MemoryGroupRepo {
    async fn insert(&self, group: &Group) -> Result<(), AppError> {
        self.db
            .state
            .lock()
            .unwrap()
            .groups
            .insert(group.id, group.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Group, AppError> {
        self.db
            .state
            .lock()
            .unwrap()
            .groups
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::GroupNotFound(id.to_string()))
    }

    async fn find_ids_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let state = self.db.state.lock().unwrap();
        Ok(state
            .groups
            .values()
            .filter(|g| g.has_member(user_id))
            .map(|g| g.id)
            .collect())
    }
}
