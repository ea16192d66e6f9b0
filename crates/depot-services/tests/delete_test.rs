//! Deletion: synchronous file deletes, fanned-out folder deletes, bulk
//! partial failure, root protection.

use depot_core::AppError;
use depot_services::test_helpers::TestContext;
use uuid::Uuid;

#[tokio::test]
async fn test_workspace_root_cannot_be_deleted() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;

    let err = ctx
        .file_delete
        .delete_one(workspace.root_id, user)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CannotDeleteWorkspaceRoot(_)));
    assert!(ctx
        .file_repo
        .find_optional(workspace.root_id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_file_delete_is_fully_synchronous() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "doc.txt", user).await;
    let file = ctx
        .store_content(&workspace, file.id, "hello", user)
        .await
        .unwrap();
    let snapshot = ctx
        .snapshot_cache
        .get(file.snapshot_id.unwrap())
        .await
        .unwrap();
    let original = snapshot.original.clone().unwrap();
    assert!(ctx.blob_store.contains(&original.key, &original.bucket));

    ctx.file_delete.delete_one(file.id, user).await.unwrap();

    // Store row, snapshot, blob artifact, search entry and tasks are all
    // gone by the time the call returns
    assert!(ctx.file_repo.find_optional(file.id).await.unwrap().is_none());
    assert_eq!(ctx.db.snapshot_count(), 0);
    assert!(!ctx.blob_store.contains(&original.key, &original.bucket));
    assert!(!ctx.search_provider.contains("file", &file.id.to_string()));
    assert_eq!(ctx.db.task_count(), 0);
}

#[tokio::test]
async fn test_folder_delete_removes_root_then_fans_out() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let folder = ctx.create_folder(&workspace, workspace.root_id, "folder", user).await;
    let nested = ctx.create_folder(&workspace, folder.id, "nested", user).await;
    let file = ctx.create_file(&workspace, nested.id, "doc.txt", user).await;
    let file = ctx
        .store_content(&workspace, file.id, "hello", user)
        .await
        .unwrap();

    ctx.file_delete.delete_one(folder.id, user).await.unwrap();

    // The root row disappears synchronously for quick feedback
    assert!(ctx
        .file_repo
        .find_optional(folder.id)
        .await
        .unwrap()
        .is_none());

    // Descendants follow once the detached sweep completes
    ctx.fanout.wait_idle().await;
    assert!(ctx.file_repo.find_optional(nested.id).await.unwrap().is_none());
    assert!(ctx.file_repo.find_optional(file.id).await.unwrap().is_none());
    assert_eq!(ctx.db.snapshot_count(), 0);
    assert!(!ctx.search_provider.contains("file", &nested.id.to_string()));
    assert!(!ctx.search_provider.contains("file", &file.id.to_string()));
    assert_eq!(ctx.db.task_count(), 0);
}

#[tokio::test]
async fn test_bulk_delete_attempts_each_item_independently() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let other = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let other_workspace = ctx.create_workspace(other).await;

    let id1 = ctx.create_file(&workspace, workspace.root_id, "a.txt", user).await.id;
    let id2 = ctx
        .create_file(&other_workspace, other_workspace.root_id, "b.txt", other)
        .await
        .id;
    let id3 = ctx.create_file(&workspace, workspace.root_id, "c.txt", user).await.id;

    let result = ctx
        .file_delete
        .delete_many(&[id1, id2, id3], user)
        .await
        .unwrap();
    assert_eq!(result.succeeded, vec![id1, id3]);
    assert_eq!(result.failed, vec![id2]);

    // The unauthorized file's content is intact
    assert!(ctx.file_repo.find_optional(id2).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_requires_owner() {
    let ctx = TestContext::new();
    let owner = Uuid::new_v4();
    let editor = Uuid::new_v4();
    let workspace = ctx.create_workspace(owner).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "a.txt", owner).await;

    ctx.file_permission
        .grant_user_permission(
            &[file.id],
            editor,
            depot_core::models::Permission::Editor,
            owner,
        )
        .await
        .unwrap();
    let err = ctx.file_delete.delete_one(file.id, editor).await.unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));
}
