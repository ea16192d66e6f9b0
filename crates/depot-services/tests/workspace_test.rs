//! Workspace provisioning and visibility.

use depot_core::models::Permission;
use depot_core::AppError;
use depot_services::test_helpers::TestContext;
use uuid::Uuid;

#[tokio::test]
async fn test_create_provisions_root_folder() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;

    let root = ctx.file_cache.get(workspace.root_id).await.unwrap();
    assert!(root.is_folder());
    assert!(root.is_workspace_root());
    assert_eq!(root.workspace_id, workspace.id);
    assert!(!workspace.bucket.is_empty());

    // The creator owns both the workspace and its root
    assert!(ctx
        .file_guard
        .is_authorized(user, &root, Permission::Owner)
        .await);
    assert!(ctx
        .workspace_guard
        .is_authorized(user, &workspace, Permission::Owner)
        .await);
}

#[tokio::test]
async fn test_find_all_is_viewer_filtered() {
    let ctx = TestContext::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let mine = ctx.create_workspace(alice).await;
    let theirs = ctx.create_workspace(bob).await;

    let visible = ctx.workspace_service.find_all(alice).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, mine.id);

    // Lookup of a foreign workspace conflates to not-found
    let err = ctx
        .workspace_service
        .find(theirs.id, alice)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::WorkspaceNotFound(_)));
}
