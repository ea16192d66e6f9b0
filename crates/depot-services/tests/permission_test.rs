//! Permission resolution: max-weight arithmetic, group derivation, the
//! viewer-level not-found conflation, grant/revoke propagation.

use depot_core::models::Permission;
use depot_core::AppError;
use depot_services::test_helpers::TestContext;
use uuid::Uuid;

#[tokio::test]
async fn test_effective_permission_is_max_not_sum() {
    let ctx = TestContext::new();
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();
    let workspace = ctx.create_workspace(owner).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "a.txt", owner).await;

    // Direct viewer grant plus owner through group membership: the max wins
    let group = ctx.seed_group(workspace.organization_id, owner, vec![member]).await;
    ctx.file_permission
        .grant_user_permission(&[file.id], member, Permission::Viewer, owner)
        .await
        .unwrap();
    ctx.file_permission
        .grant_group_permission(&[file.id], group.id, Permission::Owner, owner)
        .await
        .unwrap();

    let file = ctx.file_cache.get(file.id).await.unwrap();
    let effective = ctx
        .file_guard
        .effective_permission(member, &file)
        .await
        .unwrap();
    assert_eq!(effective, Permission::Owner);
}

#[tokio::test]
async fn test_granting_viewer_after_owner_keeps_owner() {
    let ctx = TestContext::new();
    let owner = Uuid::new_v4();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(owner).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "a.txt", owner).await;

    ctx.file_permission
        .grant_user_permission(&[file.id], user, Permission::Owner, owner)
        .await
        .unwrap();
    ctx.file_permission
        .grant_user_permission(&[file.id], user, Permission::Viewer, owner)
        .await
        .unwrap();

    let file = ctx.file_cache.get(file.id).await.unwrap();
    let effective = ctx
        .file_guard
        .effective_permission(user, &file)
        .await
        .unwrap();
    assert_eq!(effective, Permission::Owner);
}

#[tokio::test]
async fn test_viewer_failure_reads_as_not_found() {
    let ctx = TestContext::new();
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let workspace = ctx.create_workspace(owner).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "secret.txt", owner).await;

    // Existence must not leak to a caller without viewer
    let err = ctx.file_fetch.find(&[file.id], stranger).await.unwrap_err();
    assert!(matches!(err, AppError::FileNotFound(_)));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_owner_only_operations_read_as_permission_denied() {
    let ctx = TestContext::new();
    let owner = Uuid::new_v4();
    let editor = Uuid::new_v4();
    let workspace = ctx.create_workspace(owner).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "a.txt", owner).await;

    ctx.file_permission
        .grant_user_permission(&[file.id], editor, Permission::Editor, owner)
        .await
        .unwrap();

    // Editor can see the grants exist but cannot manage them
    let err = ctx
        .file_permission
        .grant_user_permission(&[file.id], Uuid::new_v4(), Permission::Viewer, editor)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_grant_requires_owner_on_each_resource() {
    let ctx = TestContext::new();
    let owner = Uuid::new_v4();
    let other = Uuid::new_v4();
    let workspace = ctx.create_workspace(owner).await;
    let other_workspace = ctx.create_workspace(other).await;
    let mine = ctx.create_file(&workspace, workspace.root_id, "mine.txt", owner).await;
    let theirs = ctx
        .create_file(&other_workspace, other_workspace.root_id, "theirs.txt", other)
        .await;

    let err = ctx
        .file_permission
        .grant_user_permission(
            &[mine.id, theirs.id],
            Uuid::new_v4(),
            Permission::Viewer,
            owner,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_revoke_walks_the_subtree() {
    let ctx = TestContext::new();
    let owner = Uuid::new_v4();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(owner).await;
    let folder = ctx.create_folder(&workspace, workspace.root_id, "folder", owner).await;
    let file = ctx.create_file(&workspace, folder.id, "a.txt", owner).await;

    ctx.file_permission
        .grant_user_permission(&[folder.id, file.id], user, Permission::Editor, owner)
        .await
        .unwrap();
    assert!(!ctx.file_fetch.find(&[file.id], user).await.unwrap().is_empty());

    ctx.file_permission
        .revoke_user_permission(&[folder.id], user, owner)
        .await
        .unwrap();

    // Both the folder grant and the descendant grant are gone
    let err = ctx.file_fetch.find(&[folder.id], user).await.unwrap_err();
    assert!(err.is_not_found());
    let err = ctx.file_fetch.find(&[file.id], user).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_group_grant_applies_to_members_only() {
    let ctx = TestContext::new();
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();
    let outsider = Uuid::new_v4();
    let workspace = ctx.create_workspace(owner).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "a.txt", owner).await;
    let group = ctx.seed_group(workspace.organization_id, owner, vec![member]).await;

    ctx.file_permission
        .grant_group_permission(&[file.id], group.id, Permission::Viewer, owner)
        .await
        .unwrap();

    assert_eq!(ctx.file_fetch.find(&[file.id], member).await.unwrap().len(), 1);
    let err = ctx.file_fetch.find(&[file.id], outsider).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_group_revoke_removes_derived_access() {
    let ctx = TestContext::new();
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();
    let workspace = ctx.create_workspace(owner).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "a.txt", owner).await;
    let group = ctx.seed_group(workspace.organization_id, owner, vec![member]).await;

    ctx.file_permission
        .grant_group_permission(&[file.id], group.id, Permission::Editor, owner)
        .await
        .unwrap();
    ctx.file_permission
        .revoke_group_permission(&[file.id], group.id, owner)
        .await
        .unwrap();

    let err = ctx.file_fetch.find(&[file.id], member).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_permission_listings_require_owner() {
    let ctx = TestContext::new();
    let owner = Uuid::new_v4();
    let viewer = Uuid::new_v4();
    let workspace = ctx.create_workspace(owner).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "a.txt", owner).await;

    ctx.file_permission
        .grant_user_permission(&[file.id], viewer, Permission::Viewer, owner)
        .await
        .unwrap();

    // The owner's own grant is excluded from the listing
    let grants = ctx
        .file_permission
        .find_user_permissions(file.id, owner)
        .await
        .unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].user_id, viewer);
    assert_eq!(grants[0].permission, Permission::Viewer);

    let err = ctx
        .file_permission
        .find_user_permissions(file.id, viewer)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));
}
