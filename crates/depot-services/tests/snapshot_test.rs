//! Snapshot versioning: strict lineage, predecessor reactivation, worker
//! callbacks, detach garbage collection.

use depot_core::models::{S3Object, SnapshotStatus};
use depot_core::AppError;
use depot_services::file::{S3Reference, StoreOptions};
use depot_services::snapshot_service::{SnapshotListOptions, SnapshotPatchOptions};
use depot_services::test_helpers::TestContext;
use depot_storage::BlobStore;
use uuid::Uuid;

#[tokio::test]
async fn test_versions_strictly_increase() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "doc.txt", user).await;

    for (i, expected_version) in (1..=3).enumerate() {
        let file = ctx
            .store_content(&workspace, file.id, &format!("rev {}", i), user)
            .await
            .unwrap();
        let snapshot = ctx
            .snapshot_cache
            .get(file.snapshot_id.unwrap())
            .await
            .unwrap();
        assert_eq!(snapshot.version, expected_version);
    }

    let list = ctx
        .snapshot_service
        .list(file.id, SnapshotListOptions { page: 1, size: 10, ..Default::default() }, user)
        .await
        .unwrap();
    assert_eq!(list.total_elements, 3);
    let versions: Vec<i64> = list.data.iter().map(|s| s.version).collect();
    assert_eq!(versions, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_versions_never_reused_after_deleting_latest() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "doc.txt", user).await;

    for i in 1..=3 {
        ctx.store_content(&workspace, file.id, &format!("rev {}", i), user)
            .await
            .unwrap();
    }
    let v3 = ctx.file_cache.get(file.id).await.unwrap().snapshot_id.unwrap();
    ctx.snapshot_service.delete(v3, user).await.unwrap();

    // The deleted version number stays burned
    let file = ctx
        .store_content(&workspace, file.id, "rev 4", user)
        .await
        .unwrap();
    let snapshot = ctx
        .snapshot_cache
        .get(file.snapshot_id.unwrap())
        .await
        .unwrap();
    assert_eq!(snapshot.version, 4);
}

#[tokio::test]
async fn test_deleting_active_reactivates_immediate_predecessor() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "doc.txt", user).await;

    let mut snapshot_ids = Vec::new();
    for i in 1..=3 {
        let file = ctx
            .store_content(&workspace, file.id, &format!("rev {}", i), user)
            .await
            .unwrap();
        snapshot_ids.push(file.snapshot_id.unwrap());
    }
    let (v1, v2, v3) = (snapshot_ids[0], snapshot_ids[1], snapshot_ids[2]);

    // v3 is active; deleting it activates v2
    ctx.snapshot_service.delete(v3, user).await.unwrap();
    assert_eq!(ctx.file_cache.get(file.id).await.unwrap().snapshot_id, Some(v2));

    // Reactivate the middle version and delete it: the immediate
    // predecessor v1 wins, not the latest remaining version
    ctx.store_content(&workspace, file.id, "rev 4", user).await.unwrap();
    ctx.snapshot_service.activate(v2, user).await.unwrap();
    ctx.snapshot_service.delete(v2, user).await.unwrap();
    assert_eq!(ctx.file_cache.get(file.id).await.unwrap().snapshot_id, Some(v1));
}

#[tokio::test]
async fn test_deleting_only_snapshot_clears_active_pointer() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "doc.txt", user).await;
    let file = ctx
        .store_content(&workspace, file.id, "only", user)
        .await
        .unwrap();

    ctx.snapshot_service
        .delete(file.snapshot_id.unwrap(), user)
        .await
        .unwrap();
    assert_eq!(ctx.file_cache.get(file.id).await.unwrap().snapshot_id, None);
}

#[tokio::test]
async fn test_worker_callback_finishes_task() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "doc.txt", user).await;
    let file = ctx
        .store_content(&workspace, file.id, "hello", user)
        .await
        .unwrap();
    let snapshot_id = file.snapshot_id.unwrap();

    // The pipeline submission left a waiting task behind
    assert_eq!(ctx.db.task_count(), 1);
    let snapshot = ctx.snapshot_cache.get(snapshot_id).await.unwrap();
    assert_eq!(snapshot.status, SnapshotStatus::Waiting);
    assert!(snapshot.task_id.is_some());

    let patched = ctx
        .snapshot_service
        .patch(
            snapshot_id,
            SnapshotPatchOptions {
                preview: Some(S3Object::new(workspace.bucket.clone(), format!("{}/preview.pdf", snapshot_id))),
                text: Some(S3Object::new(workspace.bucket.clone(), format!("{}/text.txt", snapshot_id))),
                status: Some(SnapshotStatus::Ready),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Success deletes the task and clears the reference
    assert_eq!(patched.status, SnapshotStatus::Ready);
    assert!(patched.task_id.is_none());
    assert!(patched.has_preview());
    assert!(patched.has_text());
    assert_eq!(ctx.db.task_count(), 0);
}

#[tokio::test]
async fn test_update_language_gated_by_pending_task() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "doc.txt", user).await;
    let file = ctx
        .store_content(&workspace, file.id, "hallo", user)
        .await
        .unwrap();
    let snapshot_id = file.snapshot_id.unwrap();

    let err = ctx
        .snapshot_service
        .update_language(file.id, "deu", user)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SnapshotHasPendingTask(_)));

    ctx.snapshot_service
        .patch(
            snapshot_id,
            SnapshotPatchOptions {
                status: Some(SnapshotStatus::Ready),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let snapshot = ctx
        .snapshot_service
        .update_language(file.id, "deu", user)
        .await
        .unwrap();
    assert_eq!(snapshot.language.as_deref(), Some("deu"));

    let err = ctx
        .snapshot_service
        .update_language(file.id, "klingon", user)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_detach_garbage_collects_last_association() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "doc.txt", user).await;
    let v1 = ctx
        .store_content(&workspace, file.id, "rev 1", user)
        .await
        .unwrap()
        .snapshot_id
        .unwrap();
    let v2 = ctx
        .store_content(&workspace, file.id, "rev 2", user)
        .await
        .unwrap()
        .snapshot_id
        .unwrap();
    assert_eq!(ctx.db.snapshot_count(), 2);

    // Detaching the inactive version deletes it outright
    ctx.snapshot_service.detach(v1, user).await.unwrap();
    assert_eq!(ctx.db.snapshot_count(), 1);
    assert_eq!(ctx.file_cache.get(file.id).await.unwrap().snapshot_id, Some(v2));

    // Detaching the active one clears the pointer too
    let file = ctx.snapshot_service.detach(v2, user).await.unwrap();
    assert_eq!(file.snapshot_id, None);
    assert_eq!(ctx.db.snapshot_count(), 0);
}

#[tokio::test]
async fn test_store_uploads_local_path_as_original() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "notes.txt", user).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.TXT");
    std::fs::write(&path, "local content").unwrap();

    let file = ctx
        .file_store
        .store(
            file.id,
            StoreOptions {
                path: Some(path),
                s3_reference: None,
            },
            user,
        )
        .await
        .unwrap();

    let snapshot = ctx
        .snapshot_cache
        .get(file.snapshot_id.unwrap())
        .await
        .unwrap();
    let original = snapshot.original.unwrap();
    // Key is {snapshot_id}/original with the lowercased source extension
    assert_eq!(original.key, format!("{}/original.txt", snapshot.id));
    assert_eq!(original.size, Some("local content".len() as i64));
    assert_eq!(
        ctx.blob_store
            .get_text(&original.key, &original.bucket)
            .await
            .unwrap(),
        "local content"
    );
}

#[tokio::test]
async fn test_oversized_content_skips_processing() {
    let ctx = TestContext::new();
    let user = Uuid::new_v4();
    let workspace = ctx.create_workspace(user).await;
    let file = ctx.create_file(&workspace, workspace.root_id, "big.bin", user).await;

    let snapshot_id = Uuid::new_v4();
    let file = ctx
        .file_store
        .store(
            file.id,
            StoreOptions {
                path: None,
                s3_reference: Some(S3Reference {
                    snapshot_id,
                    bucket: workspace.bucket.clone(),
                    key: format!("{}/original.bin", snapshot_id),
                    // Above the test context's processing limit
                    size: 100 * 1024 * 1024,
                    content_type: "application/octet-stream".to_string(),
                }),
            },
            user,
        )
        .await
        .unwrap();

    let snapshot = ctx
        .snapshot_cache
        .get(file.snapshot_id.unwrap())
        .await
        .unwrap();
    assert_eq!(snapshot.status, SnapshotStatus::Ready);
    assert!(snapshot.task_id.is_none());
    assert_eq!(ctx.pipeline_runner.run_count(), 0);
    assert_eq!(ctx.db.task_count(), 0);
}
