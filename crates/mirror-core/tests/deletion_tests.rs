//! Integration tests for the two-phase deletion workflow.

use mirror_core::{ConfirmationFailure, MirrorApi, MirrorError, Model, ModelVersion, ScanOptions};
use std::time::Duration;
use tempfile::TempDir;

fn version(id: i64) -> ModelVersion {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "modelId": 100,
        "name": format!("v{}", id),
        "baseModel": "SD 1.5",
        "files": [{"id": id * 10, "name": "model.safetensors"}]
    }))
    .unwrap()
}

/// Model 100 with the given versions attached, as the catalog returns it.
fn model(version_ids: &[i64]) -> Model {
    let mut model: Model = serde_json::from_value(serde_json::json!({
        "id": 100,
        "name": "Dreamy",
        "type": "Checkpoint"
    }))
    .unwrap();
    model.model_versions = version_ids.iter().map(|id| version(*id)).collect();
    model
}

/// Base dir with manifests and one model file per version, already indexed.
async fn create_test_env(version_ids: &[i64], ttl: Option<Duration>) -> (TempDir, MirrorApi) {
    let temp_dir = TempDir::new().unwrap();
    let mut builder = MirrorApi::builder(temp_dir.path()).in_memory_database();
    if let Some(ttl) = ttl {
        builder = builder.confirmation_ttl(ttl);
    }
    let api = builder.build().await.expect("Failed to build API");

    let model = model(version_ids).without_versions();
    for id in version_ids {
        let version = version(*id);
        let key = api.write_manifests(&model, &version).unwrap();
        let file = api
            .layout()
            .file_path(&key, &version, version.files[0].id)
            .unwrap();
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, b"weights").unwrap();
    }
    api.perform_incremental_scan(ScanOptions::full()).await;

    (temp_dir, api)
}

#[tokio::test]
async fn test_request_then_confirm_removes_everything() {
    let (temp_dir, api) = create_test_env(&[200], None).await;

    let confirmation = api.create_deletion_confirmation(&model(&[200]), 200).await.unwrap();
    assert!(!confirmation.batch);
    let details = &confirmation.items[0];
    assert!(details.exists);
    assert_eq!(details.file_count, 1);
    assert_eq!(api.get_confirmation_stats().pending, 1);

    let result = api.confirm_and_delete(&confirmation.token).await.unwrap();
    assert!(result.database_deleted);
    assert!(result.files_deleted);
    assert!(result.model_deleted);
    assert_eq!(result.deleted_files, 1);
    assert!(result.error.is_none());

    assert!(!temp_dir.path().join("Checkpoint/100/200").exists());
    assert!(!temp_dir.path().join("Checkpoint/100").exists());
    assert!(!api.index().version_exists(200).await.unwrap());
    assert_eq!(api.get_confirmation_stats().pending, 0);
}

#[tokio::test]
async fn test_token_is_single_use() {
    let (_temp_dir, api) = create_test_env(&[200], None).await;

    let confirmation = api.create_deletion_confirmation(&model(&[200]), 200).await.unwrap();
    api.confirm_and_delete(&confirmation.token).await.unwrap();

    let again = api.confirm_and_delete(&confirmation.token).await;
    assert!(matches!(
        again,
        Err(MirrorError::DeleteConfirmation {
            reason: ConfirmationFailure::Missing
        })
    ));
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let (temp_dir, api) = create_test_env(&[200], Some(Duration::ZERO)).await;

    let confirmation = api.create_deletion_confirmation(&model(&[200]), 200).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let result = api.confirm_and_delete(&confirmation.token).await;
    assert!(matches!(
        result,
        Err(MirrorError::DeleteConfirmation {
            reason: ConfirmationFailure::Expired
        })
    ));
    assert_eq!(api.get_confirmation_stats().pending, 0);

    // Nothing was touched.
    assert!(temp_dir.path().join("Checkpoint/100/200").exists());
    assert!(api.index().version_exists(200).await.unwrap());
}

#[tokio::test]
async fn test_cancelled_token_cannot_be_confirmed() {
    let (_temp_dir, api) = create_test_env(&[200], None).await;

    let confirmation = api.create_deletion_confirmation(&model(&[200]), 200).await.unwrap();
    assert!(api.cancel_deletion(&confirmation.token));
    assert!(!api.cancel_deletion(&confirmation.token));

    let result = api.confirm_and_delete(&confirmation.token).await;
    assert!(result.is_err());
    assert!(api.index().version_exists(200).await.unwrap());
}

#[tokio::test]
async fn test_batch_keeps_model_until_last_version() {
    let (temp_dir, api) = create_test_env(&[200, 201, 202], None).await;

    let batch_model = model(&[200, 201]);
    let confirmation = api
        .create_batch_deletion_confirmation(&[(batch_model.clone(), 200), (batch_model, 201)])
        .await
        .unwrap();
    assert!(confirmation.batch);
    assert_eq!(confirmation.items.len(), 2);

    let summary = api.confirm_and_delete_batch(&confirmation.token).await.unwrap();
    assert_eq!((summary.total, summary.succeeded, summary.failed), (2, 2, 0));
    assert!(summary.results.iter().all(|r| !r.model_deleted));

    assert!(temp_dir.path().join("Checkpoint/100/202").exists());
    assert_eq!(api.index().count_versions().await.unwrap(), 1);

    let last = api.delete_model_version(&model(&[202]), 202).await.unwrap();
    assert!(last.model_deleted);
    assert!(!temp_dir.path().join("Checkpoint/100").exists());
}

#[tokio::test]
async fn test_by_id_request_falls_back_to_local_manifests() {
    let (_temp_dir, api) = create_test_env(&[200], None).await;

    let confirmation = api.create_deletion_confirmation_by_id(100, 200).await.unwrap();
    assert_eq!(confirmation.items[0].model_name, "Dreamy");
    assert_eq!(confirmation.items[0].version_name, "v200");

    let unknown = api.create_deletion_confirmation_by_id(100, 999).await;
    assert!(matches!(unknown, Err(MirrorError::VersionNotFound { .. })));
}

#[tokio::test]
async fn test_builder_rejects_missing_base_dir() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("not-there");

    let result = MirrorApi::builder(&missing).in_memory_database().build().await;
    assert!(result.is_err());

    let created = MirrorApi::builder(&missing)
        .in_memory_database()
        .auto_create_dirs(true)
        .build()
        .await;
    assert!(created.is_ok());
    assert!(missing.is_dir());
}
