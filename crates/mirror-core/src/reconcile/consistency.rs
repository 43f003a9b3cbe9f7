//! Consistency check of indexed versions against manifests and disk.

use futures::future::join_all;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info};

use super::scan::Reconciler;
use super::types::{ConsistencyReport, DriftItem};
use crate::error::Result;
use crate::index::{ArtifactIndex, IndexedVersion};
use crate::manifest::ManifestOutcome;
use crate::models::ModelVersion;

impl Reconciler {
    /// Compare every indexed version with its manifests and the files on disk.
    ///
    /// Versions are checked one after another; the existence probes within a
    /// version run concurrently. A version that cannot be compared is reported
    /// with `json_valid = false` and never stops the check.
    pub async fn perform_consistency_check(&self) -> Result<Vec<ConsistencyReport>> {
        let rows = self.index.list_versions().await?;
        info!("Checking consistency of {} indexed versions", rows.len());

        let mut reports = Vec::with_capacity(rows.len());
        for row in &rows {
            let report = self.check_version(row).await;
            if report.needs_repair() {
                debug!(
                    "Drift in {}: {} missing, {} extra, json valid: {}",
                    row.key,
                    report.missing_files.len(),
                    report.extra_files.len(),
                    report.json_valid
                );
            }
            reports.push(report);
        }
        Ok(reports)
    }

    async fn check_version(&self, row: &IndexedVersion) -> ConsistencyReport {
        let mut report = ConsistencyReport::new(row.key);

        let version = match self.reader.read(&row.key).await {
            ManifestOutcome::Valid { version, .. } => version,
            outcome => {
                report.problem(
                    outcome
                        .reason()
                        .unwrap_or_else(|| "unusable manifests".to_string()),
                );
                return report;
            }
        };

        let probes = match self.declared_artifacts(row, &version) {
            Ok(probes) => probes,
            Err(e) => {
                report.problem(e.to_string());
                return report;
            }
        };

        let on_disk = join_all(
            probes
                .iter()
                .map(|(_, path)| async move { tokio::fs::try_exists(path).await.unwrap_or(false) }),
        )
        .await;

        let indexed_files: HashSet<i64> = row.file_ids().collect();
        let indexed_images: HashSet<i64> = row.image_ids.iter().copied().collect();
        for ((item, _), exists) in probes.into_iter().zip(on_disk) {
            let indexed = match &item {
                DriftItem::File { id, .. } => indexed_files.contains(id),
                DriftItem::Media { id } => indexed_images.contains(id),
                DriftItem::Problem { .. } => false,
            };
            if !exists && indexed {
                report.missing_files.push(item);
            }
        }

        let declared_files: HashSet<i64> = version.files.iter().map(|f| f.id).collect();
        for file in &row.files {
            if !declared_files.contains(&file.id) {
                report.extra_files.push(DriftItem::File {
                    id: file.id,
                    name: file.name.clone(),
                });
            }
        }
        let declared_images: HashSet<i64> = version
            .images
            .iter()
            .filter_map(|image| image.resolve_id().ok())
            .collect();
        for id in &row.image_ids {
            if !declared_images.contains(id) {
                report.extra_files.push(DriftItem::Media { id: *id });
            }
        }

        report
    }

    /// Every file and media entry the manifest declares, with its path.
    fn declared_artifacts(
        &self,
        row: &IndexedVersion,
        version: &ModelVersion,
    ) -> Result<Vec<(DriftItem, PathBuf)>> {
        let mut probes = Vec::with_capacity(version.files.len() + version.images.len());
        for file in &version.files {
            let path = self.layout.file_path(&row.key, version, file.id)?;
            probes.push((
                DriftItem::File {
                    id: file.id,
                    name: file.name.clone(),
                },
                path,
            ));
        }
        for image in &version.images {
            let id = image.resolve_id()?;
            let path = self.layout.media_path(&row.key, version, id)?;
            probes.push((DriftItem::Media { id }, path));
        }
        Ok(probes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_extensions;
    use crate::index::{DynArtifactIndex, SqliteIndex, UpsertMode, VersionRecord};
    use crate::layout::{ArtifactKey, DiskLayout, ManifestKind};
    use crate::models::{Model, ModelType};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn model() -> Model {
        serde_json::from_value(serde_json::json!({
            "id": 100, "name": "Dreamy", "type": "Checkpoint"
        }))
        .unwrap()
    }

    fn version() -> ModelVersion {
        serde_json::from_value(serde_json::json!({
            "id": 200, "modelId": 100, "name": "v1", "baseModel": "SD 1.5",
            "files": [{"id": 1, "name": "model.safetensors"}],
            "images": [{"url": "https://img.example.invalid/a/55.png"}]
        }))
        .unwrap()
    }

    fn key() -> ArtifactKey {
        ArtifactKey::new(ModelType::Checkpoint, 100, 200)
    }

    async fn setup(tmp: &TempDir) -> Reconciler {
        let index: DynArtifactIndex = Arc::new(SqliteIndex::in_memory().unwrap());
        let reconciler = Reconciler::new(DiskLayout::new(tmp.path()), default_extensions(), index);
        reconciler.reader.write_manifests(&model(), &version()).unwrap();

        let v = version();
        let file = reconciler.layout.file_path(&key(), &v, 1).unwrap();
        let media = reconciler.layout.media_path(&key(), &v, 55).unwrap();
        for path in [&file, &media] {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, b"x").unwrap();
        }

        let record = VersionRecord::from_manifests(&model(), &v).unwrap();
        reconciler
            .index
            .upsert_model_version(&record, UpsertMode::InsertOnly)
            .await
            .unwrap();
        reconciler
    }

    #[tokio::test]
    async fn test_clean_version_reports_nothing() {
        let tmp = TempDir::new().unwrap();
        let reconciler = setup(&tmp).await;

        let reports = reconciler.perform_consistency_check().await.unwrap();
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].needs_repair(), "{:?}", reports[0]);
        assert!(reports[0].database_record_exists);
    }

    #[tokio::test]
    async fn test_missing_media_is_reported() {
        let tmp = TempDir::new().unwrap();
        let reconciler = setup(&tmp).await;
        std::fs::remove_file(reconciler.layout.media_path(&key(), &version(), 55).unwrap())
            .unwrap();

        let reports = reconciler.perform_consistency_check().await.unwrap();
        assert!(reports[0].json_valid);
        assert_eq!(reports[0].missing_files, vec![DriftItem::Media { id: 55 }]);
    }

    #[tokio::test]
    async fn test_missing_manifest_marks_json_invalid() {
        let tmp = TempDir::new().unwrap();
        let reconciler = setup(&tmp).await;
        std::fs::remove_file(reconciler.layout.manifest_path(ManifestKind::Version, &key()))
            .unwrap();

        let reports = reconciler.perform_consistency_check().await.unwrap();
        assert!(!reports[0].json_valid);
        assert_eq!(
            reports[0].missing_files,
            vec![DriftItem::Problem {
                message: "missing version manifest".into()
            }]
        );
    }
}
