//! Loading and writing the manifest pair of a version.

use std::path::Path;
use tracing::debug;

use super::validation::{validate_model_manifest, validate_version_manifest, ValidationSummary};
use crate::error::{MirrorError, Result, ScanOperation};
use crate::layout::{ArtifactKey, DiskLayout, ManifestKind};
use crate::metadata::atomic_write_json;
use crate::models::{Model, ModelVersion};

/// Result of loading both manifests of a version.
#[derive(Debug, Clone)]
pub enum ManifestOutcome {
    Valid {
        model: Model,
        version: ModelVersion,
    },
    /// One or both manifests do not exist (never empty).
    Missing(Vec<ManifestKind>),
    Invalid(ManifestKind, ValidationSummary),
}

impl ManifestOutcome {
    /// Human-readable reason for a non-valid outcome.
    pub fn reason(&self) -> Option<String> {
        match self {
            ManifestOutcome::Valid { .. } => None,
            ManifestOutcome::Missing(kinds) => {
                let kinds: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
                Some(format!("missing {} manifest", kinds.join(" and ")))
            }
            ManifestOutcome::Invalid(kind, summary) => {
                Some(format!("invalid {} manifest: {}", kind, summary))
            }
        }
    }
}

/// Reads and validates manifests at the paths the layout assigns.
#[derive(Debug, Clone)]
pub struct ManifestReader {
    layout: DiskLayout,
}

impl ManifestReader {
    pub fn new(layout: DiskLayout) -> Self {
        Self { layout }
    }

    /// Load both manifests for `key`. Existence of each is checked
    /// independently; validation problems are returned, never raised.
    pub async fn read(&self, key: &ArtifactKey) -> ManifestOutcome {
        let model_path = self.layout.manifest_path(ManifestKind::Model, key);
        let version_path = self.layout.manifest_path(ManifestKind::Version, key);

        let model_raw = read_optional(&model_path).await;
        let version_raw = read_optional(&version_path).await;

        let (model_raw, version_raw) = match (model_raw, version_raw) {
            (Ok(Some(m)), Ok(Some(v))) => (m, v),
            (Err(summary), _) => return ManifestOutcome::Invalid(ManifestKind::Model, summary),
            (_, Err(summary)) => return ManifestOutcome::Invalid(ManifestKind::Version, summary),
            (m, v) => {
                let mut missing = Vec::new();
                if matches!(m, Ok(None)) {
                    missing.push(ManifestKind::Model);
                }
                if matches!(v, Ok(None)) {
                    missing.push(ManifestKind::Version);
                }
                return ManifestOutcome::Missing(missing);
            }
        };

        let model = match validate_model_manifest(&model_raw, key) {
            Ok(model) => model,
            Err(summary) => return ManifestOutcome::Invalid(ManifestKind::Model, summary),
        };
        let version = match validate_version_manifest(&version_raw, key) {
            Ok(version) => version,
            Err(summary) => return ManifestOutcome::Invalid(ManifestKind::Version, summary),
        };

        ManifestOutcome::Valid { model, version }
    }

    /// Like [`read`](Self::read), but turns non-valid outcomes into errors.
    pub async fn load(&self, key: &ArtifactKey) -> Result<(Model, ModelVersion)> {
        match self.read(key).await {
            ManifestOutcome::Valid { model, version } => Ok((model, version)),
            ManifestOutcome::Missing(kinds) => Err(MirrorError::Scan {
                operation: ScanOperation::FileNotFound,
                message: format!(
                    "missing {} manifest for {}",
                    kinds
                        .iter()
                        .map(|k| k.to_string())
                        .collect::<Vec<_>>()
                        .join(" and "),
                    key
                ),
            }),
            ManifestOutcome::Invalid(kind, summary) => Err(MirrorError::JsonParse {
                path: self.layout.manifest_path(kind, key),
                summary,
            }),
        }
    }

    /// Persist both manifests for a version at their layout paths.
    ///
    /// This is the hand-off point for whatever places downloads on disk.
    pub fn write_manifests(&self, model: &Model, version: &ModelVersion) -> Result<ArtifactKey> {
        let key = ArtifactKey::new(model.model_type, model.id, version.id);
        atomic_write_json(&self.layout.manifest_path(ManifestKind::Model, &key), model)?;
        atomic_write_json(&self.layout.manifest_path(ManifestKind::Version, &key), version)?;
        debug!("Wrote manifests for {}", key);
        Ok(key)
    }
}

/// Read a manifest file; `Ok(None)` when absent. Read failures other than
/// absence count as invalid manifests.
async fn read_optional(path: &Path) -> std::result::Result<Option<String>, ValidationSummary> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => {
            let mut summary = ValidationSummary::default();
            summary.issues.push(super::ValidationIssue {
                field: "$".to_string(),
                message: format!("unreadable: {e}"),
            });
            Err(summary)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelType;
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
            "files": [{"id": 1, "name": "model.safetensors"}]
        }))
        .unwrap()
    }

    fn key() -> ArtifactKey {
        ArtifactKey::new(ModelType::Checkpoint, 100, 200)
    }

    #[tokio::test]
    async fn test_write_then_read_is_valid() {
        let tmp = TempDir::new().unwrap();
        let reader = ManifestReader::new(DiskLayout::new(tmp.path()));

        let written = reader.write_manifests(&model(), &version()).unwrap();
        assert_eq!(written, key());
        assert!(tmp.path().join("Checkpoint/100/100.manifest.json").exists());
        assert!(tmp.path().join("Checkpoint/100/200/200.manifest.json").exists());

        match reader.read(&key()).await {
            ManifestOutcome::Valid { model, version } => {
                assert_eq!(model.id, 100);
                assert_eq!(version.files.len(), 1);
            }
            other => panic!("expected valid, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_manifests_are_checked_independently() {
        let tmp = TempDir::new().unwrap();
        let layout = DiskLayout::new(tmp.path());
        let reader = ManifestReader::new(layout.clone());

        match reader.read(&key()).await {
            ManifestOutcome::Missing(kinds) => {
                assert_eq!(kinds, vec![ManifestKind::Model, ManifestKind::Version])
            }
            other => panic!("expected missing, got {other:?}"),
        }

        reader.write_manifests(&model(), &version()).unwrap();
        std::fs::remove_file(layout.manifest_path(ManifestKind::Model, &key())).unwrap();

        let outcome = reader.read(&key()).await;
        assert_eq!(outcome.reason().unwrap(), "missing model manifest");
        assert!(matches!(
            reader.load(&key()).await,
            Err(MirrorError::Scan {
                operation: ScanOperation::FileNotFound,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_invalid_version_manifest() {
        let tmp = TempDir::new().unwrap();
        let layout = DiskLayout::new(tmp.path());
        let reader = ManifestReader::new(layout.clone());
        reader.write_manifests(&model(), &version()).unwrap();
        std::fs::write(layout.manifest_path(ManifestKind::Version, &key()), "{\"id\": 200}")
            .unwrap();

        match reader.read(&key()).await {
            ManifestOutcome::Invalid(ManifestKind::Version, summary) => {
                assert!(!summary.is_empty())
            }
            other => panic!("expected invalid version, got {other:?}"),
        }
        assert!(matches!(
            reader.load(&key()).await,
            Err(MirrorError::JsonParse { .. })
        ));
    }
}
