//! Deterministic mapping between artifact identities and paths.
//!
//! ```text
//! B/T/M/M.manifest.json         model manifest
//! B/T/M/V/V.manifest.json       version manifest
//! B/T/M/V/files/<fileName>      model files
//! B/T/M/V/media/<imageId>.<ext> media files
//! ```
//!
//! Nothing here touches the filesystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

use super::naming::{media_extension, sanitize_file_name};
use crate::config::StoreConfig;
use crate::error::{MirrorError, Result};
use crate::models::{ModelType, ModelVersion};

/// Identity of one version directory: (type, model id, version id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactKey {
    pub model_type: ModelType,
    pub model_id: i64,
    pub version_id: i64,
}

impl ArtifactKey {
    pub fn new(model_type: ModelType, model_id: i64, version_id: i64) -> Self {
        Self {
            model_type,
            model_id,
            version_id,
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.model_type, self.model_id, self.version_id)
    }
}

/// Which of the two manifests of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    Model,
    Version,
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestKind::Model => f.write_str("model"),
            ManifestKind::Version => f.write_str("version"),
        }
    }
}

/// Sub-directory of a version directory holding artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactArea {
    Files,
    Media,
}

impl ArtifactArea {
    pub fn dir_name(&self) -> &'static str {
        match self {
            ArtifactArea::Files => StoreConfig::FILES_DIR_NAME,
            ArtifactArea::Media => StoreConfig::MEDIA_DIR_NAME,
        }
    }

    fn from_dir_name(name: &str) -> Option<Self> {
        match name {
            StoreConfig::FILES_DIR_NAME => Some(ArtifactArea::Files),
            StoreConfig::MEDIA_DIR_NAME => Some(ArtifactArea::Media),
            _ => None,
        }
    }
}

/// A path decomposed back into its artifact identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPath {
    pub key: ArtifactKey,
    pub area: ArtifactArea,
    /// On-disk file name (already sanitized).
    pub name: String,
}

/// Resolves artifact identities to absolute paths under a base directory.
#[derive(Debug, Clone)]
pub struct DiskLayout {
    base_dir: PathBuf,
}

impl DiskLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `B/T/M`
    pub fn model_path(&self, model_type: ModelType, model_id: i64) -> PathBuf {
        self.base_dir
            .join(model_type.as_str())
            .join(model_id.to_string())
    }

    /// `B/T/M/V`
    pub fn version_path(&self, key: &ArtifactKey) -> PathBuf {
        self.model_path(key.model_type, key.model_id)
            .join(key.version_id.to_string())
    }

    pub fn manifest_path(&self, kind: ManifestKind, key: &ArtifactKey) -> PathBuf {
        match kind {
            ManifestKind::Model => self
                .model_path(key.model_type, key.model_id)
                .join(manifest_file_name(key.model_id)),
            ManifestKind::Version => self
                .version_path(key)
                .join(manifest_file_name(key.version_id)),
        }
    }

    pub fn files_dir(&self, key: &ArtifactKey) -> PathBuf {
        self.version_path(key).join(ArtifactArea::Files.dir_name())
    }

    pub fn media_dir(&self, key: &ArtifactKey) -> PathBuf {
        self.version_path(key).join(ArtifactArea::Media.dir_name())
    }

    /// Path of a declared file. The file name is sanitized; an id the version
    /// does not declare is an error, not a missing file.
    pub fn file_path(&self, key: &ArtifactKey, version: &ModelVersion, file_id: i64) -> Result<PathBuf> {
        let file = version.file(file_id).ok_or(MirrorError::UnknownFile {
            version_id: version.id,
            file_id,
        })?;
        Ok(self.files_dir(key).join(sanitize_file_name(&file.name)))
    }

    /// Path of a declared media entry: `media/<imageId>.<ext>`.
    pub fn media_path(&self, key: &ArtifactKey, version: &ModelVersion, image_id: i64) -> Result<PathBuf> {
        let image = version.image(image_id).ok_or(MirrorError::UnknownMedia {
            version_id: version.id,
            image_id,
        })?;
        Ok(self
            .media_dir(key)
            .join(format!("{}.{}", image_id, media_extension(&image.url))))
    }

    /// Inverse of [`file_path`](Self::file_path) and
    /// [`media_path`](Self::media_path).
    ///
    /// Returns `None` for anything that is not exactly
    /// `B/<type>/<modelId>/<versionId>/(files|media)/<name>`.
    pub fn decompose(&self, path: &Path) -> Option<ArtifactPath> {
        let relative = path.strip_prefix(&self.base_dir).ok()?;

        let mut segments = Vec::with_capacity(5);
        for component in relative.components() {
            match component {
                Component::Normal(s) => segments.push(s.to_str()?),
                _ => return None,
            }
        }

        let [model_type, model_id, version_id, area, name] = segments.as_slice() else {
            return None;
        };

        let model_type = model_type.parse::<ModelType>().ok()?;
        let model_id = parse_id(model_id)?;
        let version_id = parse_id(version_id)?;
        let area = ArtifactArea::from_dir_name(area)?;

        Some(ArtifactPath {
            key: ArtifactKey::new(model_type, model_id, version_id),
            area,
            name: name.to_string(),
        })
    }
}

fn manifest_file_name(id: i64) -> String {
    format!("{}{}", id, StoreConfig::MANIFEST_SUFFIX)
}

fn parse_id(segment: &str) -> Option<i64> {
    // Reject forms like "+5" or "007" so the mapping stays one-to-one.
    if segment.starts_with('0') || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse::<i64>().ok().filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelFile, ModelImage};

    fn layout() -> DiskLayout {
        DiskLayout::new("/mirror")
    }

    fn key() -> ArtifactKey {
        ArtifactKey::new(ModelType::Checkpoint, 100, 200)
    }

    fn version() -> ModelVersion {
        ModelVersion {
            id: 200,
            model_id: Some(100),
            name: "v1".into(),
            base_model: "SD 1.5".into(),
            base_model_type: None,
            created_at: None,
            trained_words: vec![],
            files: vec![
                ModelFile {
                    id: 1,
                    name: "model.safetensors".into(),
                    size_kb: 1.0,
                    file_type: "Model".into(),
                    download_url: String::new(),
                    hashes: None,
                    primary: Some(true),
                },
                ModelFile {
                    id: 2,
                    name: "vae|fix.pt".into(),
                    size_kb: 1.0,
                    file_type: "VAE".into(),
                    download_url: String::new(),
                    hashes: None,
                    primary: None,
                },
            ],
            images: vec![ModelImage {
                id: None,
                url: "https://image.example.invalid/x/width=512/31337.webp".into(),
                width: 512,
                height: 512,
                hash: None,
                media_type: None,
            }],
        }
    }

    #[test]
    fn test_paths() {
        let l = layout();
        let k = key();
        assert_eq!(l.model_path(k.model_type, k.model_id), PathBuf::from("/mirror/Checkpoint/100"));
        assert_eq!(l.version_path(&k), PathBuf::from("/mirror/Checkpoint/100/200"));
        assert_eq!(
            l.manifest_path(ManifestKind::Model, &k),
            PathBuf::from("/mirror/Checkpoint/100/100.manifest.json")
        );
        assert_eq!(
            l.manifest_path(ManifestKind::Version, &k),
            PathBuf::from("/mirror/Checkpoint/100/200/200.manifest.json")
        );
        assert_eq!(l.files_dir(&k), PathBuf::from("/mirror/Checkpoint/100/200/files"));
        assert_eq!(l.media_dir(&k), PathBuf::from("/mirror/Checkpoint/100/200/media"));
    }

    #[test]
    fn test_file_and_media_paths() {
        let l = layout();
        let v = version();
        assert_eq!(
            l.file_path(&key(), &v, 2).unwrap(),
            PathBuf::from("/mirror/Checkpoint/100/200/files/vae_fix.pt")
        );
        assert_eq!(
            l.media_path(&key(), &v, 31337).unwrap(),
            PathBuf::from("/mirror/Checkpoint/100/200/media/31337.webp")
        );
    }

    #[test]
    fn test_unknown_ids_are_errors() {
        let l = layout();
        let v = version();
        assert!(matches!(
            l.file_path(&key(), &v, 99),
            Err(MirrorError::UnknownFile { file_id: 99, .. })
        ));
        assert!(matches!(
            l.media_path(&key(), &v, 1),
            Err(MirrorError::UnknownMedia { image_id: 1, .. })
        ));
    }

    #[test]
    fn test_file_path_decomposes_back_to_same_entry() {
        let l = layout();
        let v = version();
        for types in [ModelType::Checkpoint, ModelType::Lora, ModelType::Vae] {
            let k = ArtifactKey::new(types, 100, 200);
            for file in &v.files {
                let path = l.file_path(&k, &v, file.id).unwrap();
                let decomposed = l.decompose(&path).unwrap();
                assert_eq!(decomposed.key, k);
                assert_eq!(decomposed.area, ArtifactArea::Files);
                assert_eq!(v.file_by_disk_name(&decomposed.name).unwrap().id, file.id);
            }
        }
    }

    #[test]
    fn test_decompose_media() {
        let l = layout();
        let path = l.media_path(&key(), &version(), 31337).unwrap();
        let decomposed = l.decompose(&path).unwrap();
        assert_eq!(decomposed.area, ArtifactArea::Media);
        assert_eq!(decomposed.name, "31337.webp");
    }

    #[test]
    fn test_decompose_rejects_foreign_paths() {
        let l = layout();
        for p in [
            "/elsewhere/Checkpoint/100/200/files/a.pt",
            "/mirror/Checkpoint/100/files/a.pt",
            "/mirror/Checkpoint/100/200/files/nested/a.pt",
            "/mirror/Checkpoint/100/200/other/a.pt",
            "/mirror/checkpoint/100/200/files/a.pt",
            "/mirror/Checkpoint/abc/200/files/a.pt",
            "/mirror/Checkpoint/100/0/files/a.pt",
            "/mirror/Checkpoint/100/0200/files/a.pt",
            "/mirror/Checkpoint/100/../200/files/a.pt",
            "/mirror/a.pt",
        ] {
            assert!(l.decompose(Path::new(p)).is_none(), "{p} should not decompose");
        }
    }
}
