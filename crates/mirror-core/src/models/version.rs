//! Model version, file and media types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::layout::{image_id_from_url, sanitize_file_name};

/// A downloadable file attached to a version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelFile {
    pub id: i64,
    pub name: String,
    #[serde(rename = "sizeKB", default)]
    pub size_kb: f64,
    #[serde(rename = "type", default = "default_file_type")]
    pub file_type: String,
    #[serde(default)]
    pub download_url: String,
    /// Hash algorithm name (e.g. `SHA256`, `AutoV2`) to hex digest.
    #[serde(default)]
    pub hashes: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub primary: Option<bool>,
}

fn default_file_type() -> String {
    "Model".to_string()
}

/// A preview image or video attached to a version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelImage {
    /// Explicit id; when absent the id is derived from `url`.
    #[serde(default)]
    pub id: Option<i64>,
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    /// Perceptual hash (blurhash) reported by the catalog.
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(rename = "type", default)]
    pub media_type: Option<String>,
}

impl ModelImage {
    /// The image's identity: the explicit id, or the one encoded in its URL.
    pub fn resolve_id(&self) -> Result<i64> {
        match self.id {
            Some(id) => Ok(id),
            None => image_id_from_url(&self.url),
        }
    }
}

/// A version of a catalog model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelVersion {
    pub id: i64,
    /// Owning model. Catalog responses nested under a model may omit it.
    #[serde(default)]
    pub model_id: Option<i64>,
    pub name: String,
    pub base_model: String,
    #[serde(default)]
    pub base_model_type: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub trained_words: Vec<String>,
    #[serde(default)]
    pub files: Vec<ModelFile>,
    #[serde(default)]
    pub images: Vec<ModelImage>,
}

impl ModelVersion {
    pub fn file(&self, file_id: i64) -> Option<&ModelFile> {
        self.files.iter().find(|f| f.id == file_id)
    }

    /// Find an image by resolved id. Images whose id cannot be resolved never
    /// match.
    pub fn image(&self, image_id: i64) -> Option<&ModelImage> {
        self.images
            .iter()
            .find(|i| i.resolve_id().ok() == Some(image_id))
    }

    /// Map an on-disk file name (as produced by the layout) back to the
    /// declared file entry.
    pub fn file_by_disk_name(&self, disk_name: &str) -> Option<&ModelFile> {
        self.files
            .iter()
            .find(|f| sanitize_file_name(&f.name) == disk_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version() -> ModelVersion {
        ModelVersion {
            id: 200,
            model_id: Some(100),
            name: "v1".into(),
            base_model: "SDXL 1.0".into(),
            base_model_type: Some("Standard".into()),
            created_at: None,
            trained_words: vec![],
            files: vec![ModelFile {
                id: 1,
                name: "dreamy:v1.safetensors".into(),
                size_kb: 2048.0,
                file_type: "Model".into(),
                download_url: "https://example.invalid/api/download/models/200".into(),
                hashes: None,
                primary: Some(true),
            }],
            images: vec![
                ModelImage {
                    id: None,
                    url: "https://image.example.invalid/abc/width=450/4242.jpeg".into(),
                    width: 450,
                    height: 600,
                    hash: Some("U5Fiib".into()),
                    media_type: Some("image".into()),
                },
                ModelImage {
                    id: Some(9),
                    url: "https://image.example.invalid/abc/cover.png".into(),
                    width: 1,
                    height: 1,
                    hash: None,
                    media_type: None,
                },
            ],
        }
    }

    #[test]
    fn test_image_lookup_uses_resolved_ids() {
        let v = version();
        assert_eq!(v.image(4242).unwrap().width, 450);
        assert_eq!(v.image(9).unwrap().height, 1);
        assert!(v.image(1).is_none());
    }

    #[test]
    fn test_file_by_disk_name_matches_sanitized_name() {
        let v = version();
        assert!(v.file_by_disk_name("dreamy:v1.safetensors").is_none());
        assert_eq!(v.file_by_disk_name("dreamy_v1.safetensors").unwrap().id, 1);
    }

    #[test]
    fn test_file_defaults() {
        let file: ModelFile =
            serde_json::from_value(serde_json::json!({"id": 3, "name": "a.pt"})).unwrap();
        assert_eq!(file.file_type, "Model");
        assert_eq!(file.size_kb, 0.0);
        assert!(file.hashes.is_none());
    }
}
