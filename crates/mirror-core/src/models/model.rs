//! Artifact model types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ModelVersion;

/// Catalog type tag of a model. The serialized form doubles as the first
/// directory segment of the on-disk layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    Checkpoint,
    TextualInversion,
    Hypernetwork,
    AestheticGradient,
    #[serde(rename = "LORA")]
    Lora,
    LoCon,
    DoRA,
    Controlnet,
    Upscaler,
    MotionModule,
    #[serde(rename = "VAE")]
    Vae,
    Poses,
    Wildcards,
    Workflows,
    Detection,
    Other,
}

impl ModelType {
    pub const ALL: &'static [ModelType] = &[
        ModelType::Checkpoint,
        ModelType::TextualInversion,
        ModelType::Hypernetwork,
        ModelType::AestheticGradient,
        ModelType::Lora,
        ModelType::LoCon,
        ModelType::DoRA,
        ModelType::Controlnet,
        ModelType::Upscaler,
        ModelType::MotionModule,
        ModelType::Vae,
        ModelType::Poses,
        ModelType::Wildcards,
        ModelType::Workflows,
        ModelType::Detection,
        ModelType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Checkpoint => "Checkpoint",
            ModelType::TextualInversion => "TextualInversion",
            ModelType::Hypernetwork => "Hypernetwork",
            ModelType::AestheticGradient => "AestheticGradient",
            ModelType::Lora => "LORA",
            ModelType::LoCon => "LoCon",
            ModelType::DoRA => "DoRA",
            ModelType::Controlnet => "Controlnet",
            ModelType::Upscaler => "Upscaler",
            ModelType::MotionModule => "MotionModule",
            ModelType::Vae => "VAE",
            ModelType::Poses => "Poses",
            ModelType::Wildcards => "Wildcards",
            ModelType::Workflows => "Workflows",
            ModelType::Detection => "Detection",
            ModelType::Other => "Other",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = String;

    /// Parses the exact catalog tag. Directory segments are matched
    /// case-sensitively so that the layout stays a bijection.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown model type: {s}"))
    }
}

/// Creator of a model as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    pub username: String,
    #[serde(default)]
    pub image: Option<String>,
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: ModelType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub creator: Option<Creator>,
    #[serde(default)]
    pub model_versions: Vec<ModelVersion>,
}

impl Model {
    /// Find an attached version by id.
    pub fn version(&self, version_id: i64) -> Option<&ModelVersion> {
        self.model_versions.iter().find(|v| v.id == version_id)
    }

    /// A copy of this model without its attached versions, the shape stored in
    /// the model-level manifest and the database blob.
    pub fn without_versions(&self) -> Model {
        Model {
            model_versions: Vec::new(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_round_trips_through_tag() {
        for t in ModelType::ALL {
            assert_eq!(t.as_str().parse::<ModelType>().unwrap(), *t);
            let json = serde_json::to_string(t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
    }

    #[test]
    fn test_model_type_is_case_sensitive() {
        assert!("lora".parse::<ModelType>().is_err());
        assert!("checkpoint".parse::<ModelType>().is_err());
        assert_eq!("LORA".parse::<ModelType>().unwrap(), ModelType::Lora);
    }

    #[test]
    fn test_model_deserializes_catalog_shape() {
        let json = serde_json::json!({
            "id": 100,
            "name": "Dreamy",
            "type": "Checkpoint",
            "tags": ["anime"],
            "creator": {"username": "someone"},
            "modelVersions": [{
                "id": 200,
                "modelId": 100,
                "name": "v1",
                "baseModel": "SD 1.5",
                "files": [],
                "images": []
            }]
        });
        let model: Model = serde_json::from_value(json).unwrap();
        assert_eq!(model.model_type, ModelType::Checkpoint);
        assert_eq!(model.version(200).unwrap().base_model, "SD 1.5");
        assert!(model.without_versions().model_versions.is_empty());
    }
}
