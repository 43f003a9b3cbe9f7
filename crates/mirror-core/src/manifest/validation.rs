//! Manifest validation.
//!
//! A manifest is valid when it is well-formed JSON, deserializes into the
//! catalog shape, and its fields agree with the path it was loaded from.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::layout::{sanitize_file_name, ArtifactKey};
use crate::models::{Model, ModelVersion};

/// One problem found in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted path of the offending field; `$` for the document itself.
    pub field: String,
    pub message: String,
}

/// Every problem found in one manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationSummary {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            field: field.into(),
            message: message.into(),
        });
    }

    fn single(field: &str, message: impl Into<String>) -> Self {
        let mut summary = Self::default();
        summary.push(field, message);
        summary
    }
}

impl fmt::Display for ValidationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .issues
            .iter()
            .map(|i| format!("{}: {}", i.field, i.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Parse JSON text into `T`, reporting syntax and shape errors as a summary.
fn parse<T: DeserializeOwned>(raw: &str) -> Result<T, ValidationSummary> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| ValidationSummary::single("$", format!("malformed JSON: {e}")))?;
    if !value.is_object() {
        return Err(ValidationSummary::single("$", "expected a JSON object"));
    }
    serde_json::from_value(value).map_err(|e| ValidationSummary::single("$", e.to_string()))
}

/// Validate a model-level manifest loaded for `key`.
pub fn validate_model_manifest(raw: &str, key: &ArtifactKey) -> Result<Model, ValidationSummary> {
    let model: Model = parse(raw)?;

    let mut summary = ValidationSummary::default();
    if model.id <= 0 {
        summary.push("id", "must be a positive integer");
    } else if model.id != key.model_id {
        summary.push(
            "id",
            format!("is {} but the directory is for model {}", model.id, key.model_id),
        );
    }
    if model.model_type != key.model_type {
        summary.push(
            "type",
            format!(
                "is {} but the directory is under {}",
                model.model_type, key.model_type
            ),
        );
    }
    if model.name.trim().is_empty() {
        summary.push("name", "must not be empty");
    }

    if summary.is_empty() {
        Ok(model)
    } else {
        Err(summary)
    }
}

/// Validate a version-level manifest loaded for `key`.
pub fn validate_version_manifest(
    raw: &str,
    key: &ArtifactKey,
) -> Result<ModelVersion, ValidationSummary> {
    let version: ModelVersion = parse(raw)?;

    let mut summary = ValidationSummary::default();
    if version.id <= 0 {
        summary.push("id", "must be a positive integer");
    } else if version.id != key.version_id {
        summary.push(
            "id",
            format!(
                "is {} but the directory is for version {}",
                version.id, key.version_id
            ),
        );
    }
    if let Some(model_id) = version.model_id {
        if model_id != key.model_id {
            summary.push(
                "modelId",
                format!("is {} but the directory is for model {}", model_id, key.model_id),
            );
        }
    }
    if version.name.trim().is_empty() {
        summary.push("name", "must not be empty");
    }

    let mut seen = HashSet::new();
    let mut disk_names = HashSet::new();
    for (i, file) in version.files.iter().enumerate() {
        if file.id <= 0 {
            summary.push(format!("files.{i}.id"), "must be a positive integer");
        } else if !seen.insert(file.id) {
            summary.push(format!("files.{i}.id"), format!("duplicate file id {}", file.id));
        }
        if file.name.trim().is_empty() {
            summary.push(format!("files.{i}.name"), "must not be empty");
        } else if !disk_names.insert(sanitize_file_name(&file.name)) {
            summary.push(
                format!("files.{i}.name"),
                "collides on disk with another file",
            );
        }
        if file.size_kb < 0.0 {
            summary.push(format!("files.{i}.sizeKB"), "must not be negative");
        }
    }
    for (i, image) in version.images.iter().enumerate() {
        if image.url.trim().is_empty() {
            summary.push(format!("images.{i}.url"), "must not be empty");
        }
    }

    if summary.is_empty() {
        Ok(version)
    } else {
        Err(summary)
    }
}
