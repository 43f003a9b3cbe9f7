//! Snapshots and results of the deletion workflow.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use crate::layout::ArtifactKey;
use crate::models::ModelType;

/// What a deletion will remove, captured when the deletion is requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionDetails {
    pub version_id: i64,
    pub model_id: i64,
    pub model_type: ModelType,
    pub model_name: String,
    pub version_name: String,
    /// Version directory at request time. Shown to the user only; the
    /// directory removed on confirm is derived again from the layout.
    pub path: PathBuf,
    /// Files declared by the version.
    pub file_count: usize,
    /// Media entries declared by the version.
    pub image_count: usize,
    /// Whether the version directory existed at request time.
    pub exists: bool,
}

impl DeletionDetails {
    pub fn key(&self) -> ArtifactKey {
        ArtifactKey::new(self.model_type, self.model_id, self.version_id)
    }
}

/// A pending deletion handed back to the caller for review.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionConfirmation {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Whether the token must be confirmed through the batch call.
    pub batch: bool,
    pub items: Vec<DeletionDetails>,
}

/// Outcome of deleting one version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionResult {
    pub version_id: i64,
    pub model_id: i64,
    pub database_deleted: bool,
    pub files_deleted: bool,
    /// The version was the last one of its model, so the model went too.
    pub model_deleted: bool,
    /// Entries found under `files/` right before removal.
    pub deleted_files: usize,
    /// Entries found under `media/` right before removal.
    pub deleted_images: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeletionResult {
    pub(crate) fn new(model_id: i64, version_id: i64) -> Self {
        Self {
            version_id,
            model_id,
            ..Default::default()
        }
    }

    pub(crate) fn failed(model_id: i64, version_id: i64, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(model_id, version_id)
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate of a batch deletion where every item succeeded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeletionSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<DeletionResult>,
}

/// A pending token as reported by the stats call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub batch: bool,
    pub items: Vec<DeletionDetails>,
}

/// Snapshot of the pending confirmations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationStats {
    pub pending: usize,
    pub tokens: Vec<PendingToken>,
}
