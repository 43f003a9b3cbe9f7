//! The narrow CRUD contract the engine uses to reach its relational index.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::record::VersionRecord;
use crate::error::Result;
use crate::layout::ArtifactKey;

/// How an upsert treats a version row that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertMode {
    /// Leave an existing row untouched (passive scans).
    InsertOnly,
    /// Replace the row and its file/image sub-records (repair).
    Overwrite,
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    AlreadyPresent,
}

/// What a version delete did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    /// A version row was removed.
    pub deleted: bool,
    /// The parent model row was removed because no versions remained.
    pub model_deleted: bool,
}

/// A file sub-record as stored in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedFile {
    pub id: i64,
    pub name: String,
}

/// A version row with the identities of its sub-records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedVersion {
    pub key: ArtifactKey,
    pub model_name: String,
    pub version_name: String,
    pub base_model: String,
    pub files: Vec<IndexedFile>,
    pub image_ids: Vec<i64>,
    pub indexed_at: DateTime<Utc>,
}

impl IndexedVersion {
    pub fn file_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.files.iter().map(|f| f.id)
    }
}

/// Database port. Implementations must be safe to share across tasks.
#[async_trait]
pub trait ArtifactIndex: Send + Sync {
    async fn version_exists(&self, version_id: i64) -> Result<bool>;

    /// Write a version, creating or finding its base model, base model type,
    /// creator and parent model rows first.
    async fn upsert_model_version(
        &self,
        record: &VersionRecord,
        mode: UpsertMode,
    ) -> Result<UpsertOutcome>;

    /// Remove a version row and its sub-records. The parent model row goes
    /// too once it has no versions left.
    async fn delete_model_version(&self, version_id: i64) -> Result<DeleteOutcome>;

    async fn get_version(&self, version_id: i64) -> Result<Option<IndexedVersion>>;

    /// Every version row, ordered by version id.
    async fn list_versions(&self) -> Result<Vec<IndexedVersion>>;

    async fn count_versions(&self) -> Result<usize>;
}

/// Shared handle to an index implementation.
pub type DynArtifactIndex = Arc<dyn ArtifactIndex>;
