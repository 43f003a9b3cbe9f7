//! Result types returned by the reconciler.

use serde::Serialize;
use std::path::PathBuf;

use crate::layout::ArtifactKey;
use crate::models::ModelType;

/// Options for a scan-and-sync pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Ignore the watermark and consider every file.
    pub full: bool,
}

impl ScanOptions {
    pub fn full() -> Self {
        Self { full: true }
    }

    pub fn incremental() -> Self {
        Self { full: false }
    }
}

/// A version whose manifests could not be used.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedCandidate {
    pub model_type: ModelType,
    pub model_id: i64,
    pub version_id: i64,
    /// Model file that led to the version.
    pub path: PathBuf,
    pub reason: String,
}

/// A candidate that failed to sync.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Summary of one scan-and-sync pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Model files that passed discovery (after the watermark filter).
    pub files_scanned: usize,
    pub new_records_added: usize,
    pub existing_records_found: usize,
    /// Always 0 for scans; repair reports its own counts.
    pub repaired_records: usize,
    pub scan_duration_ms: u64,
    pub skipped: Vec<SkippedCandidate>,
    pub failed_files: Vec<FailedFile>,
    /// Entries the walk could not read.
    pub unreadable_entries: usize,
}

/// One discrepancy found by the consistency check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DriftItem {
    File { id: i64, name: String },
    Media { id: i64 },
    /// The version could not be compared (missing or invalid manifest,
    /// unresolvable media id, ...).
    Problem { message: String },
}

/// Consistency of one indexed version against its manifests and disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub model_type: ModelType,
    pub model_id: i64,
    pub version_id: i64,
    /// Declared by the manifest and indexed, but absent on disk.
    pub missing_files: Vec<DriftItem>,
    /// Indexed, but not declared by the manifest.
    pub extra_files: Vec<DriftItem>,
    pub json_valid: bool,
    pub database_record_exists: bool,
}

impl ConsistencyReport {
    pub(crate) fn new(key: ArtifactKey) -> Self {
        Self {
            model_type: key.model_type,
            model_id: key.model_id,
            version_id: key.version_id,
            missing_files: Vec::new(),
            extra_files: Vec::new(),
            json_valid: true,
            database_record_exists: true,
        }
    }

    pub(crate) fn problem(&mut self, message: impl Into<String>) {
        self.json_valid = false;
        self.missing_files.push(DriftItem::Problem {
            message: message.into(),
        });
    }

    pub fn key(&self) -> ArtifactKey {
        ArtifactKey::new(self.model_type, self.model_id, self.version_id)
    }

    /// Whether repair should re-sync this version.
    pub fn needs_repair(&self) -> bool {
        !self.json_valid
            || !self.database_record_exists
            || !self.missing_files.is_empty()
            || !self.extra_files.is_empty()
    }
}

/// A version repair could not fix.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairFailure {
    pub model_id: i64,
    pub version_id: i64,
    pub reason: String,
}

/// Summary of a repair pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairResult {
    pub repaired: usize,
    pub failed: usize,
    /// Versions flagged by the consistency check.
    pub total: usize,
    pub failures: Vec<RepairFailure>,
}
