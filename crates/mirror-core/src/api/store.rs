//! Reconciliation and manifest methods on MirrorApi.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use crate::error::Result;
use crate::index::ArtifactIndex;
use crate::layout::ArtifactKey;
use crate::manifest::ManifestOutcome;
use crate::models::{Model, ModelVersion};
use crate::reconcile::{ConsistencyReport, RepairResult, ScanOptions, ScanResult};
use crate::MirrorApi;

/// Overview of the mirror's state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorStats {
    pub base_dir: PathBuf,
    pub indexed_versions: usize,
    pub pending_confirmations: usize,
    pub last_scan: Option<DateTime<Utc>>,
}

impl MirrorApi {
    // ========================================
    // Reconciliation Methods
    // ========================================

    /// Discover model files and index versions that are not indexed yet.
    pub async fn perform_incremental_scan(&self, options: ScanOptions) -> ScanResult {
        self.reconciler.perform_incremental_scan(options).await
    }

    /// Report drift between the index, the manifests and the disk.
    pub async fn perform_consistency_check(&self) -> Result<Vec<ConsistencyReport>> {
        self.reconciler.perform_consistency_check().await
    }

    /// Re-sync every drifted index row from its manifests.
    pub async fn repair_database_records(&self) -> Result<RepairResult> {
        self.reconciler.repair_database_records().await
    }

    /// Completion time of the last scan, if any.
    pub fn last_scan(&self) -> Option<DateTime<Utc>> {
        self.reconciler.watermark().read()
    }

    // ========================================
    // Manifest Methods
    // ========================================

    /// Persist both manifests of a version at their layout paths.
    pub fn write_manifests(&self, model: &Model, version: &ModelVersion) -> Result<ArtifactKey> {
        self.reader.write_manifests(model, version)
    }

    /// Load and validate both manifests of a version.
    pub async fn read_manifests(&self, key: &ArtifactKey) -> ManifestOutcome {
        self.reader.read(key).await
    }

    // ========================================
    // Status
    // ========================================

    pub async fn get_stats(&self) -> Result<MirrorStats> {
        Ok(MirrorStats {
            base_dir: self.base_dir().to_path_buf(),
            indexed_versions: self.index.count_versions().await?,
            pending_confirmations: self.deletion.get_confirmation_stats().pending,
            last_scan: self.last_scan(),
        })
    }
}
