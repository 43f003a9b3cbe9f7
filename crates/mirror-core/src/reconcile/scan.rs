//! Scan-and-sync: discover model files and index the versions they belong to.

use chrono::Utc;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::types::{FailedFile, ScanOptions, ScanResult, SkippedCandidate};
use crate::error::Result;
use crate::index::{ArtifactIndex, DynArtifactIndex, UpsertMode, UpsertOutcome, VersionRecord};
use crate::layout::{ArtifactKey, DiskLayout};
use crate::manifest::{ManifestOutcome, ManifestReader};
use crate::scanner::{Candidate, DiscoveryScanner, Watermark};

/// Keeps the on-disk layout, the manifests and the index consistent.
#[derive(Clone)]
pub struct Reconciler {
    pub(super) layout: DiskLayout,
    pub(super) reader: ManifestReader,
    pub(super) scanner: DiscoveryScanner,
    pub(super) watermark: Watermark,
    pub(super) index: DynArtifactIndex,
}

/// What happened to one version during a scan.
enum SyncOutcome {
    Added,
    Existing,
    Skipped(String),
}

impl Reconciler {
    pub fn new(layout: DiskLayout, extensions: Vec<String>, index: DynArtifactIndex) -> Self {
        Self {
            reader: ManifestReader::new(layout.clone()),
            scanner: DiscoveryScanner::new(layout.clone(), extensions),
            watermark: Watermark::new(layout.base_dir()),
            layout,
            index,
        }
    }

    pub fn layout(&self) -> &DiskLayout {
        &self.layout
    }

    pub fn watermark(&self) -> &Watermark {
        &self.watermark
    }

    /// Discover model files and index every version not yet indexed.
    ///
    /// Existing rows are never rewritten. Per-version failures are collected
    /// in the result; the watermark is advanced once the pass is over.
    pub async fn perform_incremental_scan(&self, options: ScanOptions) -> ScanResult {
        let started = Instant::now();
        let previous = self.watermark.read();
        let since = if options.full { None } else { previous };

        info!(
            "Starting {} scan of {}",
            if options.full { "full" } else { "incremental" },
            self.layout.base_dir().display()
        );

        let discovery = self.scanner.discover(since);
        let mut result = ScanResult {
            files_scanned: discovery.candidates.len(),
            unreadable_entries: discovery.unreadable.len(),
            ..Default::default()
        };

        let mut seen: HashSet<ArtifactKey> = HashSet::new();
        for candidate in &discovery.candidates {
            if !seen.insert(candidate.key) {
                debug!("Version {} already handled in this scan", candidate.key);
                continue;
            }

            match self.sync_candidate(candidate).await {
                Ok(SyncOutcome::Added) => result.new_records_added += 1,
                Ok(SyncOutcome::Existing) => result.existing_records_found += 1,
                Ok(SyncOutcome::Skipped(reason)) => {
                    debug!("Skipping {}: {}", candidate.key, reason);
                    result.skipped.push(SkippedCandidate {
                        model_type: candidate.key.model_type,
                        model_id: candidate.key.model_id,
                        version_id: candidate.key.version_id,
                        path: candidate.path.clone(),
                        reason,
                    });
                }
                Err(e) => {
                    warn!("Failed to index {}: {}", candidate.path.display(), e);
                    result.failed_files.push(FailedFile {
                        path: candidate.path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        // Never move the watermark backwards, even if the clock did.
        let completed = match previous {
            Some(previous) if previous > Utc::now() => previous,
            _ => Utc::now(),
        };
        if let Err(e) = self.watermark.write(completed) {
            warn!("Failed to persist scan watermark: {}", e);
            result.failed_files.push(FailedFile {
                path: self.watermark.path().to_path_buf(),
                reason: e.to_string(),
            });
        }

        result.scan_duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "Scan finished in {}ms: {} files, {} added, {} existing, {} skipped, {} failed",
            result.scan_duration_ms,
            result.files_scanned,
            result.new_records_added,
            result.existing_records_found,
            result.skipped.len(),
            result.failed_files.len()
        );
        result
    }

    async fn sync_candidate(&self, candidate: &Candidate) -> Result<SyncOutcome> {
        let (model, version) = match self.reader.read(&candidate.key).await {
            ManifestOutcome::Valid { model, version } => (model, version),
            outcome => {
                return Ok(SyncOutcome::Skipped(
                    outcome.reason().unwrap_or_else(|| "unusable manifests".to_string()),
                ))
            }
        };

        if self.index.version_exists(candidate.key.version_id).await? {
            return Ok(SyncOutcome::Existing);
        }

        let record = VersionRecord::from_manifests(&model, &version)?;
        match self
            .index
            .upsert_model_version(&record, UpsertMode::InsertOnly)
            .await?
        {
            UpsertOutcome::AlreadyPresent => Ok(SyncOutcome::Existing),
            UpsertOutcome::Inserted | UpsertOutcome::Replaced => Ok(SyncOutcome::Added),
        }
    }
}
