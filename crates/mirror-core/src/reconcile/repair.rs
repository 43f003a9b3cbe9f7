//! Repair: re-sync flagged index rows from their manifests.

use tracing::{info, warn};

use super::scan::Reconciler;
use super::types::{RepairFailure, RepairResult};
use crate::error::Result;
use crate::index::{ArtifactIndex, UpsertMode, VersionRecord};
use crate::layout::ArtifactKey;

impl Reconciler {
    /// Run a consistency check and overwrite the index row of every flagged
    /// version with what its manifests declare.
    ///
    /// The index is brought in line with the manifests, not the disk: files
    /// missing on disk stay missing.
    pub async fn repair_database_records(&self) -> Result<RepairResult> {
        let reports = self.perform_consistency_check().await?;
        let flagged: Vec<ArtifactKey> = reports
            .iter()
            .filter(|report| report.needs_repair())
            .map(|report| report.key())
            .collect();

        let mut result = RepairResult {
            total: flagged.len(),
            ..Default::default()
        };

        for key in flagged {
            match self.repair_version(&key).await {
                Ok(()) => result.repaired += 1,
                Err(e) => {
                    warn!("Failed to repair {}: {}", key, e);
                    result.failed += 1;
                    result.failures.push(RepairFailure {
                        model_id: key.model_id,
                        version_id: key.version_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Repair finished: {} of {} repaired, {} failed",
            result.repaired, result.total, result.failed
        );
        Ok(result)
    }

    async fn repair_version(&self, key: &ArtifactKey) -> Result<()> {
        let (model, version) = self.reader.load(key).await?;
        let record = VersionRecord::from_manifests(&model, &version)?;
        self.index
            .upsert_model_version(&record, UpsertMode::Overwrite)
            .await?;
        Ok(())
    }
}
