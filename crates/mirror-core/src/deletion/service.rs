//! Two-phase removal of model versions from the index and the disk.

use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::tokens::ConfirmationStore;
use super::types::{
    BatchDeletionSummary, ConfirmationStats, DeletionConfirmation, DeletionDetails,
    DeletionResult,
};
use crate::catalog::DynCatalogClient;
use crate::error::{ConfirmationFailure, MirrorError, Result};
use crate::index::{ArtifactIndex, DynArtifactIndex};
use crate::layout::{ArtifactKey, DiskLayout, ManifestKind};
use crate::manifest::ManifestReader;
use crate::models::{Model, ModelType};

/// Deletes versions, either directly or through a reviewed confirmation token.
///
/// The index row is always removed before the files.
#[derive(Clone)]
pub struct DeletionService {
    layout: DiskLayout,
    reader: ManifestReader,
    index: DynArtifactIndex,
    catalog: Option<DynCatalogClient>,
    tokens: ConfirmationStore,
}

impl DeletionService {
    pub fn new(
        layout: DiskLayout,
        index: DynArtifactIndex,
        catalog: Option<DynCatalogClient>,
        confirmation_ttl: Duration,
    ) -> Result<Self> {
        Ok(Self {
            reader: ManifestReader::new(layout.clone()),
            layout,
            index,
            catalog,
            tokens: ConfirmationStore::new(confirmation_ttl)?,
        })
    }

    // ========================================
    // Requests
    // ========================================

    /// Snapshot what deleting `version_id` of `model` would remove and issue
    /// a single-item token for it.
    pub async fn create_deletion_confirmation(
        &self,
        model: &Model,
        version_id: i64,
    ) -> Result<DeletionConfirmation> {
        let details = self.details_for(model, version_id).await?;
        let confirmation = self.tokens.issue(false, vec![details]);
        debug!(
            "Issued deletion token for version {} of model {}",
            version_id, model.id
        );
        Ok(confirmation)
    }

    /// Batch variant. Any item that cannot be resolved fails the whole
    /// request and no token is issued.
    pub async fn create_batch_deletion_confirmation(
        &self,
        items: &[(Model, i64)],
    ) -> Result<DeletionConfirmation> {
        if items.is_empty() {
            return Err(MirrorError::Config {
                message: "Batch deletion request has no items".to_string(),
            });
        }

        let mut details = Vec::with_capacity(items.len());
        for (model, version_id) in items {
            details.push(self.details_for(model, *version_id).await?);
        }
        let confirmation = self.tokens.issue(true, details);
        debug!("Issued batch deletion token for {} versions", items.len());
        Ok(confirmation)
    }

    /// Like [`create_deletion_confirmation`](Self::create_deletion_confirmation),
    /// resolving the model through the catalog, or the local manifests when
    /// the catalog cannot help.
    pub async fn create_deletion_confirmation_by_id(
        &self,
        model_id: i64,
        version_id: i64,
    ) -> Result<DeletionConfirmation> {
        let model = self.resolve_model(model_id, version_id).await?;
        self.create_deletion_confirmation(&model, version_id).await
    }

    pub async fn create_batch_deletion_confirmation_by_ids(
        &self,
        ids: &[(i64, i64)],
    ) -> Result<DeletionConfirmation> {
        let mut items = Vec::with_capacity(ids.len());
        for (model_id, version_id) in ids {
            items.push((self.resolve_model(*model_id, *version_id).await?, *version_id));
        }
        self.create_batch_deletion_confirmation(&items).await
    }

    // ========================================
    // Confirmation
    // ========================================

    /// Consume a single-item token and delete its version.
    pub async fn confirm_and_delete(&self, token: &str) -> Result<DeletionResult> {
        let items = self.tokens.take(token, false)?;
        let Some(details) = items.first() else {
            return Err(MirrorError::confirmation(ConfirmationFailure::Invalid));
        };
        into_single(self.delete_item(details).await)
    }

    /// Consume a batch token and delete every version in it.
    ///
    /// Fails with `BatchDelete` carrying every per-item result if any item
    /// failed.
    pub async fn confirm_and_delete_batch(&self, token: &str) -> Result<BatchDeletionSummary> {
        let items = self.tokens.take(token, true)?;
        let mut results = Vec::with_capacity(items.len());
        for details in &items {
            results.push(self.delete_item(details).await);
        }
        summarize(results)
    }

    /// Drop a pending token without deleting anything.
    pub fn cancel_deletion(&self, token: &str) -> bool {
        let cancelled = self.tokens.cancel(token);
        if cancelled {
            debug!("Cancelled deletion token {}", token);
        }
        cancelled
    }

    /// Pending tokens, after sweeping expired ones.
    pub fn get_confirmation_stats(&self) -> ConfirmationStats {
        self.tokens.stats()
    }

    // ========================================
    // Direct deletion
    // ========================================

    /// Delete a version immediately, without a token.
    pub async fn delete_model_version(
        &self,
        model: &Model,
        version_id: i64,
    ) -> Result<DeletionResult> {
        let details = self.details_for(model, version_id).await?;
        into_single(self.delete_item(&details).await)
    }

    /// Delete several versions immediately. Items fail independently.
    pub async fn delete_model_versions_batch(
        &self,
        items: &[(Model, i64)],
    ) -> Result<BatchDeletionSummary> {
        let mut results = Vec::with_capacity(items.len());
        for (model, version_id) in items {
            let result = match self.details_for(model, *version_id).await {
                Ok(details) => self.delete_item(&details).await,
                Err(e) => DeletionResult::failed(model.id, *version_id, e),
            };
            results.push(result);
        }
        summarize(results)
    }

    // ========================================
    // Internals
    // ========================================

    async fn details_for(&self, model: &Model, version_id: i64) -> Result<DeletionDetails> {
        let version = model
            .version(version_id)
            .ok_or(MirrorError::VersionNotFound {
                model_id: model.id,
                version_id,
            })?;
        let key = ArtifactKey::new(model.model_type, model.id, version_id);
        let path = self.layout.version_path(&key);
        let exists = tokio::fs::try_exists(&path).await.unwrap_or(false);

        Ok(DeletionDetails {
            version_id,
            model_id: model.id,
            model_type: model.model_type,
            model_name: model.name.clone(),
            version_name: version.name.clone(),
            path,
            file_count: version.files.len(),
            image_count: version.images.len(),
            exists,
        })
    }

    async fn resolve_model(&self, model_id: i64, version_id: i64) -> Result<Model> {
        if let Some(catalog) = &self.catalog {
            match catalog.get_model_by_id(model_id).await {
                Ok(mut model) => {
                    if model.version(version_id).is_none() {
                        match catalog.get_version_by_id(version_id).await {
                            Ok(version) if version.model_id.unwrap_or(model_id) == model_id => {
                                model.model_versions.push(version)
                            }
                            Ok(_) => {}
                            Err(e) => debug!("Catalog has no version {}: {}", version_id, e),
                        }
                    }
                    if model.version(version_id).is_some() {
                        return Ok(model);
                    }
                }
                Err(e) => warn!(
                    "Catalog lookup of model {} failed, using local manifests: {}",
                    model_id, e
                ),
            }
        }
        self.load_local_model(model_id, version_id).await
    }

    /// Find the version's manifests on disk under whichever type directory
    /// holds them.
    async fn load_local_model(&self, model_id: i64, version_id: i64) -> Result<Model> {
        for model_type in ModelType::ALL {
            let key = ArtifactKey::new(*model_type, model_id, version_id);
            let manifest = self.layout.manifest_path(ManifestKind::Version, &key);
            if !tokio::fs::try_exists(&manifest).await.unwrap_or(false) {
                continue;
            }

            let (mut model, version) = self.reader.load(&key).await?;
            if model.version(version_id).is_none() {
                model.model_versions.push(version);
            }
            return Ok(model);
        }
        Err(MirrorError::VersionNotFound {
            model_id,
            version_id,
        })
    }

    async fn delete_item(&self, details: &DeletionDetails) -> DeletionResult {
        let mut result = DeletionResult::new(details.model_id, details.version_id);

        match self.index.delete_model_version(details.version_id).await {
            Ok(outcome) => {
                result.database_deleted = outcome.deleted;
                result.model_deleted = outcome.model_deleted;
                if !outcome.deleted {
                    debug!("Version {} was not indexed", details.version_id);
                }
            }
            Err(e) => {
                warn!(
                    "Failed to delete index row for version {}: {}",
                    details.version_id, e
                );
                result.error = Some(e.to_string());
                return result;
            }
        }

        if !details.exists {
            return result;
        }

        let key = details.key();
        let version_dir = self.layout.version_path(&key);
        let deleted_files = count_entries(&self.layout.files_dir(&key)).await;
        let deleted_images = count_entries(&self.layout.media_dir(&key)).await;

        match tokio::fs::remove_dir_all(&version_dir).await {
            Ok(()) => {
                result.files_deleted = true;
                result.deleted_files = deleted_files;
                result.deleted_images = deleted_images;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} was already gone", version_dir.display());
            }
            Err(e) => {
                let err = MirrorError::io_with_path(e, &version_dir);
                warn!("{}", err);
                result.error = Some(err.to_string());
                return result;
            }
        }

        if result.model_deleted {
            if let Err(e) = self.remove_model_dir_if_unused(&key).await {
                warn!("Failed to remove model directory for {}: {}", key, e);
            }
        }

        info!(
            "Deleted version {} of model {} ({} files, {} images)",
            details.version_id, details.model_id, result.deleted_files, result.deleted_images
        );
        result
    }

    /// Remove the model directory, manifest included, once no version
    /// directories remain in it.
    async fn remove_model_dir_if_unused(&self, key: &ArtifactKey) -> Result<bool> {
        let model_dir = self.layout.model_path(key.model_type, key.model_id);
        let mut entries = match tokio::fs::read_dir(&model_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(MirrorError::io_with_path(e, &model_dir)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MirrorError::io_with_path(e, &model_dir))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| MirrorError::io_with_path(e, entry.path()))?;
            if file_type.is_dir() {
                return Ok(false);
            }
        }

        tokio::fs::remove_dir_all(&model_dir)
            .await
            .map_err(|e| MirrorError::io_with_path(e, &model_dir))?;
        debug!("Removed model directory {}", model_dir.display());
        Ok(true)
    }
}

async fn count_entries(dir: &Path) -> usize {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return 0;
    };
    let mut count = 0;
    while let Ok(Some(_)) = entries.next_entry().await {
        count += 1;
    }
    count
}

fn into_single(result: DeletionResult) -> Result<DeletionResult> {
    match result.error {
        None => Ok(result),
        Some(message) => Err(MirrorError::ModelVersionDelete {
            model_id: result.model_id,
            version_id: result.version_id,
            message,
        }),
    }
}

fn summarize(results: Vec<DeletionResult>) -> Result<BatchDeletionSummary> {
    let total = results.len();
    let failed_items: Vec<i64> = results
        .iter()
        .filter(|r| !r.is_success())
        .map(|r| r.version_id)
        .collect();
    let failed = failed_items.len();
    let succeeded = total - failed;

    if failed > 0 {
        return Err(MirrorError::BatchDelete {
            total,
            succeeded,
            failed,
            failed_items,
            results,
        });
    }
    Ok(BatchDeletionSummary {
        total,
        succeeded,
        failed,
        results,
    })
}
