//! Deletion methods on MirrorApi.

use crate::deletion::{BatchDeletionSummary, ConfirmationStats, DeletionConfirmation, DeletionResult};
use crate::error::Result;
use crate::models::Model;
use crate::MirrorApi;

impl MirrorApi {
    // ========================================
    // Deletion Requests
    // ========================================

    pub async fn create_deletion_confirmation(
        &self,
        model: &Model,
        version_id: i64,
    ) -> Result<DeletionConfirmation> {
        self.deletion
            .create_deletion_confirmation(model, version_id)
            .await
    }

    pub async fn create_batch_deletion_confirmation(
        &self,
        items: &[(Model, i64)],
    ) -> Result<DeletionConfirmation> {
        self.deletion.create_batch_deletion_confirmation(items).await
    }

    /// Request a deletion knowing only the ids. The catalog is asked first,
    /// then the local manifests.
    pub async fn create_deletion_confirmation_by_id(
        &self,
        model_id: i64,
        version_id: i64,
    ) -> Result<DeletionConfirmation> {
        self.deletion
            .create_deletion_confirmation_by_id(model_id, version_id)
            .await
    }

    pub async fn create_batch_deletion_confirmation_by_ids(
        &self,
        ids: &[(i64, i64)],
    ) -> Result<DeletionConfirmation> {
        self.deletion
            .create_batch_deletion_confirmation_by_ids(ids)
            .await
    }

    // ========================================
    // Confirmation
    // ========================================

    pub async fn confirm_and_delete(&self, token: &str) -> Result<DeletionResult> {
        self.deletion.confirm_and_delete(token).await
    }

    pub async fn confirm_and_delete_batch(&self, token: &str) -> Result<BatchDeletionSummary> {
        self.deletion.confirm_and_delete_batch(token).await
    }

    pub fn cancel_deletion(&self, token: &str) -> bool {
        self.deletion.cancel_deletion(token)
    }

    pub fn get_confirmation_stats(&self) -> ConfirmationStats {
        self.deletion.get_confirmation_stats()
    }

    // ========================================
    // Direct Deletion
    // ========================================

    pub async fn delete_model_version(
        &self,
        model: &Model,
        version_id: i64,
    ) -> Result<DeletionResult> {
        self.deletion.delete_model_version(model, version_id).await
    }

    pub async fn delete_model_versions_batch(
        &self,
        items: &[(Model, i64)],
    ) -> Result<BatchDeletionSummary> {
        self.deletion.delete_model_versions_batch(items).await
    }
}
