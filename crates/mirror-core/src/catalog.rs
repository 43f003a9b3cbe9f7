//! Interface to the third-party model catalog.
//!
//! The engine never talks HTTP itself; whatever fetches catalog data
//! implements [`CatalogClient`] and is handed to the builder.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{Model, ModelVersion};

/// Source of canonical catalog data.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetch a model with its versions attached.
    async fn get_model_by_id(&self, model_id: i64) -> Result<Model>;

    /// Fetch a single version. `model_id` is set on the result.
    async fn get_version_by_id(&self, version_id: i64) -> Result<ModelVersion>;
}

/// Shared handle to a catalog client.
pub type DynCatalogClient = Arc<dyn CatalogClient>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MirrorError;

    struct OfflineCatalog;

    #[async_trait]
    impl CatalogClient for OfflineCatalog {
        async fn get_model_by_id(&self, _model_id: i64) -> Result<Model> {
            Err(MirrorError::Catalog {
                message: "offline".into(),
            })
        }

        async fn get_version_by_id(&self, _version_id: i64) -> Result<ModelVersion> {
            Err(MirrorError::Catalog {
                message: "offline".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_client_is_object_safe() {
        let client: DynCatalogClient = Arc::new(OfflineCatalog);
        let err = client.get_model_by_id(1).await.unwrap_err();
        assert_eq!(err.to_string(), "Catalog error: offline");
    }
}
