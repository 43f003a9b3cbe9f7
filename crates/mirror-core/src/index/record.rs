//! The unit written to the index: one version plus its parent model.

use crate::error::Result;
use crate::layout::ArtifactKey;
use crate::models::{Model, ModelVersion};

/// A version ready to be indexed, with image identities already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionRecord {
    pub key: ArtifactKey,
    /// Parent model without attached versions.
    pub model: Model,
    pub version: ModelVersion,
    /// Resolved id of each entry in `version.images`, in order.
    pub image_ids: Vec<i64>,
}

impl VersionRecord {
    /// Build a record from a validated manifest pair.
    ///
    /// Fails with `InvalidImageUrl` when an image has no explicit id and none
    /// can be derived from its URL.
    pub fn from_manifests(model: &Model, version: &ModelVersion) -> Result<Self> {
        let image_ids = version
            .images
            .iter()
            .map(|image| image.resolve_id())
            .collect::<Result<Vec<_>>>()?;

        let mut version = version.clone();
        version.model_id = Some(model.id);

        Ok(Self {
            key: ArtifactKey::new(model.model_type, model.id, version.id),
            model: model.without_versions(),
            version,
            image_ids,
        })
    }
}
