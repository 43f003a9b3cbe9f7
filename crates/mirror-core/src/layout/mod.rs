//! Disk layout resolution.
//!
//! Pure functions from artifact identity to paths, and back.

mod naming;
mod resolver;

pub use naming::{image_id_from_url, media_extension, sanitize_file_name};
pub use resolver::{ArtifactArea, ArtifactKey, ArtifactPath, DiskLayout, ManifestKind};
