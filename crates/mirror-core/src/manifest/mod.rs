//! Manifest reading and validation.

mod reader;
mod validation;

pub use reader::{ManifestOutcome, ManifestReader};
pub use validation::{
    validate_model_manifest, validate_version_manifest, ValidationIssue, ValidationSummary,
};
