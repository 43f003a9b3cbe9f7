//! Mirror Core - Headless engine for a local mirror of catalog model artifacts.
//!
//! Keeps three sources of truth consistent: the on-disk directory layout, the
//! JSON manifests saved next to downloaded files, and a relational index. It
//! also removes artifacts from all three through a two-phase confirmation.
//!
//! # Example
//!
//! ```rust,ignore
//! use mirror_core::{MirrorApi, ScanOptions};
//!
//! #[tokio::main]
//! async fn main() -> mirror_core::Result<()> {
//!     let api = MirrorApi::new("/path/to/mirror").await?;
//!
//!     let scan = api.perform_incremental_scan(ScanOptions::default()).await;
//!     println!("Indexed {} new versions", scan.new_records_added);
//!
//!     let drifted = api
//!         .perform_consistency_check()
//!         .await?
//!         .into_iter()
//!         .filter(|r| r.needs_repair())
//!         .count();
//!     println!("{} versions drifted", drifted);
//!
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod deletion;
pub mod error;
pub mod index;
pub mod layout;
pub mod manifest;
pub mod metadata;
pub mod models;
pub mod reconcile;
pub mod scanner;

mod api;

// Re-export commonly used types
pub use catalog::{CatalogClient, DynCatalogClient};
pub use deletion::{
    BatchDeletionSummary, ConfirmationStats, DeletionConfirmation, DeletionDetails,
    DeletionResult, DeletionService,
};
pub use error::{ConfirmationFailure, MirrorError, Result, ScanOperation};
pub use index::{ArtifactIndex, DynArtifactIndex, SqliteIndex};
pub use layout::{ArtifactKey, DiskLayout, ManifestKind};
pub use manifest::{ManifestOutcome, ValidationSummary};
pub use models::{Model, ModelFile, ModelImage, ModelType, ModelVersion};
pub use reconcile::{ConsistencyReport, DriftItem, Reconciler, RepairResult, ScanOptions, ScanResult};

// Re-export builder from api module
pub use api::{MirrorApiBuilder, MirrorStats};

use std::path::{Path, PathBuf};

use manifest::ManifestReader;

/// Main API struct for mirror operations.
///
/// Bundles the layout, the index, the reconciler and the deletion service
/// for one base directory.
pub struct MirrorApi {
    layout: DiskLayout,
    reader: ManifestReader,
    index: DynArtifactIndex,
    reconciler: Reconciler,
    deletion: DeletionService,
}

impl MirrorApi {
    /// Create a builder for MirrorApi.
    ///
    /// Use the builder for more control over initialization options:
    /// - `database_path` / `in_memory_database`: Where the index lives
    /// - `extensions`: Model-file extensions to discover
    /// - `confirmation_ttl`: Lifetime of deletion tokens
    /// - `catalog`: Catalog client for by-id deletion requests
    /// - `auto_create_dirs`: Create the base directory automatically
    pub fn builder(base_dir: impl Into<PathBuf>) -> MirrorApiBuilder {
        MirrorApiBuilder::new(base_dir)
    }

    /// Create a MirrorApi with default options.
    ///
    /// # Arguments
    ///
    /// * `base_dir` - Existing mirror root; the index goes to `<base_dir>/mirror.db`
    pub async fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        MirrorApiBuilder::new(base_dir).build().await
    }

    /// Get the mirror root directory.
    pub fn base_dir(&self) -> &Path {
        self.layout.base_dir()
    }

    pub fn layout(&self) -> &DiskLayout {
        &self.layout
    }

    pub fn index(&self) -> &DynArtifactIndex {
        &self.index
    }
}
