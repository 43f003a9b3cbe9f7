//! Builder for configuring MirrorApi initialization.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::catalog::DynCatalogClient;
use crate::config::{default_extensions, DeletionConfig, StoreConfig};
use crate::deletion::DeletionService;
use crate::error::{MirrorError, Result};
use crate::index::{DynArtifactIndex, SqliteIndex};
use crate::layout::DiskLayout;
use crate::manifest::ManifestReader;
use crate::reconcile::Reconciler;
use crate::MirrorApi;

/// Where the index lives.
enum IndexChoice {
    /// `<base_dir>/mirror.db`
    Default,
    File(PathBuf),
    InMemory,
    Custom(DynArtifactIndex),
}

/// Builder for configuring MirrorApi initialization.
///
/// # Example
///
/// ```rust,ignore
/// use mirror_core::MirrorApi;
///
/// let api = MirrorApi::builder("./mirror")
///     .auto_create_dirs(true)
///     .database_path("./mirror.db")
///     .build()
///     .await?;
/// ```
pub struct MirrorApiBuilder {
    base_dir: PathBuf,
    index: IndexChoice,
    extensions: Vec<String>,
    confirmation_ttl: Duration,
    catalog: Option<DynCatalogClient>,
    auto_create_dirs: bool,
}

impl MirrorApiBuilder {
    /// Create a new builder for the given base directory.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            index: IndexChoice::Default,
            extensions: default_extensions(),
            confirmation_ttl: DeletionConfig::CONFIRMATION_TTL,
            catalog: None,
            auto_create_dirs: false,
        }
    }

    /// Use a SQLite database at `path` instead of `<base_dir>/mirror.db`.
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index = IndexChoice::File(path.into());
        self
    }

    /// Keep the index in memory. Nothing survives the process.
    pub fn in_memory_database(mut self) -> Self {
        self.index = IndexChoice::InMemory;
        self
    }

    /// Use a caller-provided index implementation.
    pub fn index(mut self, index: DynArtifactIndex) -> Self {
        self.index = IndexChoice::Custom(index);
        self
    }

    /// Replace the set of model-file extensions the scanner recognizes.
    ///
    /// Default: safetensors, ckpt, pt, pth, bin, onnx, gguf
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// How long deletion confirmations stay valid.
    ///
    /// Default: 30 minutes
    pub fn confirmation_ttl(mut self, ttl: Duration) -> Self {
        self.confirmation_ttl = ttl;
        self
    }

    /// Catalog client used by the by-id deletion requests.
    pub fn catalog(mut self, catalog: DynCatalogClient) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Create the base directory if it doesn't exist.
    ///
    /// Default: `false` (the directory must exist)
    pub fn auto_create_dirs(mut self, enable: bool) -> Self {
        self.auto_create_dirs = enable;
        self
    }

    /// Build the MirrorApi instance.
    pub async fn build(self) -> Result<MirrorApi> {
        if !self.base_dir.exists() {
            if self.auto_create_dirs {
                std::fs::create_dir_all(&self.base_dir).map_err(|e| MirrorError::Io {
                    message: format!("Failed to create base directory: {}", self.base_dir.display()),
                    path: Some(self.base_dir.clone()),
                    source: Some(e),
                })?;
            } else {
                return Err(MirrorError::Config {
                    message: format!("Base directory does not exist: {}", self.base_dir.display()),
                });
            }
        } else if !self.base_dir.is_dir() {
            return Err(MirrorError::Config {
                message: format!("Base directory is not a directory: {}", self.base_dir.display()),
            });
        }

        if self.extensions.is_empty() {
            return Err(MirrorError::Config {
                message: "At least one model-file extension is required".to_string(),
            });
        }

        let index: DynArtifactIndex = match self.index {
            IndexChoice::Default => {
                Arc::new(SqliteIndex::new(self.base_dir.join(StoreConfig::DB_FILENAME))?)
            }
            IndexChoice::File(path) => Arc::new(SqliteIndex::new(path)?),
            IndexChoice::InMemory => Arc::new(SqliteIndex::in_memory()?),
            IndexChoice::Custom(index) => index,
        };

        let layout = DiskLayout::new(self.base_dir.clone());
        let reconciler = Reconciler::new(layout.clone(), self.extensions, index.clone());
        let deletion = DeletionService::new(
            layout.clone(),
            index.clone(),
            self.catalog,
            self.confirmation_ttl,
        )?;

        info!("Mirror engine ready at {}", self.base_dir.display());
        Ok(MirrorApi {
            reader: ManifestReader::new(layout.clone()),
            layout,
            index,
            reconciler,
            deletion,
        })
    }
}
