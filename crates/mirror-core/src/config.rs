//! Centralized configuration for the mirror engine.
//!
//! Constants that define the on-disk contract live here; runtime options are
//! set through [`crate::MirrorApiBuilder`].

use std::time::Duration;

/// On-disk store configuration.
pub struct StoreConfig;

impl StoreConfig {
    /// Suffix appended to a model or version id to form its manifest name.
    pub const MANIFEST_SUFFIX: &'static str = ".manifest.json";
    /// Directory under a version directory that holds model files.
    pub const FILES_DIR_NAME: &'static str = "files";
    /// Directory under a version directory that holds media files.
    pub const MEDIA_DIR_NAME: &'static str = "media";
    /// Watermark file kept in the base directory.
    pub const WATERMARK_FILENAME: &'static str = ".last_scan";
    /// Default SQLite database filename (placed in the base directory).
    pub const DB_FILENAME: &'static str = "mirror.db";
    /// Extension used for media files whose URL carries none.
    pub const DEFAULT_MEDIA_EXTENSION: &'static str = "jpeg";
    /// Model-file extensions the discovery scanner recognizes by default.
    pub const MODEL_EXTENSIONS: &'static [&'static str] =
        &["safetensors", "ckpt", "pt", "pth", "bin", "onnx", "gguf"];
}

/// Deletion workflow configuration.
pub struct DeletionConfig;

impl DeletionConfig {
    /// How long a deletion confirmation stays valid.
    pub const CONFIRMATION_TTL: Duration = Duration::from_secs(30 * 60);
}

/// Default extension set as owned strings.
pub fn default_extensions() -> Vec<String> {
    StoreConfig::MODEL_EXTENSIONS
        .iter()
        .map(|e| e.to_string())
        .collect()
}
