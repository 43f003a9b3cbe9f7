//! Error types for the mirror engine.
//!
//! The taxonomy is closed: every failure the engine can report is one of the
//! variants below, so callers branch on outcome with a `match` instead of
//! probing error shapes at runtime.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::deletion::DeletionResult;
use crate::manifest::ValidationSummary;

/// The stage of a scan an error was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanOperation {
    Scan,
    JsonParse,
    Database,
    FileNotFound,
    DirectoryStructure,
}

impl fmt::Display for ScanOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanOperation::Scan => "scan",
            ScanOperation::JsonParse => "json-parse",
            ScanOperation::Database => "database",
            ScanOperation::FileNotFound => "file-not-found",
            ScanOperation::DirectoryStructure => "directory-structure",
        };
        f.write_str(s)
    }
}

/// Why a deletion confirmation could not be honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationFailure {
    /// No pending confirmation is stored under the token.
    Missing,
    /// The confirmation exists but its deadline has passed.
    Expired,
    /// The token exists but cannot be used this way (e.g. a batch token
    /// handed to the single-item confirm).
    Invalid,
}

impl fmt::Display for ConfirmationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfirmationFailure::Missing => "missing",
            ConfirmationFailure::Expired => "expired",
            ConfirmationFailure::Invalid => "invalid",
        };
        f.write_str(s)
    }
}

/// Main error type for the mirror engine.
#[derive(Debug, Error)]
pub enum MirrorError {
    // Scan errors
    #[error("Scan failed during {operation}: {message}")]
    Scan {
        operation: ScanOperation,
        message: String,
    },

    #[error("Invalid JSON in {path:?}: {summary}")]
    JsonParse {
        path: PathBuf,
        summary: ValidationSummary,
    },

    // Database errors
    #[error("Database error (model {model_id:?}, version {version_id:?}): {message}")]
    Database {
        message: String,
        model_id: Option<i64>,
        version_id: Option<i64>,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // Layout errors
    #[error("File {file_id} is not declared by version {version_id}")]
    UnknownFile { version_id: i64, file_id: i64 },

    #[error("Image {image_id} is not declared by version {version_id}")]
    UnknownMedia { version_id: i64, image_id: i64 },

    #[error("Cannot derive an image id from URL {url}")]
    InvalidImageUrl { url: String },

    #[error("Version {version_id} not found on model {model_id}")]
    VersionNotFound { model_id: i64, version_id: i64 },

    // Deletion errors
    #[error("Failed to delete version {version_id} of model {model_id}: {message}")]
    ModelVersionDelete {
        model_id: i64,
        version_id: i64,
        message: String,
    },

    #[error("Deletion confirmation {reason}")]
    DeleteConfirmation { reason: ConfirmationFailure },

    #[error("Batch delete: {failed} of {total} items failed")]
    BatchDelete {
        total: usize,
        succeeded: usize,
        failed: usize,
        failed_items: Vec<i64>,
        results: Vec<DeletionResult>,
    },

    // Collaborators
    #[error("Catalog error: {message}")]
    Catalog { message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for mirror operations.
pub type Result<T> = std::result::Result<T, MirrorError>;

impl From<std::io::Error> for MirrorError {
    fn from(err: std::io::Error) -> Self {
        MirrorError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for MirrorError {
    fn from(err: serde_json::Error) -> Self {
        MirrorError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for MirrorError {
    fn from(err: rusqlite::Error) -> Self {
        MirrorError::Database {
            message: err.to_string(),
            model_id: None,
            version_id: None,
            source: Some(err),
        }
    }
}

impl MirrorError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        MirrorError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Attach model/version context to a database error. Other variants pass
    /// through untouched.
    pub fn with_version_context(self, model_id: i64, version_id: i64) -> Self {
        match self {
            MirrorError::Database {
                message, source, ..
            } => MirrorError::Database {
                message,
                model_id: Some(model_id),
                version_id: Some(version_id),
                source,
            },
            other => other,
        }
    }

    /// Shorthand for a confirmation error.
    pub fn confirmation(reason: ConfirmationFailure) -> Self {
        MirrorError::DeleteConfirmation { reason }
    }

    /// Check if retrying the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MirrorError::Io { .. } | MirrorError::Database { .. })
    }
}
