//! Persisted timestamp of the last completed scan.

use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::Result;
use crate::metadata::{atomic_write_text, read_text};

/// Plain-text RFC 3339 timestamp stored in the base directory.
///
/// There is a single writer (the reconciler) and no lock.
#[derive(Debug, Clone)]
pub struct Watermark {
    path: PathBuf,
}

impl Watermark {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            path: base_dir.join(StoreConfig::WATERMARK_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last recorded scan completion. Missing or unreadable watermarks read as
    /// `None`, which makes the next incremental scan cover everything.
    pub fn read(&self) -> Option<DateTime<Utc>> {
        let contents = match read_text(&self.path) {
            Ok(Some(contents)) => contents,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read scan watermark: {}", e);
                return None;
            }
        };

        match DateTime::parse_from_rfc3339(contents.trim()) {
            Ok(ts) => Some(ts.with_timezone(&Utc)),
            Err(e) => {
                warn!(
                    "Ignoring unparsable scan watermark {:?} in {}: {}",
                    contents.trim(),
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    pub fn write(&self, at: DateTime<Utc>) -> Result<()> {
        let stamp = at.to_rfc3339_opts(SecondsFormat::Nanos, true);
        atomic_write_text(&self.path, &stamp)?;
        debug!("Scan watermark set to {}", stamp);
        Ok(())
    }
}
