//! Discovery of model files under the base directory.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::layout::{ArtifactArea, ArtifactKey, DiskLayout};

/// A model file whose path fits the layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub key: ArtifactKey,
    /// On-disk file name under `files/`.
    pub file_name: String,
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
}

/// Output of one walk.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Candidates in walk order.
    pub candidates: Vec<Candidate>,
    /// Files that matched the extension set but were older than the watermark.
    pub skipped_by_watermark: usize,
    /// Entries that could not be read, with the reason.
    pub unreadable: Vec<(PathBuf, String)>,
}

/// Walks the base directory for model files.
#[derive(Debug, Clone)]
pub struct DiscoveryScanner {
    layout: DiskLayout,
    extensions: Vec<String>,
}

impl DiscoveryScanner {
    pub fn new(layout: DiskLayout, extensions: Vec<String>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();
        Self { layout, extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn has_model_extension(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|known| known.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    /// Enumerate model files in one pass.
    ///
    /// With `since` set, only files modified strictly after it are kept.
    /// Paths that do not fit the layout are dropped without error, since the
    /// base directory may hold unrelated content.
    pub fn discover(&self, since: Option<DateTime<Utc>>) -> Discovery {
        let mut discovery = Discovery::default();

        for entry in WalkDir::new(self.layout.base_dir()).min_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| p.to_path_buf())
                        .unwrap_or_else(|| self.layout.base_dir().to_path_buf());
                    warn!("Skipping unreadable entry {}: {}", path.display(), e);
                    discovery.unreadable.push((path, e.to_string()));
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.has_model_extension(entry.path()) {
                continue;
            }

            let Some(artifact) = self.layout.decompose(entry.path()) else {
                debug!("Ignoring file outside the layout: {}", entry.path().display());
                continue;
            };
            if artifact.area != ArtifactArea::Files {
                debug!("Ignoring model-like file in media: {}", entry.path().display());
                continue;
            }

            let modified = match entry.metadata().map_err(|e| e.to_string()).and_then(|m| {
                m.modified().map_err(|e| e.to_string())
            }) {
                Ok(modified) => DateTime::<Utc>::from(modified),
                Err(e) => {
                    warn!("Cannot stat {}: {}", entry.path().display(), e);
                    discovery.unreadable.push((entry.path().to_path_buf(), e));
                    continue;
                }
            };

            if let Some(since) = since {
                if modified <= since {
                    discovery.skipped_by_watermark += 1;
                    continue;
                }
            }

            discovery.candidates.push(Candidate {
                key: artifact.key,
                file_name: artifact.name,
                path: entry.into_path(),
                modified,
            });
        }

        debug!(
            "Discovered {} candidates ({} older than watermark, {} unreadable)",
            discovery.candidates.len(),
            discovery.skipped_by_watermark,
            discovery.unreadable.len()
        );
        discovery
    }
}
