//! Filesystem-safe file names and URL-derived media identities.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::StoreConfig;
use crate::error::{MirrorError, Result};

/// Characters invalid on at least one supported host filesystem, plus ASCII
/// control characters.
static INVALID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).unwrap());

/// Reserved device names on Windows. Matched against the part before the first
/// dot, case-insensitively.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Sanitize a declared file name into the form stored on disk.
///
/// Names that are already safe come back unchanged, so the mapping is the
/// identity for ordinary catalog files.
///
/// # Rules Applied
/// 1. Replace invalid characters with `_`
/// 2. Trim trailing dots and spaces
/// 3. Suffix reserved device names with `_`
/// 4. Ensure non-empty result
///
/// # Examples
///
/// ```
/// use mirror_core::layout::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("model.safetensors"), "model.safetensors");
/// assert_eq!(sanitize_file_name("a:b?.ckpt"), "a_b_.ckpt");
/// ```
pub fn sanitize_file_name(name: &str) -> String {
    let mut result = INVALID_CHARS.replace_all(name, "_").into_owned();

    let trimmed_len = result.trim_end_matches(['.', ' ']).len();
    result.truncate(trimmed_len);

    let stem_len = result.find('.').unwrap_or(result.len());
    if RESERVED_NAMES
        .iter()
        .any(|r| r.eq_ignore_ascii_case(&result[..stem_len]))
    {
        result.insert(stem_len, '_');
    }

    if result.is_empty() {
        result = "unnamed_file".to_string();
    }

    result
}

/// Last non-empty path segment of a URL (or URL-like string).
fn last_segment(url: &str) -> Option<String> {
    match url::Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .map(str::to_string),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').find(|s| !s.is_empty()))
            .map(str::to_string),
    }
}

/// Derive an image id from its URL: the last path segment with its extension
/// stripped, parsed as an integer.
pub fn image_id_from_url(url: &str) -> Result<i64> {
    let invalid = || MirrorError::InvalidImageUrl {
        url: url.to_string(),
    };

    let segment = last_segment(url).ok_or_else(invalid)?;
    let stem = match segment.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => segment.as_str(),
    };
    stem.parse::<i64>().map_err(|_| invalid())
}

/// Extension for a media file, taken from its URL and lowercased.
pub fn media_extension(url: &str) -> String {
    last_segment(url)
        .and_then(|segment| {
            segment
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_lowercase())
                .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        })
        .unwrap_or_else(|| StoreConfig::DEFAULT_MEDIA_EXTENSION.to_string())
}
