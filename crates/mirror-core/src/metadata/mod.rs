//! Metadata persistence.
//!
//! Atomic JSON and text file operations used for manifests and the scan
//! watermark.

mod atomic;

pub use atomic::{atomic_write_json, atomic_write_text, read_text};
