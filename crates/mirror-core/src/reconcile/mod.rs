//! Reconciliation of disk, manifests and index.
//!
//! - Scan-and-sync indexes newly discovered versions
//! - The consistency check reports drift per indexed version
//! - Repair re-syncs flagged rows from their manifests

mod consistency;
mod repair;
mod scan;
mod types;

pub use scan::Reconciler;
pub use types::{
    ConsistencyReport, DriftItem, FailedFile, RepairFailure, RepairResult, ScanOptions,
    ScanResult, SkippedCandidate,
};
