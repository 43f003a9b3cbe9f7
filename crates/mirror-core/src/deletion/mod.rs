//! Deletion of mirrored versions.
//!
//! A deletion is requested first, which snapshots what will be removed and
//! issues a short-lived token; confirming the token performs it. Direct
//! deletion skips the token.

mod service;
mod tokens;
mod types;

pub use service::DeletionService;
pub use tokens::ConfirmationStore;
pub use types::{
    BatchDeletionSummary, ConfirmationStats, DeletionConfirmation, DeletionDetails,
    DeletionResult, PendingToken,
};
