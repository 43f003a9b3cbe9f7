//! Relational index of mirrored versions.
//!
//! This module provides:
//! - The `ArtifactIndex` port the reconciler and deletion service talk to
//! - `VersionRecord`, the unit written through the port
//! - A SQLite adapter

mod port;
mod record;
mod sqlite;

pub use port::{
    ArtifactIndex, DeleteOutcome, DynArtifactIndex, IndexedFile, IndexedVersion, UpsertMode,
    UpsertOutcome,
};
pub use record::VersionRecord;
pub use sqlite::SqliteIndex;
