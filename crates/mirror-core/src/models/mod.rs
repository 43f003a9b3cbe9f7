//! Catalog data models.
//!
//! These mirror the catalog's response shapes (camelCase on the wire) and are
//! exactly what manifests store on disk.

mod model;
mod version;

pub use model::*;
pub use version::*;
