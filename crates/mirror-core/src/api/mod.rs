//! API implementation submodules.
//!
//! Each submodule contains `impl MirrorApi` blocks that extend the public API
//! with domain-specific methods. The struct definition remains in `lib.rs`.

mod builder;
mod deletion;
mod store;

pub use builder::MirrorApiBuilder;
pub use store::MirrorStats;
