//! Discovery scanner and scan watermark.

mod discovery;
mod watermark;

pub use discovery::{Candidate, Discovery, DiscoveryScanner};
pub use watermark::Watermark;
