//! Core data structures for Berth.
//!
//! - Languages and the standards that can be probed
//! - The `Berth.toml` manifest

pub mod language;
pub mod manifest;

pub use language::{Language, LanguageStandard};
pub use manifest::{Dependency, Manifest, ProbeSettings, MANIFEST_NAME};
