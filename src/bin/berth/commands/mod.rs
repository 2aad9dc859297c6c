//! Command implementations

pub mod completions;
pub mod extractors;
pub mod fetch;
pub mod prepare;
pub mod probe;
pub mod toolchain;
pub mod unpack;
