//! High-level operations.
//!
//! This module contains the implementation of Berth commands.

pub mod prepare;
pub mod probe;

pub use prepare::{prepare, prepare_manifest, PrepareOptions, PrepareResult};
pub use probe::{format_report, probe, run_probes, ProbeOptions, ProbeReport};
pub use run_tests::{run_tests, TestOptions};
