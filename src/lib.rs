//! Berth - bootstraps third-party C/C++ sources for a build
//!
//! This crate provides the library behind the `berth` command: compiler
//! capability probing, archive downloads with change detection, and
//! unpacking through the host's archive tools.

pub mod builder;
pub mod core;
pub mod ops;
pub mod sources;
pub mod util;

pub use builder::probe::{CompileContext, FlagEnv, FlagSearchResult};
pub use core::manifest::Manifest;
pub use util::context::GlobalContext;
