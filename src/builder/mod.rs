//! Compiler-facing machinery: toolchain detection and capability probes.

pub mod probe;
pub mod toolchain;

pub use probe::{CompileContext, FlagEnv, FlagSearchResult};
pub use toolchain::{detect_toolchain, Toolchain, ToolchainPlatform};
