//! Toolchain abstraction for C/C++ compilers.
//!
//! A toolchain knows how to turn a probe program into a compile or
//! compile-and-link command line for its compiler family.
//!
//! Toolchain detection priority:
//! 1. Toolchain config file (`.berth/toolchain.toml` or `~/.berth/toolchain.toml`)
//! 2. Environment variables (CC, CXX)
//! 3. Auto-detection (searching PATH for common compilers)

use std::path::{Path, PathBuf};

pub use crate::core::language::Language;

mod detect;
mod gcc;
mod msvc;

pub use detect::{detect_compiler_family, detect_toolchain, detect_toolchain_with};
pub use gcc::GccToolchain;
pub use msvc::MsvcToolchain;

/// A command to execute, with program and arguments.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// The program to run (e.g., "gcc", "cl.exe")
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Create a new command spec.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }
}

/// Input for a compile-only step.
#[derive(Debug, Clone)]
pub struct CompileInput {
    /// Source file to compile
    pub source: PathBuf,
    /// Output object file
    pub output: PathBuf,
    /// Compiler flags
    pub cflags: Vec<String>,
}

/// Input for a compile-and-link step producing an executable.
#[derive(Debug, Clone)]
pub struct LinkInput {
    /// Source file to compile and link
    pub source: PathBuf,
    /// Output executable
    pub output: PathBuf,
    /// Compiler flags
    pub cflags: Vec<String>,
    /// Linker flags
    pub ldflags: Vec<String>,
    /// Libraries to link (without -l prefix)
    pub libs: Vec<String>,
}

/// The platform/family of a toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolchainPlatform {
    /// GCC (GNU Compiler Collection)
    Gcc,
    /// Clang/LLVM
    Clang,
    /// Apple Clang (macOS)
    AppleClang,
    /// Microsoft Visual C++
    Msvc,
}

impl ToolchainPlatform {
    /// Get the platform name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolchainPlatform::Gcc => "gcc",
            ToolchainPlatform::Clang => "clang",
            ToolchainPlatform::AppleClang => "apple-clang",
            ToolchainPlatform::Msvc => "msvc",
        }
    }
}

impl std::fmt::Display for ToolchainPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for toolchain implementations.
pub trait Toolchain: Send + Sync + std::fmt::Debug {
    /// Get the toolchain platform.
    fn platform(&self) -> ToolchainPlatform;

    /// Get the compiler used for `lang`.
    fn compiler_path(&self, lang: Language) -> &Path;

    /// Generate a compile-only command.
    fn compile_command(&self, input: &CompileInput, lang: Language) -> CommandSpec;

    /// Generate a command that compiles and links an executable in one step.
    fn link_command(&self, input: &LinkInput, lang: Language) -> CommandSpec;

    /// Get the object file extension.
    fn object_extension(&self) -> &str;

    /// Get the executable extension.
    fn exe_extension(&self) -> &str;
}
