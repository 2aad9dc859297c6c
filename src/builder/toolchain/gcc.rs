//! GCC/Clang toolchain implementation.

use std::path::{Path, PathBuf};

use crate::core::language::Language;

use super::{CommandSpec, CompileInput, LinkInput, Toolchain, ToolchainPlatform};

/// GCC/Clang toolchain (Unix-like systems).
#[derive(Debug, Clone)]
pub struct GccToolchain {
    /// Path to the C compiler
    pub cc: PathBuf,
    /// Path to the C++ compiler
    pub cxx: PathBuf,
    /// Compiler family (gcc, clang, apple-clang)
    pub family: ToolchainPlatform,
}

impl GccToolchain {
    /// Create a new GCC-style toolchain.
    pub fn new(cc: PathBuf, cxx: PathBuf, family: ToolchainPlatform) -> Self {
        GccToolchain { cc, cxx, family }
    }

    /// Infer C++ compiler path from C compiler path.
    ///
    /// Handles common patterns:
    /// - gcc, x86_64-linux-gnu-gcc -> g++, x86_64-linux-gnu-g++
    /// - clang -> clang++
    /// - cc, /usr/bin/cc -> c++, /usr/bin/c++
    pub fn infer_cxx(cc: &Path) -> PathBuf {
        let cc_str = cc.to_string_lossy();

        if cc_str.ends_with("gcc") {
            return PathBuf::from(format!("{}++", &cc_str[..cc_str.len() - 2]));
        }

        if cc_str.ends_with("clang") {
            return PathBuf::from(format!("{}++", cc_str));
        }

        // Only match "cc" when it's a complete basename (not "mycc")
        let is_standalone_cc = cc_str == "cc"
            || cc_str.ends_with("/cc")
            || cc_str.ends_with("\\cc")
            || cc_str.ends_with("-cc");

        if is_standalone_cc {
            return PathBuf::from(format!("{}++", &cc_str[..cc_str.len() - 1]));
        }

        PathBuf::from(format!("{}++", cc_str))
    }

    fn driver(&self, lang: Language) -> &Path {
        match lang {
            Language::C => &self.cc,
            Language::Cxx => &self.cxx,
        }
    }
}

impl Toolchain for GccToolchain {
    fn platform(&self) -> ToolchainPlatform {
        self.family
    }

    fn compiler_path(&self, lang: Language) -> &Path {
        self.driver(lang)
    }

    fn compile_command(&self, input: &CompileInput, lang: Language) -> CommandSpec {
        CommandSpec::new(self.driver(lang))
            .args(input.cflags.iter().cloned())
            .arg("-c")
            .arg(input.source.display().to_string())
            .arg("-o")
            .arg(input.output.display().to_string())
    }

    fn link_command(&self, input: &LinkInput, lang: Language) -> CommandSpec {
        // Libraries go last so GNU ld resolves them after the objects.
        CommandSpec::new(self.driver(lang))
            .args(input.cflags.iter().cloned())
            .arg(input.source.display().to_string())
            .arg("-o")
            .arg(input.output.display().to_string())
            .args(input.ldflags.iter().cloned())
            .args(input.libs.iter().map(|lib| format!("-l{}", lib)))
    }

    fn object_extension(&self) -> &str {
        ".o"
    }

    fn exe_extension(&self) -> &str {
        ""
    }
}
