//! MSVC toolchain implementation.

use std::path::{Path, PathBuf};

use crate::core::language::Language;

use super::{CommandSpec, CompileInput, LinkInput, Toolchain, ToolchainPlatform};

/// MSVC toolchain (Windows). `cl.exe` drives both compiling and linking.
#[derive(Debug, Clone)]
pub struct MsvcToolchain {
    /// Path to cl.exe
    pub cl: PathBuf,
}

impl MsvcToolchain {
    /// Create a new MSVC toolchain.
    pub fn new(cl: PathBuf) -> Self {
        MsvcToolchain { cl }
    }

    fn language_flag(lang: Language) -> &'static str {
        match lang {
            Language::C => "/TC",
            Language::Cxx => "/TP",
        }
    }
}

impl Toolchain for MsvcToolchain {
    fn platform(&self) -> ToolchainPlatform {
        ToolchainPlatform::Msvc
    }

    fn compiler_path(&self, _lang: Language) -> &Path {
        &self.cl
    }

    fn compile_command(&self, input: &CompileInput, lang: Language) -> CommandSpec {
        CommandSpec::new(&self.cl)
            .arg("/nologo")
            .arg("/c")
            .arg(Self::language_flag(lang))
            .args(input.cflags.iter().cloned())
            .arg(input.source.display().to_string())
            .arg(format!("/Fo{}", input.output.display()))
    }

    fn link_command(&self, input: &LinkInput, lang: Language) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.cl)
            .arg("/nologo")
            .arg(Self::language_flag(lang))
            .args(input.cflags.iter().cloned())
            .arg(input.source.display().to_string())
            .arg(format!("/Fe{}", input.output.display()))
            .args(input.libs.iter().map(|lib| format!("{}.lib", lib)));

        if !input.ldflags.is_empty() {
            cmd = cmd.arg("/link").args(input.ldflags.iter().cloned());
        }

        cmd
    }

    fn object_extension(&self) -> &str {
        ".obj"
    }

    fn exe_extension(&self) -> &str {
        ".exe"
    }
}
