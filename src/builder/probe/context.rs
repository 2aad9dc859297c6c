//! Running probe programs through a real toolchain.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::builder::toolchain::{CompileInput, LinkInput, Toolchain};
use crate::core::language::Language;
use crate::util::fs::write_string;
use crate::util::process::ProcessBuilder;

use super::{CompileContext, FlagEnv};

/// A [`CompileContext`] that writes each test program into a scratch
/// directory and runs the toolchain's compiler on it.
#[derive(Debug)]
pub struct ToolchainContext<'a> {
    toolchain: &'a dyn Toolchain,
    scratch: TempDir,
    trials: usize,
}

impl<'a> ToolchainContext<'a> {
    pub fn new(toolchain: &'a dyn Toolchain) -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("berth-probe-")
            .tempdir()
            .context("failed to create probe scratch directory")?;

        Ok(ToolchainContext {
            toolchain,
            scratch,
            trials: 0,
        })
    }

    /// Number of compiler invocations so far.
    pub fn trials(&self) -> usize {
        self.trials
    }

    /// Write `source` to a fresh `conftest_<n><ext>` file.
    fn write_source(&mut self, source: &str, extension: &str) -> Result<(PathBuf, PathBuf)> {
        self.trials += 1;
        let stem = format!("conftest_{}", self.trials);
        let src = self.scratch.path().join(format!("{}{}", stem, extension));
        write_string(&src, source)?;
        Ok((src, self.scratch.path().join(stem)))
    }

    fn run(&self, program: PathBuf, args: Vec<String>) -> bool {
        let output = ProcessBuilder::new(program)
            .args(args)
            .cwd(self.scratch.path())
            .exec();

        match output {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                tracing::debug!(
                    "probe rejected:\n{}",
                    String::from_utf8_lossy(&output.stderr).trim_end()
                );
                false
            }
            Err(e) => {
                tracing::debug!("failed to run compiler: {:#}", e);
                false
            }
        }
    }
}

impl CompileContext for ToolchainContext<'_> {
    fn try_compile(&mut self, env: &FlagEnv, source: &str, extension: &str) -> bool {
        let lang = Language::from_extension(extension).unwrap_or_default();
        let (src, stem) = match self.write_source(source, extension) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::debug!("{:#}", e);
                return false;
            }
        };

        let input = CompileInput {
            source: src,
            output: stem.with_extension(self.toolchain.object_extension().trim_start_matches('.')),
            cflags: env.compile_flags(lang).to_vec(),
        };
        let cmd = self.toolchain.compile_command(&input, lang);
        self.run(cmd.program, cmd.args)
    }

    fn try_link(&mut self, env: &FlagEnv, source: &str, extension: &str) -> bool {
        let lang = Language::from_extension(extension).unwrap_or_default();
        let (src, stem) = match self.write_source(source, extension) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::debug!("{:#}", e);
                return false;
            }
        };

        let input = LinkInput {
            source: src,
            output: stem.with_extension(self.toolchain.exe_extension().trim_start_matches('.')),
            cflags: env.compile_flags(lang).to_vec(),
            ldflags: env.ldflags.clone(),
            libs: env.libs.clone(),
        };
        let cmd = self.toolchain.link_command(&input, lang);
        self.run(cmd.program, cmd.args)
    }
}
