//! Compiler capability probing.
//!
//! A probe compiles a tiny test program to find out whether the compiler
//! needs an extra flag to accept a language standard (C99, C++11) or to
//! build threaded code. The search is always the same: try the program with
//! the flags as they are, then try each candidate flag in priority order,
//! keeping the first one that works and restoring the flag list after every
//! failed trial.
//!
//! The compiler is reached through [`CompileContext`], so the search logic
//! is independent of how (or whether) a real compiler is invoked.

mod checks;
mod config;
mod context;

pub use checks::{check_c99_flags, check_cxx11_flags, check_pthreads, PTHREAD_FLAGS, PTHREAD_LIBS};
pub use config::{
    validate_configuration, CompilerConfigs, CompilerConfiguration, DefaultConfiguration,
    GccConfiguration, ProbeError,
};
pub use context::ToolchainContext;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::language::Language;

/// Outcome of a flag search. First success wins; never a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "flag", rename_all = "kebab-case")]
pub enum FlagSearchResult {
    /// The test program compiled with the flags unchanged.
    NoFlagNeeded,
    /// No candidate made the test program compile.
    NoFlagFound,
    /// This flag was required and has been appended to the environment.
    Flag(String),
}

impl FlagSearchResult {
    /// The winning flag, if one was needed.
    pub fn flag(&self) -> Option<&str> {
        match self {
            FlagSearchResult::Flag(flag) => Some(flag),
            _ => None,
        }
    }

    /// Whether the capability is available (with or without a flag).
    pub fn is_supported(&self) -> bool {
        !matches!(self, FlagSearchResult::NoFlagFound)
    }
}

impl fmt::Display for FlagSearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagSearchResult::NoFlagNeeded => f.write_str("no-flag-needed"),
            FlagSearchResult::NoFlagFound => f.write_str("no-flag-found"),
            FlagSearchResult::Flag(flag) => write!(f, "flag:{}", flag),
        }
    }
}

/// Which of the environment's flag lists a probe mutates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagKind {
    CFlags,
    CxxFlags,
    LdFlags,
    Libs,
}

/// The mutable compile/link flag lists a probe works against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagEnv {
    pub cflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub ldflags: Vec<String>,
    /// Libraries, without the `-l` prefix
    pub libs: Vec<String>,
}

impl FlagEnv {
    pub fn get(&self, kind: FlagKind) -> &[String] {
        match kind {
            FlagKind::CFlags => &self.cflags,
            FlagKind::CxxFlags => &self.cxxflags,
            FlagKind::LdFlags => &self.ldflags,
            FlagKind::Libs => &self.libs,
        }
    }

    pub fn get_mut(&mut self, kind: FlagKind) -> &mut Vec<String> {
        match kind {
            FlagKind::CFlags => &mut self.cflags,
            FlagKind::CxxFlags => &mut self.cxxflags,
            FlagKind::LdFlags => &mut self.ldflags,
            FlagKind::Libs => &mut self.libs,
        }
    }

    /// Compiler flags used when compiling a `lang` source.
    pub fn compile_flags(&self, lang: Language) -> &[String] {
        match lang {
            Language::C => &self.cflags,
            Language::Cxx => &self.cxxflags,
        }
    }
}

/// The capability a probe needs from the build driver: "does this compile?"
pub trait CompileContext {
    /// Compile `source` (written to a file ending in `extension`) with the
    /// flags in `env`. Returns whether the compiler accepted it.
    fn try_compile(&mut self, env: &FlagEnv, source: &str, extension: &str) -> bool;

    /// Compile and link `source` into an executable.
    fn try_link(&mut self, env: &FlagEnv, source: &str, extension: &str) -> bool;
}

/// Find the flag (if any) needed to compile `test_program`.
///
/// Candidates are appended to the `kind` list one at a time; a failed
/// candidate is removed again before the next is tried, so the list is only
/// ever changed by the single winning flag.
pub fn probe_standard_support(
    ctx: &mut dyn CompileContext,
    env: &mut FlagEnv,
    kind: FlagKind,
    test_program: &str,
    candidate_flags: &[impl AsRef<str>],
    file_extension: &str,
) -> FlagSearchResult {
    search_flags(env, &[kind], candidate_flags, |env| {
        ctx.try_compile(env, test_program, file_extension)
    })
}

/// The fallback search: unchanged flags first, then each candidate.
pub(crate) fn search_flags<F>(
    env: &mut FlagEnv,
    kinds: &[FlagKind],
    candidates: &[impl AsRef<str>],
    mut trial: F,
) -> FlagSearchResult
where
    F: FnMut(&FlagEnv) -> bool,
{
    if trial(env) {
        tracing::debug!("test program accepted without extra flags");
        return FlagSearchResult::NoFlagNeeded;
    }

    search_candidates(env, kinds, candidates, trial)
}

/// Try each candidate in order, appending it to every list in `kinds`.
pub(crate) fn search_candidates<F>(
    env: &mut FlagEnv,
    kinds: &[FlagKind],
    candidates: &[impl AsRef<str>],
    mut trial: F,
) -> FlagSearchResult
where
    F: FnMut(&FlagEnv) -> bool,
{
    for candidate in candidates {
        let candidate = candidate.as_ref();
        let saved: Vec<Vec<String>> = kinds.iter().map(|k| env.get(*k).to_vec()).collect();

        for kind in kinds {
            env.get_mut(*kind).push(candidate.to_string());
        }

        if trial(env) {
            tracing::debug!("`{}` accepted", candidate);
            return FlagSearchResult::Flag(candidate.to_string());
        }

        tracing::debug!("`{}` rejected", candidate);
        for (kind, previous) in kinds.iter().zip(saved) {
            *env.get_mut(*kind) = previous;
        }
    }

    FlagSearchResult::NoFlagFound
}
