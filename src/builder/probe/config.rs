//! Per-compiler probe configuration.
//!
//! Each compiler family gets a configuration describing which flags to try
//! for each language standard and which program proves the standard works.
//! A build keeps exactly one configuration per language role, created on
//! first use and reused for every later probe.

use std::fmt;

use thiserror::Error;

use crate::builder::toolchain::ToolchainPlatform;
use crate::core::language::{Language, LanguageStandard};

use super::{CompileContext, FlagEnv, FlagSearchResult};

/// Errors raised while setting up probe configurations.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// A configuration was built or installed incorrectly.
    #[error("invalid compiler configuration `{config}`: {reason}")]
    ConfigurationMisuse { config: String, reason: String },
}

/// Exercises C99 features a pre-C99 compiler rejects: mixed declarations,
/// `for`-scope variables, `//` comments, `_Bool` and variable length arrays.
pub const C99_TEST_PROGRAM: &str = r#"
#include <stdbool.h>
#include <stdint.h>

static int sum(int n) {
    int values[n];
    int total = 0;
    for (int i = 0; i < n; i++) {
        values[i] = i; // single-line comment
        total += values[i];
    }
    return total;
}

int main(void) {
    bool ok = true;
    int64_t big = 1;
    int result = sum(4);
    return (ok && big && result == 6) ? 0 : 1;
}
"#;

/// Exercises C++11 language features: `auto`, lambdas, range-for,
/// `nullptr`, `constexpr`, rvalue references and `static_assert`.
pub const CXX11_TEST_PROGRAM: &str = r#"
#include <utility>
#include <vector>

constexpr int square(int x) { return x * x; }

struct Holder {
    std::vector<int> items;
    Holder() = default;
    Holder(Holder&& other) noexcept : items(std::move(other.items)) {}
};

int main() {
    static_assert(square(3) == 9, "constexpr");
    std::vector<int> values{1, 2, 3};
    auto total = 0;
    for (auto v : values) {
        total += v;
    }
    auto twice = [](int v) { return v * 2; };
    int* nothing = nullptr;
    Holder a;
    Holder b(std::move(a));
    return (twice(total) == 12 && nothing == nullptr && b.items.empty()) ? 0 : 1;
}
"#;

/// Compiled after a strict C++ mode wins on GCC. Some C libraries hide
/// POSIX declarations such as `fileno` and `strdup` under `-std=c++11`.
pub const STRICT_HEADERS_PROGRAM: &str = r#"
#include <stdio.h>
#include <string.h>

int main() {
    char* copy = strdup("berth");
    return fileno(stdin) + (copy != 0 ? 0 : 1);
}
"#;

/// Probe configuration for one compiler family.
pub trait CompilerConfiguration: fmt::Debug {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Flags to try, in priority order, to enable `standard`.
    fn candidate_flags(&self, standard: LanguageStandard) -> &[String];

    /// A program that only compiles when `standard` is enabled.
    fn test_program(&self, standard: LanguageStandard) -> &str {
        match standard {
            LanguageStandard::C99 => C99_TEST_PROGRAM,
            LanguageStandard::Cxx11 => CXX11_TEST_PROGRAM,
        }
    }

    /// Inspect a finished probe and return an advisory, if any.
    ///
    /// Never changes `env` or the probe result.
    fn diagnose(
        &self,
        _ctx: &mut dyn CompileContext,
        _env: &FlagEnv,
        _standard: LanguageStandard,
        _result: &FlagSearchResult,
    ) -> Option<String> {
        None
    }
}

fn flags(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Configuration for compilers with no special knowledge.
#[derive(Debug, Clone)]
pub struct DefaultConfiguration {
    c99: Vec<String>,
    cxx11: Vec<String>,
}

impl Default for DefaultConfiguration {
    fn default() -> Self {
        DefaultConfiguration {
            c99: flags(&["-std=c99", "-std=gnu99"]),
            cxx11: flags(&["-std=c++11", "-std=gnu++11"]),
        }
    }
}

impl CompilerConfiguration for DefaultConfiguration {
    fn name(&self) -> &str {
        "default"
    }

    fn candidate_flags(&self, standard: LanguageStandard) -> &[String] {
        match standard {
            LanguageStandard::C99 => &self.c99,
            LanguageStandard::Cxx11 => &self.cxx11,
        }
    }
}

/// GCC: also knows the pre-release `c++0x` spellings older releases need.
#[derive(Debug, Clone)]
pub struct GccConfiguration {
    c99: Vec<String>,
    cxx11: Vec<String>,
}

impl Default for GccConfiguration {
    fn default() -> Self {
        GccConfiguration {
            c99: flags(&["-std=c99", "-std=gnu99"]),
            cxx11: flags(&["-std=c++11", "-std=gnu++11", "-std=c++0x", "-std=gnu++0x"]),
        }
    }
}

impl CompilerConfiguration for GccConfiguration {
    fn name(&self) -> &str {
        "gcc"
    }

    fn candidate_flags(&self, standard: LanguageStandard) -> &[String] {
        match standard {
            LanguageStandard::C99 => &self.c99,
            LanguageStandard::Cxx11 => &self.cxx11,
        }
    }

    fn diagnose(
        &self,
        ctx: &mut dyn CompileContext,
        env: &FlagEnv,
        standard: LanguageStandard,
        result: &FlagSearchResult,
    ) -> Option<String> {
        if standard != LanguageStandard::Cxx11 {
            return None;
        }
        let flag = result.flag()?;
        if flag.contains("gnu") {
            return None;
        }

        let ext = Language::Cxx.source_extension();
        if ctx.try_compile(env, STRICT_HEADERS_PROGRAM, ext) {
            return None;
        }

        Some(format!(
            "`{}` hides POSIX declarations (fileno, strdup) in this platform's C headers; \
             code using them may need `-std=gnu++11` or `-D_GNU_SOURCE`",
            flag
        ))
    }
}

/// Check that a configuration can actually drive a probe.
pub fn validate_configuration(config: &dyn CompilerConfiguration) -> Result<(), ProbeError> {
    for standard in [LanguageStandard::C99, LanguageStandard::Cxx11] {
        let misuse = |reason: String| ProbeError::ConfigurationMisuse {
            config: config.name().to_string(),
            reason,
        };

        let candidates = config.candidate_flags(standard);
        if candidates.is_empty() {
            return Err(misuse(format!("no candidate flags for {}", standard)));
        }
        if candidates.iter().any(|f| f.trim().is_empty()) {
            return Err(misuse(format!("empty candidate flag for {}", standard)));
        }
        if config.test_program(standard).trim().is_empty() {
            return Err(misuse(format!("empty test program for {}", standard)));
        }
    }
    Ok(())
}

/// The configuration a compiler family uses.
fn configuration_for(family: ToolchainPlatform) -> Box<dyn CompilerConfiguration> {
    match family {
        ToolchainPlatform::Gcc => Box::new(GccConfiguration::default()),
        _ => Box::new(DefaultConfiguration::default()),
    }
}

/// One configuration per language role, created on first access.
///
/// Owned by the build driver so every probe in a run sees the same
/// configuration for a role.
#[derive(Debug)]
pub struct CompilerConfigs {
    c_family: ToolchainPlatform,
    cxx_family: ToolchainPlatform,
    c: Option<Box<dyn CompilerConfiguration>>,
    cxx: Option<Box<dyn CompilerConfiguration>>,
    advisories: bool,
}

impl CompilerConfigs {
    /// Configurations for a toolchain whose C and C++ drivers share a family.
    pub fn new(family: ToolchainPlatform) -> Self {
        Self::with_families(family, family)
    }

    pub fn with_families(c_family: ToolchainPlatform, cxx_family: ToolchainPlatform) -> Self {
        CompilerConfigs {
            c_family,
            cxx_family,
            c: None,
            cxx: None,
            advisories: true,
        }
    }

    /// Enable or disable post-probe advisories.
    pub fn set_advisories(&mut self, enabled: bool) {
        self.advisories = enabled;
    }

    pub fn advisories(&self) -> bool {
        self.advisories
    }

    fn slot(
        &mut self,
        role: Language,
    ) -> (&mut Option<Box<dyn CompilerConfiguration>>, ToolchainPlatform) {
        match role {
            Language::C => (&mut self.c, self.c_family),
            Language::Cxx => (&mut self.cxx, self.cxx_family),
        }
    }

    /// The configuration for `role`, creating it on first use.
    pub fn get(&mut self, role: Language) -> Result<&dyn CompilerConfiguration, ProbeError> {
        let (slot, family) = self.slot(role);
        if slot.is_none() {
            let config = configuration_for(family);
            validate_configuration(config.as_ref())?;
            tracing::debug!("using `{}` probe configuration for {}", config.name(), role);
            *slot = Some(config);
        }

        slot.as_deref().ok_or_else(|| ProbeError::ConfigurationMisuse {
            config: role.to_string(),
            reason: "configuration missing after initialization".to_string(),
        })
    }

    /// Install a custom configuration for `role`.
    ///
    /// Fails if the role already has one; a role is only ever written once.
    pub fn install(
        &mut self,
        role: Language,
        config: Box<dyn CompilerConfiguration>,
    ) -> Result<(), ProbeError> {
        validate_configuration(config.as_ref())?;
        let (slot, _) = self.slot(role);
        if let Some(existing) = slot {
            return Err(ProbeError::ConfigurationMisuse {
                config: config.name().to_string(),
                reason: format!("{} already uses `{}`", role, existing.name()),
            });
        }
        *slot = Some(config);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::ScriptedContext;
    use super::*;

    #[derive(Debug)]
    struct NoFlags;

    impl CompilerConfiguration for NoFlags {
        fn name(&self) -> &str {
            "no-flags"
        }

        fn candidate_flags(&self, _standard: LanguageStandard) -> &[String] {
            &[]
        }
    }

    #[test]
    fn test_gcc_candidates() {
        let gcc = GccConfiguration::default();
        assert_eq!(gcc.candidate_flags(LanguageStandard::C99), ["-std=c99", "-std=gnu99"]);
        assert_eq!(
            gcc.candidate_flags(LanguageStandard::Cxx11),
            ["-std=c++11", "-std=gnu++11", "-std=c++0x", "-std=gnu++0x"]
        );

        let default = DefaultConfiguration::default();
        assert_eq!(
            default.candidate_flags(LanguageStandard::Cxx11),
            ["-std=c++11", "-std=gnu++11"]
        );
    }

    #[test]
    fn test_get_returns_same_instance() {
        let mut configs = CompilerConfigs::new(ToolchainPlatform::Gcc);

        let first = configs.get(Language::Cxx).unwrap() as *const _ as *const u8;
        let second = configs.get(Language::Cxx).unwrap() as *const _ as *const u8;
        assert_eq!(first, second);
        assert_eq!(configs.get(Language::Cxx).unwrap().name(), "gcc");
    }

    #[test]
    fn test_family_selects_configuration() {
        let mut configs =
            CompilerConfigs::with_families(ToolchainPlatform::Clang, ToolchainPlatform::Gcc);
        assert_eq!(configs.get(Language::C).unwrap().name(), "default");
        assert_eq!(configs.get(Language::Cxx).unwrap().name(), "gcc");
    }

    #[test]
    fn test_invalid_configuration_rejected() {
        let err = validate_configuration(&NoFlags).unwrap_err();
        assert!(err.to_string().contains("no candidate flags"));

        let mut configs = CompilerConfigs::new(ToolchainPlatform::Gcc);
        assert!(configs.install(Language::C, Box::new(NoFlags)).is_err());
    }

    #[test]
    fn test_install_twice_is_misuse() {
        let mut configs = CompilerConfigs::new(ToolchainPlatform::Clang);
        configs
            .install(Language::C, Box::new(GccConfiguration::default()))
            .unwrap();
        let err = configs
            .install(Language::C, Box::new(DefaultConfiguration::default()))
            .unwrap_err();
        assert!(err.to_string().contains("already uses `gcc`"));
        assert_eq!(configs.get(Language::C).unwrap().name(), "gcc");
    }

    #[test]
    fn test_gcc_advisory_only_for_strict_cxx_flag() {
        let gcc = GccConfiguration::default();
        let env = FlagEnv::default();
        let mut headers_broken = ScriptedContext::new(|_: &FlagEnv, _: &str, _| false);

        let strict = FlagSearchResult::Flag("-std=c++11".into());
        let advisory = gcc.diagnose(&mut headers_broken, &env, LanguageStandard::Cxx11, &strict);
        assert!(advisory.unwrap().contains("fileno"));

        let gnu = FlagSearchResult::Flag("-std=gnu++11".into());
        assert!(gcc
            .diagnose(&mut headers_broken, &env, LanguageStandard::Cxx11, &gnu)
            .is_none());
        let none = FlagSearchResult::NoFlagNeeded;
        assert!(gcc
            .diagnose(&mut headers_broken, &env, LanguageStandard::Cxx11, &none)
            .is_none());
        // only the first call reached the compiler
        assert_eq!(headers_broken.compiles.len(), 1);

        let mut headers_fine = ScriptedContext::new(|_: &FlagEnv, _: &str, _| true);
        assert!(gcc
            .diagnose(&mut headers_fine, &env, LanguageStandard::Cxx11, &strict)
            .is_none());
    }
}
