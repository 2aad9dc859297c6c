//! The checks a build runs: C99, C++11 and POSIX threads.

use crate::core::language::{Language, LanguageStandard};

use super::{
    probe_standard_support, search_candidates, CompileContext, CompilerConfigs, FlagEnv,
    FlagKind, FlagSearchResult, ProbeError,
};

/// Compiler/linker flags that enable threads, in priority order.
pub const PTHREAD_FLAGS: [&str; 2] = ["-pthread", "-pthreads"];

/// Libraries tried when no thread flag works.
pub const PTHREAD_LIBS: [&str; 1] = ["pthread"];

const PTHREAD_TEST_PROGRAM: &str = r#"
#include <pthread.h>

static void* worker(void* arg) {
    return arg;
}

int main(void) {
    pthread_t thread;
    if (pthread_create(&thread, 0, worker, 0) != 0) {
        return 1;
    }
    return pthread_join(thread, 0);
}
"#;

/// Find the flag needed for C99, appending it to `env.cflags`.
pub fn check_c99_flags(
    ctx: &mut dyn CompileContext,
    env: &mut FlagEnv,
    configs: &mut CompilerConfigs,
) -> Result<FlagSearchResult, ProbeError> {
    check_standard(ctx, env, configs, LanguageStandard::C99, FlagKind::CFlags)
}

/// Find the flag needed for C++11, appending it to `env.cxxflags`.
pub fn check_cxx11_flags(
    ctx: &mut dyn CompileContext,
    env: &mut FlagEnv,
    configs: &mut CompilerConfigs,
) -> Result<FlagSearchResult, ProbeError> {
    check_standard(ctx, env, configs, LanguageStandard::Cxx11, FlagKind::CxxFlags)
}

fn check_standard(
    ctx: &mut dyn CompileContext,
    env: &mut FlagEnv,
    configs: &mut CompilerConfigs,
    standard: LanguageStandard,
    kind: FlagKind,
) -> Result<FlagSearchResult, ProbeError> {
    let advise = configs.advisories();
    let language = standard.language();
    let config = configs.get(language)?;

    tracing::debug!("checking {} support with `{}` configuration", standard, config.name());
    let result = probe_standard_support(
        ctx,
        env,
        kind,
        config.test_program(standard),
        config.candidate_flags(standard),
        language.source_extension(),
    );

    if advise {
        if let Some(advisory) = config.diagnose(ctx, env, standard, &result) {
            tracing::warn!("{}", advisory);
        }
    }

    Ok(result)
}

/// Find what a program using POSIX threads needs to link.
///
/// Tries the flags unchanged, then each of [`PTHREAD_FLAGS`] (added to both
/// the compile and link flags), then each of [`PTHREAD_LIBS`]. A library
/// result is reported as `-l<name>`.
pub fn check_pthreads(ctx: &mut dyn CompileContext, env: &mut FlagEnv) -> FlagSearchResult {
    let ext = Language::C.source_extension();

    if ctx.try_link(env, PTHREAD_TEST_PROGRAM, ext) {
        return FlagSearchResult::NoFlagNeeded;
    }

    let both = [FlagKind::CFlags, FlagKind::LdFlags];
    let flag = search_candidates(env, &both, &PTHREAD_FLAGS, |env| {
        ctx.try_link(env, PTHREAD_TEST_PROGRAM, ext)
    });
    if flag != FlagSearchResult::NoFlagFound {
        return flag;
    }

    let lib = search_candidates(env, &[FlagKind::Libs], &PTHREAD_LIBS, |env| {
        ctx.try_link(env, PTHREAD_TEST_PROGRAM, ext)
    });
    match lib {
        FlagSearchResult::Flag(lib) => FlagSearchResult::Flag(format!("-l{}", lib)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::ScriptedContext;
    use super::*;
    use crate::builder::toolchain::ToolchainPlatform;

    #[test]
    fn test_c99_appends_to_cflags_only() {
        let mut ctx = ScriptedContext::new(|env: &FlagEnv, _: &str, _| {
            env.cflags.iter().any(|f| f == "-std=gnu99")
        });
        let mut env = FlagEnv::default();
        let mut configs = CompilerConfigs::new(ToolchainPlatform::Gcc);

        let result = check_c99_flags(&mut ctx, &mut env, &mut configs).unwrap();

        assert_eq!(result.flag(), Some("-std=gnu99"));
        assert_eq!(env.cflags, vec!["-std=gnu99"]);
        assert!(env.cxxflags.is_empty());
    }

    #[test]
    fn test_cxx11_on_old_gcc_needs_gnu0x() {
        let mut ctx = ScriptedContext::new(|env: &FlagEnv, _: &str, _| {
            env.cxxflags.iter().any(|f| f == "-std=gnu++0x")
        });
        let mut env = FlagEnv::default();
        let mut configs = CompilerConfigs::new(ToolchainPlatform::Gcc);

        let result = check_cxx11_flags(&mut ctx, &mut env, &mut configs).unwrap();

        assert_eq!(result, FlagSearchResult::Flag("-std=gnu++0x".into()));
        assert_eq!(env.cxxflags, vec!["-std=gnu++0x"]);
        // unchanged + four candidates; a gnu flag triggers no advisory compile
        assert_eq!(ctx.compiles.len(), 5);
    }

    #[test]
    fn test_cxx11_default_config_gives_up_after_two() {
        let mut ctx = ScriptedContext::new(|_: &FlagEnv, _: &str, _| false);
        let mut env = FlagEnv::default();
        let mut configs = CompilerConfigs::new(ToolchainPlatform::Clang);

        let result = check_cxx11_flags(&mut ctx, &mut env, &mut configs).unwrap();

        assert_eq!(result, FlagSearchResult::NoFlagFound);
        assert!(env.cxxflags.is_empty());
        assert_eq!(ctx.compiles.len(), 3);
    }

    #[test]
    fn test_strict_flag_runs_advisory_without_changing_result() {
        let mut ctx = ScriptedContext::new(|env: &FlagEnv, source: &str, _| {
            !env.cxxflags.is_empty() && !source.contains("strdup")
        });
        let mut env = FlagEnv::default();
        let mut configs = CompilerConfigs::new(ToolchainPlatform::Gcc);

        let result = check_cxx11_flags(&mut ctx, &mut env, &mut configs).unwrap();

        assert_eq!(result.flag(), Some("-std=c++11"));
        assert_eq!(env.cxxflags, vec!["-std=c++11"]);
        assert_eq!(ctx.compiles.len(), 3);
    }

    #[test]
    fn test_advisories_can_be_disabled() {
        let mut ctx =
            ScriptedContext::new(|env: &FlagEnv, _: &str, _| !env.cxxflags.is_empty());
        let mut env = FlagEnv::default();
        let mut configs = CompilerConfigs::new(ToolchainPlatform::Gcc);
        configs.set_advisories(false);

        check_cxx11_flags(&mut ctx, &mut env, &mut configs).unwrap();

        assert_eq!(ctx.compiles.len(), 2);
    }

    #[test]
    fn test_pthreads_no_flag_needed() {
        let mut ctx = ScriptedContext::new(|_: &FlagEnv, _: &str, link| link);
        let mut env = FlagEnv::default();

        assert_eq!(check_pthreads(&mut ctx, &mut env), FlagSearchResult::NoFlagNeeded);
        assert_eq!(env, FlagEnv::default());
    }

    #[test]
    fn test_pthreads_flag_goes_to_compile_and_link() {
        let mut ctx = ScriptedContext::new(|env: &FlagEnv, _: &str, _| {
            env.ldflags == ["-pthread"] && env.cflags == ["-pthread"]
        });
        let mut env = FlagEnv::default();

        assert_eq!(check_pthreads(&mut ctx, &mut env).flag(), Some("-pthread"));
        assert_eq!(env.ldflags, vec!["-pthread"]);
        assert!(env.libs.is_empty());
    }

    #[test]
    fn test_pthreads_falls_back_to_library() {
        let mut ctx =
            ScriptedContext::new(|env: &FlagEnv, _: &str, _| env.libs == ["pthread"]);
        let mut env = FlagEnv::default();

        assert_eq!(
            check_pthreads(&mut ctx, &mut env),
            FlagSearchResult::Flag("-lpthread".into())
        );
        assert_eq!(env.libs, vec!["pthread"]);
        assert!(env.cflags.is_empty());
        assert!(env.ldflags.is_empty());
        assert_eq!(ctx.links.len(), 4);
    }
}
