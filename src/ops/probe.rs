//! Probing the host compiler.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::builder::probe::{
    check_c99_flags, check_cxx11_flags, check_pthreads, CompileContext, CompilerConfigs, FlagEnv,
    FlagSearchResult, ToolchainContext,
};
use crate::builder::toolchain::{detect_toolchain_with, ToolchainPlatform};
use crate::core::manifest::ProbeSettings;
use crate::util::config::ToolchainSettings;
use crate::util::shell::{Shell, Status};
use crate::util::GlobalContext;

/// Which probes to run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeOptions {
    pub c99: bool,
    pub cxx11: bool,
    pub pthreads: bool,

    /// Skip the advisory checks some compilers run after a standard probe
    pub skip_advisories: bool,
}

impl ProbeOptions {
    /// Every probe.
    pub fn all() -> Self {
        ProbeOptions {
            c99: true,
            cxx11: true,
            pthreads: true,
            skip_advisories: false,
        }
    }

    pub fn from_settings(settings: ProbeSettings) -> Self {
        ProbeOptions {
            c99: settings.c99,
            cxx11: settings.cxx11,
            pthreads: settings.pthreads,
            skip_advisories: false,
        }
    }

    pub fn any(&self) -> bool {
        self.c99 || self.cxx11 || self.pthreads
    }
}

/// Results of a probe run; `None` for probes that were not requested.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub toolchain: ToolchainPlatform,
    pub c99: Option<FlagSearchResult>,
    pub cxx11: Option<FlagSearchResult>,
    pub pthreads: Option<FlagSearchResult>,
    /// The flag lists after every winning flag was appended.
    pub flags: FlagEnv,
}

impl ProbeReport {
    /// Whether every requested probe found a way to succeed.
    pub fn all_supported(&self) -> bool {
        [&self.c99, &self.cxx11, &self.pthreads]
            .into_iter()
            .flatten()
            .all(FlagSearchResult::is_supported)
    }
}

/// The flag lists a probe run starts from.
pub fn initial_flags(settings: &ToolchainSettings) -> FlagEnv {
    FlagEnv {
        cflags: settings.cflags.clone(),
        cxxflags: settings.cxxflags.clone(),
        ldflags: settings.ldflags.clone(),
        libs: Vec::new(),
    }
}

/// Run the requested probes against `ctx`, in C99, C++11, pthreads order.
pub fn run_probes(
    ctx: &mut dyn CompileContext,
    configs: &mut CompilerConfigs,
    mut env: FlagEnv,
    platform: ToolchainPlatform,
    opts: &ProbeOptions,
    shell: &Shell,
) -> Result<ProbeReport> {
    configs.set_advisories(!opts.skip_advisories);

    let mut report = ProbeReport {
        toolchain: platform,
        c99: None,
        cxx11: None,
        pthreads: None,
        flags: FlagEnv::default(),
    };

    if opts.c99 {
        shell.status(Status::Probing, "C99 support");
        let result = check_c99_flags(ctx, &mut env, configs)?;
        tracing::info!("C99: {}", result);
        report.c99 = Some(result);
    }

    if opts.cxx11 {
        shell.status(Status::Probing, "C++11 support");
        let result = check_cxx11_flags(ctx, &mut env, configs)?;
        tracing::info!("C++11: {}", result);
        report.cxx11 = Some(result);
    }

    if opts.pthreads {
        shell.status(Status::Probing, "POSIX threads");
        let result = check_pthreads(ctx, &mut env);
        tracing::info!("pthreads: {}", result);
        report.pthreads = Some(result);
    }

    report.flags = env;
    Ok(report)
}

/// Detect the host toolchain and probe it.
pub fn probe(gctx: &GlobalContext, opts: &ProbeOptions, shell: &Shell) -> Result<ProbeReport> {
    let toolchain_config = gctx.toolchain_config();
    let toolchain = detect_toolchain_with(&toolchain_config)?;
    tracing::debug!("probing {} toolchain", toolchain.platform());

    let mut ctx = ToolchainContext::new(toolchain.as_ref())?;
    let mut configs = CompilerConfigs::new(toolchain.platform());
    let opts = ProbeOptions {
        skip_advisories: opts.skip_advisories || gctx.config().probe.skip_gcc_advisory,
        ..*opts
    };

    let report = run_probes(
        &mut ctx,
        &mut configs,
        initial_flags(&toolchain_config.toolchain),
        toolchain.platform(),
        &opts,
        shell,
    )
    .context("compiler probe failed")?;

    tracing::debug!("{} compiler invocations", ctx.trials());
    Ok(report)
}

/// Human-readable summary of a probe report.
pub fn format_report(report: &ProbeReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "toolchain: {}", report.toolchain);

    for (name, result) in [
        ("c99", &report.c99),
        ("c++11", &report.cxx11),
        ("pthreads", &report.pthreads),
    ] {
        if let Some(result) = result {
            let _ = writeln!(out, "{:>9}: {}", name, result);
        }
    }

    let lists = [
        ("CFLAGS", &report.flags.cflags),
        ("CXXFLAGS", &report.flags.cxxflags),
        ("LDFLAGS", &report.flags.ldflags),
        ("LIBS", &report.flags.libs),
    ];
    for (name, flags) in lists {
        if !flags.is_empty() {
            let _ = writeln!(out, "{:>9}: {}", name, flags.join(" "));
        }
    }

    out
}
