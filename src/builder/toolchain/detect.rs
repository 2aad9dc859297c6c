//! Toolchain detection functions.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use which::which;

use crate::util::config::ToolchainConfig;
use crate::util::GlobalContext;

use super::{GccToolchain, MsvcToolchain, Toolchain, ToolchainPlatform};

/// Detect the available toolchain using the context's toolchain config.
pub fn detect_toolchain(ctx: &GlobalContext) -> Result<Box<dyn Toolchain>> {
    detect_toolchain_with(&ctx.toolchain_config())
}

/// Detect the available toolchain.
///
/// Tries to find a C compiler with the following priority:
/// 1. Toolchain config file (`cc`/`cxx`)
/// 2. Environment variables (CC, CXX)
/// 3. On Windows: `cl.exe` from a Developer Command Prompt
/// 4. PATH search for cc/gcc/clang
pub fn detect_toolchain_with(config: &ToolchainConfig) -> Result<Box<dyn Toolchain>> {
    if config.has_compiler_override() {
        if let Some(toolchain) = try_detect_from_config(config)? {
            return Ok(toolchain);
        }
    }

    if let Some(toolchain) = try_detect_msvc() {
        return Ok(toolchain);
    }

    if let Some(toolchain) = try_detect_gcc()? {
        return Ok(toolchain);
    }

    bail!(
        "no C compiler found\n\
         \n\
         Berth probes the host compiler (gcc, clang, or cl).\n\
         Set the CC environment variable, add `cc` to .berth/toolchain.toml,\n\
         or install a compiler."
    )
}

/// Try to create a toolchain from config file settings.
fn try_detect_from_config(config: &ToolchainConfig) -> Result<Option<Box<dyn Toolchain>>> {
    let tc = &config.toolchain;

    let cc = match &tc.cc {
        Some(cc) if cc.exists() || which(cc).is_ok() => cc.clone(),
        Some(cc) => {
            tracing::warn!("Configured C compiler not found: {}", cc.display());
            return Ok(None);
        }
        None => match &tc.cxx {
            // A C++-only override still needs a C driver; derive it from PATH.
            Some(_) => match which("cc").or_else(|_| which("gcc")).or_else(|_| which("clang")) {
                Ok(cc) => cc,
                Err(_) => return Ok(None),
            },
            None => return Ok(None),
        },
    };

    let cxx = tc
        .cxx
        .clone()
        .or_else(|| std::env::var("CXX").ok().map(PathBuf::from))
        .unwrap_or_else(|| GccToolchain::infer_cxx(&cc));

    let family = detect_compiler_family(&cc)?;

    tracing::info!(
        "Using toolchain from config: cc={}, cxx={}",
        cc.display(),
        cxx.display()
    );

    if family == ToolchainPlatform::Msvc {
        return Ok(Some(Box::new(MsvcToolchain::new(cc))));
    }
    Ok(Some(Box::new(GccToolchain::new(cc, cxx, family))))
}

/// Use `cl.exe` when running inside a configured Developer Command Prompt.
#[cfg(target_os = "windows")]
fn try_detect_msvc() -> Option<Box<dyn Toolchain>> {
    if std::env::var("CC").is_ok() {
        return None;
    }
    let cl = which("cl").ok()?;
    if std::env::var("INCLUDE").is_err() || std::env::var("LIB").is_err() {
        tracing::debug!("cl.exe found but INCLUDE/LIB are not set; skipping MSVC");
        return None;
    }
    Some(Box::new(MsvcToolchain::new(cl)))
}

#[cfg(not(target_os = "windows"))]
fn try_detect_msvc() -> Option<Box<dyn Toolchain>> {
    None
}

/// Try to detect GCC/Clang toolchain.
fn try_detect_gcc() -> Result<Option<Box<dyn Toolchain>>> {
    let cc = if let Ok(cc_env) = std::env::var("CC") {
        PathBuf::from(cc_env)
    } else {
        match which("cc").or_else(|_| which("gcc")).or_else(|_| which("clang")) {
            Ok(p) => p,
            Err(_) => return Ok(None),
        }
    };

    let cxx = if let Ok(cxx_env) = std::env::var("CXX") {
        PathBuf::from(cxx_env)
    } else {
        match which("c++").or_else(|_| which("g++")).or_else(|_| which("clang++")) {
            Ok(p) => p,
            Err(_) => GccToolchain::infer_cxx(&cc),
        }
    };

    let family = detect_compiler_family(&cc)?;
    if family == ToolchainPlatform::Msvc {
        return Ok(Some(Box::new(MsvcToolchain::new(cc))));
    }

    tracing::debug!("Detected {} toolchain: cc={}, cxx={}", family, cc.display(), cxx.display());

    Ok(Some(Box::new(GccToolchain::new(cc, cxx, family))))
}

/// Detect whether the compiler is GCC, Clang, Apple Clang or MSVC.
pub fn detect_compiler_family(cc: &Path) -> Result<ToolchainPlatform> {
    let name = cc
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();

    if name == "cl" || name == "clang-cl" {
        return Ok(ToolchainPlatform::Msvc);
    }
    if name.contains("clang") {
        return Ok(detect_clang_variant(cc));
    } else if name.contains("gcc") || name.contains("g++") {
        return Ok(ToolchainPlatform::Gcc);
    }

    // `cc` and friends: ask the compiler itself
    let output = std::process::Command::new(cc).arg("--version").output();

    if let Ok(output) = output {
        let stdout = String::from_utf8_lossy(&output.stdout).to_lowercase();
        if stdout.contains("clang") {
            return Ok(classify_clang_banner(&stdout));
        } else if stdout.contains("gcc") || stdout.contains("free software foundation") {
            return Ok(ToolchainPlatform::Gcc);
        }
    }

    // Default to GCC
    Ok(ToolchainPlatform::Gcc)
}

/// Detect if Clang is Apple Clang or regular Clang.
fn detect_clang_variant(cc: &Path) -> ToolchainPlatform {
    match std::process::Command::new(cc).arg("--version").output() {
        Ok(output) => classify_clang_banner(&String::from_utf8_lossy(&output.stdout).to_lowercase()),
        Err(_) => ToolchainPlatform::Clang,
    }
}

fn classify_clang_banner(banner: &str) -> ToolchainPlatform {
    if banner.contains("apple") {
        ToolchainPlatform::AppleClang
    } else {
        ToolchainPlatform::Clang
    }
}
