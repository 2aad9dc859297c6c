//! `berth toolchain` command

use anyhow::Result;

use berth::builder::toolchain::detect_toolchain;
use berth::core::language::Language;
use berth::util::process::ProcessBuilder;
use berth::util::GlobalContext;

pub fn execute() -> Result<()> {
    let ctx = GlobalContext::new()?;
    let toolchain = detect_toolchain(&ctx)?;

    println!("Toolchain: {}", toolchain.platform());
    println!();

    for (label, lang) in [("CC", Language::C), ("CXX", Language::Cxx)] {
        let path = toolchain.compiler_path(lang);
        println!("  {:<4} {}", format!("{}:", label), path.display());

        let output = ProcessBuilder::new(path).arg("--version").exec_and_check();
        if let Ok(output) = output {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if let Some(first_line) = stdout.lines().next() {
                println!("       {}", first_line.trim());
            }
        }
    }

    let settings = ctx.toolchain_config().toolchain;
    let seeded = [
        ("CFLAGS", &settings.cflags),
        ("CXXFLAGS", &settings.cxxflags),
        ("LDFLAGS", &settings.ldflags),
    ];
    if seeded.iter().any(|(_, flags)| !flags.is_empty()) {
        println!();
        println!("Configured flags:");
        for (name, flags) in seeded {
            if !flags.is_empty() {
                println!("  {}={}", name, flags.join(" "));
            }
        }
    }

    Ok(())
}
