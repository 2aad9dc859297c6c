//! `berth extractors` command

use anyhow::Result;

use berth::sources::ExtractorRegistry;

pub fn execute() -> Result<()> {
    let registry = ExtractorRegistry::detect();

    if registry.is_empty() {
        println!("No archive tools found on PATH.");
        return Ok(());
    }

    println!("Extractors (in selection order):");
    println!();
    for descriptor in registry.iter() {
        println!(
            "  {:<8} {:>3}  {:<28} {}",
            descriptor.name,
            descriptor.priority,
            descriptor.suffixes.join(" "),
            descriptor.run
        );
    }

    Ok(())
}
