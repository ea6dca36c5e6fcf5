//! Engine listing.

use pling_synth::EngineRegistry;

pub fn run() -> anyhow::Result<()> {
    let registry = EngineRegistry::new();

    println!("Available Engines");
    println!("=================\n");
    for engine in registry.all_engines() {
        println!("  {:<16} {}", engine.name, engine.description);
    }
    println!();
    println!("Write an engine's default patch with:");
    println!("  pling patch init <ENGINE> <BANK> <PROGRAM>");
    Ok(())
}
