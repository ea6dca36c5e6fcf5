//! Patch management.

use crate::commands::common::parse_bank;
use anyhow::Context;
use clap::{Args, Subcommand};
use pling_config::{Patch, PatchStore, Settings, bank_number};
use pling_synth::EngineRegistry;

#[derive(Args)]
pub struct PatchArgs {
    #[command(subcommand)]
    command: PatchCommand,
}

#[derive(Subcommand)]
enum PatchCommand {
    /// Write an engine's default patch to the local patch directory
    Init {
        /// Engine name
        engine: String,

        /// Bank number or LSB:MSB pair
        #[arg(value_parser = parse_bank)]
        bank: (u8, u8),

        /// Program number (0-127)
        #[arg(value_parser = clap::value_parser!(u8).range(0..128))]
        program: u8,

        /// Patch name (defaults to the engine name)
        #[arg(short, long)]
        name: Option<String>,

        /// Replace an existing local patch
        #[arg(short, long)]
        force: bool,
    },

    /// Show the patch a program change would load
    Show {
        /// Bank number or LSB:MSB pair
        #[arg(value_parser = parse_bank)]
        bank: (u8, u8),

        /// Program number (0-127)
        #[arg(value_parser = clap::value_parser!(u8).range(0..128))]
        program: u8,
    },
}

pub fn run(args: PatchArgs, settings: &Settings) -> anyhow::Result<()> {
    let store = PatchStore::new(settings.search_path());

    match args.command {
        PatchCommand::Init {
            engine,
            bank: (lsb, msb),
            program,
            name,
            force,
        } => {
            let registry = EngineRegistry::new();
            let Some(defaults) = registry.create(&engine, settings.sample_rate as f32) else {
                let names: Vec<_> = registry.all_engines().iter().map(|e| e.name).collect();
                anyhow::bail!("Unknown engine '{}'. Available: {}", engine, names.join(", "));
            };

            let bank = bank_number(lsb, msb);
            let existing = store
                .search_path()
                .local_dir()
                .join(PatchStore::relative_path(bank, program));
            if existing.exists() && !force {
                anyhow::bail!("{} already exists (use --force to replace it)", existing.display());
            }

            let patch = Patch::new(name.unwrap_or_else(|| engine.clone()), defaults.engine_name())
                .with_parameters(defaults.save());
            let path = store
                .save(bank, program, &patch)
                .with_context(|| format!("failed to save patch {bank}/{program}"))?;
            println!("Wrote {} patch '{}' to {}", patch.engine, patch.name, path.display());
        }

        PatchCommand::Show { bank: (lsb, msb), program } => {
            let bank = bank_number(lsb, msb);
            let path = store
                .search_path()
                .find(PatchStore::relative_path(bank, program))
                .with_context(|| format!("no patch for bank {bank} program {program}"))?;
            let patch = Patch::load(&path)?;
            println!("# {}", path.display());
            print!("{}", patch.to_toml()?);
        }
    }

    Ok(())
}
