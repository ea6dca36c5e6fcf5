//! pling CLI - play, render and benchmark the pling synthesizer.

mod commands;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pling")]
#[command(author, version, about = "Polyphonic MIDI software synthesizer", long_about = None)]
struct Cli {
    /// Settings file (defaults to config.toml in the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play MIDI input through the audio output until Ctrl+C
    Play(commands::play::PlayArgs),

    /// Measure render time of 32 held notes
    Bench(commands::bench::BenchArgs),

    /// Render a short phrase offline to a WAV file
    Render(commands::render::RenderArgs),

    /// List MIDI input ports and audio output devices
    Ports,

    /// List available engines
    Engines,

    /// Manage patches
    Patch(commands::patch::PatchArgs),
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = commands::common::load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Play(args) => commands::play::run(args, &settings),
        Commands::Bench(args) => commands::bench::run(args, &settings),
        Commands::Render(args) => commands::render::run(args, &settings),
        Commands::Ports => commands::ports::run(),
        Commands::Engines => commands::engines::run(),
        Commands::Patch(args) => commands::patch::run(args, &settings),
    }
}
