//! Offline rendering to a WAV file.

use anyhow::Context;
use clap::Args;
use pling_config::{Patch, Settings};
use pling_core::{CHUNK_SIZE, Chunk};
use pling_io::{OUTPUT_GAIN, WavSpec, write_wav};
use pling_synth::{EngineRegistry, Program};
use std::path::PathBuf;

/// Keys of the rendered arpeggio.
const PHRASE: [u8; 4] = [48, 52, 55, 60];

#[derive(Args)]
pub struct RenderArgs {
    /// Engine name (see `pling engines`)
    engine: String,

    /// Output WAV file
    output: PathBuf,

    /// Patch file with the engine parameters
    #[arg(short, long)]
    patch: Option<PathBuf>,

    /// Seconds between notes of the arpeggio
    #[arg(long, default_value = "0.25")]
    step: f32,

    /// Seconds the full chord is held after the last note
    #[arg(long, default_value = "1.0")]
    hold: f32,

    /// Longest release tail in seconds
    #[arg(long, default_value = "4.0")]
    tail: f32,

    /// Note velocity
    #[arg(long, default_value = "100")]
    velocity: u8,

    /// Sample rate
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Bit depth (16, 24, or 32 for float)
    #[arg(long, default_value = "32")]
    bit_depth: u16,
}

fn seconds_to_chunks(seconds: f32, sample_rate: u32) -> usize {
    (seconds.max(0.0) * sample_rate as f32 / CHUNK_SIZE as f32).ceil() as usize
}

/// Play the arpeggio, hold the chord, then release and render until silent
/// or the tail runs out.
fn render_phrase(program: &mut dyn Program, args: &RenderArgs, sample_rate: u32) -> Vec<f32> {
    let step = seconds_to_chunks(args.step, sample_rate).max(1);
    let hold = seconds_to_chunks(args.hold, sample_rate);
    let tail = seconds_to_chunks(args.tail, sample_rate);
    let velocity = args.velocity.clamp(1, 127);

    let mut samples = Vec::new();
    let mut chunk = Chunk::new();
    let mut render = |program: &mut dyn Program| {
        chunk.clear();
        let sounding = program.render(&mut chunk);
        chunk.scale_and_clamp(OUTPUT_GAIN);
        samples.extend_from_slice(chunk.as_slice());
        sounding
    };

    for key in PHRASE {
        program.note_on(key, velocity);
        for _ in 0..step {
            render(&mut *program);
        }
    }
    for _ in 0..hold {
        render(&mut *program);
    }

    for key in PHRASE {
        program.note_off(key, 0);
    }
    for _ in 0..tail {
        if !render(&mut *program) {
            break;
        }
    }
    samples
}

pub fn run(args: RenderArgs, settings: &Settings) -> anyhow::Result<()> {
    let sample_rate = args.sample_rate.unwrap_or(settings.sample_rate);
    let registry = EngineRegistry::new();

    let parameters = match &args.patch {
        Some(path) => {
            let patch = Patch::load(path).with_context(|| format!("failed to load patch {}", path.display()))?;
            if patch.engine != args.engine {
                tracing::warn!(patch = %patch.engine, engine = %args.engine, "patch is for a different engine");
            }
            patch.parameters
        }
        None => toml::Table::new(),
    };

    let mut program = registry
        .build(&args.engine, sample_rate as f32, &parameters)
        .with_context(|| format!("cannot render '{}'", args.engine))?;

    let samples = render_phrase(program.as_mut(), &args, sample_rate);

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: args.bit_depth,
    };
    write_wav(&args.output, &samples, spec)?;

    println!(
        "Rendered {} notes of {} ({:.2}s) to {}",
        PHRASE.len(),
        args.engine,
        samples.len() as f32 / sample_rate as f32,
        args.output.display()
    );
    Ok(())
}
