//! Render-time benchmark of a full program.

use crate::commands::common::{parse_bank, program_manager};
use clap::Args;
use pling_config::Settings;
use pling_core::{CHUNK_SIZE, Chunk};
use pling_synth::{ProgramEvent, ProgramManager};
use std::time::{Duration, Instant};

/// Notes held during the benchmark.
const NOTES: u8 = 32;

/// Chunks rendered before measuring.
const WARM_UP_CHUNKS: usize = 100;

#[derive(Args)]
pub struct BenchArgs {
    /// Program number
    #[arg(short, long, default_value = "0")]
    program: u8,

    /// Bank number or LSB:MSB pair
    #[arg(short, long, default_value = "0", value_parser = parse_bank)]
    bank: (u8, u8),

    /// Chunks to measure
    #[arg(short, long, default_value = "10000")]
    chunks: usize,

    /// Sample rate
    #[arg(long)]
    sample_rate: Option<u32>,
}

/// Measured render time.
struct BenchResult {
    elapsed: Duration,
    chunks: usize,
    sample_rate: u32,
}

impl BenchResult {
    fn per_chunk(&self) -> Duration {
        self.elapsed / self.chunks.max(1) as u32
    }

    /// Audio time rendered per unit of wall time.
    fn realtime_factor(&self) -> f64 {
        let audio = (self.chunks * CHUNK_SIZE) as f64 / f64::from(self.sample_rate);
        audio / self.elapsed.as_secs_f64().max(f64::EPSILON)
    }
}

fn measure(programs: &ProgramManager, chunks: usize, sample_rate: u32) -> BenchResult {
    let mut chunk = Chunk::new();
    for _ in 0..WARM_UP_CHUNKS {
        programs.render(&mut chunk);
    }

    let start = Instant::now();
    for _ in 0..chunks {
        programs.render(&mut chunk);
    }
    BenchResult {
        elapsed: start.elapsed(),
        chunks,
        sample_rate,
    }
}

pub fn run(args: BenchArgs, settings: &Settings) -> anyhow::Result<()> {
    let sample_rate = args.sample_rate.unwrap_or(settings.sample_rate);
    let programs = program_manager(settings, sample_rate);

    let slot = programs.open_slot();
    let (lsb, msb) = args.bank;
    programs.change(&slot, args.program, lsb, msb);
    let program = slot.load_full();

    for i in 0..NOTES {
        programs.dispatch(&program, ProgramEvent::NoteOn { key: 36 + i, velocity: 100 });
    }
    programs.activate(&program);

    println!(
        "Benchmarking '{}' ({}) with {} notes",
        program.name(),
        program.engine_name(),
        NOTES
    );

    let result = measure(&programs, args.chunks, sample_rate);

    println!("  Chunks:      {} x {} samples", result.chunks, CHUNK_SIZE);
    println!("  Total:       {:.3}s", result.elapsed.as_secs_f64());
    println!("  Per chunk:   {:.2}us", result.per_chunk().as_secs_f64() * 1e6);
    println!("  Realtime:    {:.1}x", result.realtime_factor());
    Ok(())
}
