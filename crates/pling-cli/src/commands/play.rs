//! Live playing: MIDI input to audio output.

use crate::commands::common::program_manager;
use anyhow::Context;
use clap::Args;
use pling_config::{ControllerFile, Settings};
use pling_io::{AudioOutput, Controller, Dispatcher, MidiThread, OutputConfig, Renderer};
use pling_synth::{RingBuffer, State};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Args)]
pub struct PlayArgs {
    /// Only connect MIDI ports whose name contains this string
    #[arg(short, long)]
    port: Option<String>,

    /// Output device name
    #[arg(short, long)]
    device: Option<String>,

    /// Sample rate
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Buffer size in frames (device default if omitted)
    #[arg(long)]
    buffer_size: Option<u32>,

    /// Controller mapping to use (file name in the controllers directory)
    #[arg(long)]
    controller: Option<String>,
}

pub fn run(args: PlayArgs, settings: &Settings) -> anyhow::Result<()> {
    let sample_rate = args.sample_rate.unwrap_or(settings.sample_rate);
    let port = args.port.or_else(|| settings.midi_port.clone());
    let device = args.device.or_else(|| settings.audio_device.clone());

    let programs = Arc::new(program_manager(settings, sample_rate));
    let state = Arc::new(State::new(settings.master_volume));
    let scope = Arc::new(RingBuffer::default());

    let hwid = args.controller.as_deref().unwrap_or("");
    let controller_file = ControllerFile::find(&settings.search_path(), hwid)
        .context("failed to load controller mapping")?;
    let controller = Controller::from_file(&controller_file);

    let dispatcher = Dispatcher::new(Arc::clone(&programs), Arc::clone(&state), controller);

    let config = OutputConfig {
        sample_rate,
        buffer_size: args.buffer_size,
        device,
    };
    let renderer = Renderer::new(Arc::clone(&programs), Arc::clone(&state), Arc::clone(&scope));
    let output = AudioOutput::start(&config, renderer).context("failed to start audio output")?;

    let mut midi = MidiThread::start(port.as_deref(), dispatcher).context("failed to start MIDI input")?;

    println!("Playing on {} ({} Hz, {} ch)", output.device(), output.sample_rate(), output.channels());
    if midi.ports().is_empty() {
        println!("  No MIDI input connected");
    }
    for name in midi.ports() {
        println!("  MIDI in: {name}");
    }
    println!("\nPress Ctrl+C to stop...\n");

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        println!("\nStopping...");
        r.store(false, Ordering::SeqCst);
    })?;

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    midi.shutdown();
    drop(output);
    println!("Done!");
    Ok(())
}
