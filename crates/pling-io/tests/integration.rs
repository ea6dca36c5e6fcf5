//! Integration tests for pling-io.
//!
//! Raw MIDI bytes go through the dispatcher and the MIDI thread, and the
//! renderer pulls the result the way the audio callback does.

use std::sync::Arc;

use crossbeam_channel::bounded;
use pling_config::{ControllerFile, Patch, PatchStore, SearchPath};
use pling_core::CHUNK_SIZE;
use pling_io::{Controller, Dispatcher, MidiThread, Renderer, WavSpec, read_wav, write_wav};
use pling_synth::{ProgramManager, RingBuffer, State};
use tempfile::TempDir;

struct Rig {
    _dir: TempDir,
    programs: Arc<ProgramManager>,
    state: Arc<State>,
    scope: Arc<RingBuffer>,
    renderer: Renderer,
}

fn rig(controller: &str) -> (Rig, Dispatcher) {
    let dir = TempDir::new().unwrap();
    let store = PatchStore::new(SearchPath::new(dir.path().join("local"), dir.path().join("data")));
    store.save(0, 0, &Patch::new("Lead", "Simple")).unwrap();
    store.save(0, 1, &Patch::new("Pluck", "Karplus-Strong")).unwrap();

    let programs = Arc::new(ProgramManager::new(store, 48000.0));
    let state = Arc::new(State::default());
    let scope = Arc::new(RingBuffer::default());
    let controller = Controller::from_file(&ControllerFile::from_toml(controller).unwrap());
    let dispatcher = Dispatcher::new(Arc::clone(&programs), Arc::clone(&state), controller);
    let renderer = Renderer::new(Arc::clone(&programs), Arc::clone(&state), Arc::clone(&scope));
    (
        Rig {
            _dir: dir,
            programs,
            state,
            scope,
            renderer,
        },
        dispatcher,
    )
}

fn pull(renderer: &mut Renderer, frames: usize) -> Vec<f32> {
    let mut buffer = vec![0.0; frames];
    renderer.fill(&mut buffer, 1);
    buffer
}

fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0, |m, s| m.max(s.abs()))
}

// ---------------------------------------------------------------------------
// Dispatcher to renderer
// ---------------------------------------------------------------------------

#[test]
fn note_sounds_then_fades_after_note_off() {
    let (mut rig, mut dispatcher) = rig("");
    dispatcher.handle(&[0x90, 69, 127]);
    let held = pull(&mut rig.renderer, 4800);
    assert!(peak(&held) > 0.01);
    assert!((rig.scope.base_frequency() - 440.0).abs() < 0.01);

    dispatcher.handle(&[0x80, 69, 0]);
    let mut silent = false;
    for _ in 0..2000 {
        if peak(&pull(&mut rig.renderer, CHUNK_SIZE)) == 0.0 {
            silent = true;
            break;
        }
    }
    assert!(silent, "released note never went silent");

    // A silent program leaves the render set and is kept by its channel.
    pull(&mut rig.renderer, CHUNK_SIZE);
    assert_eq!(rig.programs.active_count(), 0);
    assert_eq!(dispatcher.collect_garbage(), 0);
}

#[test]
fn program_change_releases_previous_program() {
    let (mut rig, mut dispatcher) = rig("");
    dispatcher.handle(&[0x90, 60, 100]);
    pull(&mut rig.renderer, 1024);

    dispatcher.handle(&[0xc0, 1]);
    assert_eq!(dispatcher.program(0).name(), "Pluck");

    // The old program drains out of the render set and is then freed.
    let mut freed = 0;
    for _ in 0..4000 {
        pull(&mut rig.renderer, CHUNK_SIZE);
        freed += dispatcher.collect_garbage();
        if freed > 0 {
            break;
        }
    }
    assert_eq!(freed, 1);

    dispatcher.handle(&[0x90, 60, 100]);
    assert!(peak(&pull(&mut rig.renderer, 2048)) > 0.0);
}

#[test]
fn master_fader_scales_output() {
    let (mut rig, mut dispatcher) = rig("[mapping]\n\"cc/7\" = \"fader/master\"\n");
    dispatcher.handle(&[0x90, 57, 127]);
    let loud = peak(&pull(&mut rig.renderer, 2048));

    dispatcher.handle(&[0xb0, 7, 0]);
    assert_eq!(rig.state.master_volume(), 0.0);
    assert_eq!(peak(&pull(&mut rig.renderer, 2048)), 0.0);
    assert!(loud > 0.0);
    assert!(rig.scope.rms() > 0.0, "scope sees the unscaled signal");
}

// ---------------------------------------------------------------------------
// MIDI thread
// ---------------------------------------------------------------------------

#[test]
fn midi_thread_feeds_renderer() {
    let (mut rig, dispatcher) = rig("");
    let (tx, rx) = bounded(64);
    let mut thread = MidiThread::spawn(dispatcher, rx).unwrap();

    tx.send(vec![0x90, 64, 100]).unwrap();
    tx.send(vec![0x90, 67, 100]).unwrap();
    thread.shutdown();

    assert_eq!(rig.state.keys()[64], 100);
    assert_eq!(rig.state.keys()[67], 100);
    assert!(peak(&pull(&mut rig.renderer, 2048)) > 0.0);
}

#[test]
fn midi_thread_stops_when_source_closes() {
    let (_rig, dispatcher) = rig("");
    let (tx, rx) = bounded(1);
    let mut thread = MidiThread::spawn(dispatcher, rx).unwrap();
    drop(tx);
    thread.shutdown();
}

// ---------------------------------------------------------------------------
// Offline render
// ---------------------------------------------------------------------------

#[test]
fn render_to_wav() {
    let (mut rig, mut dispatcher) = rig("");
    dispatcher.handle(&[0x90, 69, 100]);
    let samples = pull(&mut rig.renderer, 48000 / 4);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("note.wav");
    write_wav(&path, &samples, WavSpec::default()).unwrap();

    let (read, spec) = read_wav(&path).unwrap();
    assert_eq!(spec.sample_rate, 48000);
    assert_eq!(read.len(), samples.len());
    assert!(peak(&read) > 0.0);
}
