//! Real-time audio output via cpal.

use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, Stream};
use pling_core::{CHUNK_SIZE, Chunk};
use pling_synth::{ProgramManager, RingBuffer, State};
use std::sync::Arc;

/// Where the scope looks for a zero crossing, relative to the end of the
/// chunk just rendered.
pub const SCOPE_OFFSET: f32 = -384.0;

/// Headroom for several voices summing into one output.
pub const OUTPUT_GAIN: f32 = 0.25;

/// Extract device name via `description()` (cpal 0.17+).
fn device_name(device: &Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

/// Audio output device information.
#[derive(Debug, Clone)]
pub struct AudioDevice {
    /// Human-readable device name.
    pub name: String,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
    /// Default channel count.
    pub channels: u16,
}

impl AudioDevice {
    fn from_device(device: &Device) -> Option<Self> {
        let name = device_name(device).ok()?;
        let (default_sample_rate, channels) = device
            .default_output_config()
            .map_or((48000, 2), |c| (c.sample_rate(), c.channels()));
        Some(Self {
            name,
            default_sample_rate,
            channels,
        })
    }
}

/// List all audio output devices.
pub fn list_devices() -> Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| Error::StreamConfig(e.to_string()))?;
    Ok(devices.filter_map(|d| AudioDevice::from_device(&d)).collect())
}

/// The default output device, if any.
pub fn default_device() -> Option<AudioDevice> {
    cpal::default_host()
        .default_output_device()
        .and_then(|d| AudioDevice::from_device(&d))
}

/// Find an output device whose name contains `search` (case-insensitive),
/// or the default device.
fn find_output_device(host: &Host, search: Option<&str>) -> Result<Device> {
    let Some(search) = search else {
        return host.default_output_device().ok_or(Error::NoDevice);
    };

    let search_lower = search.to_lowercase();
    let devices = host
        .output_devices()
        .map_err(|e| Error::StreamConfig(e.to_string()))?;

    for device in devices {
        if let Ok(name) = device_name(&device)
            && name.to_lowercase().contains(&search_lower)
        {
            return Ok(device);
        }
    }
    Err(Error::DeviceNotFound(format!("no output device matching '{search}'")))
}

/// Renders the program manager into device buffers of any size.
///
/// Owned by the audio callback. Each chunk goes to the scope unscaled, then
/// is scaled by the master volume and clamped before it reaches the device.
pub struct Renderer {
    programs: Arc<ProgramManager>,
    state: Arc<State>,
    scope: Arc<RingBuffer>,
    chunk: Chunk,
    position: usize,
}

impl Renderer {
    /// Create a renderer; the first [`Renderer::fill`] renders a new chunk.
    pub fn new(programs: Arc<ProgramManager>, state: Arc<State>, scope: Arc<RingBuffer>) -> Self {
        Self {
            programs,
            state,
            scope,
            chunk: Chunk::new(),
            position: CHUNK_SIZE,
        }
    }

    /// Render the next chunk.
    pub fn render_chunk(&mut self) -> &Chunk {
        self.programs.render(&mut self.chunk);
        self.scope.add(
            &self.chunk,
            self.programs.zero_crossing(SCOPE_OFFSET),
            self.programs.base_frequency(),
        );
        self.chunk
            .scale_and_clamp(self.state.master_volume() * OUTPUT_GAIN);
        self.position = 0;
        &self.chunk
    }

    /// Fill an interleaved buffer, copying the mono signal to every channel.
    pub fn fill(&mut self, data: &mut [f32], channels: usize) {
        for frame in data.chunks_mut(channels.max(1)) {
            if self.position == CHUNK_SIZE {
                self.render_chunk();
            }
            frame.fill(self.chunk[self.position]);
            self.position += 1;
        }
    }
}

/// Output stream configuration.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Buffer size in frames; the device default when `None`.
    pub buffer_size: Option<u32>,
    /// Output device name filter (uses default if `None`).
    pub device: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            buffer_size: None,
            device: None,
        }
    }
}

/// A running output stream. Audio stops when it is dropped.
pub struct AudioOutput {
    _stream: Stream,
    device: String,
    sample_rate: u32,
    channels: u16,
}

impl AudioOutput {
    /// Open the output device and start pulling audio from `renderer`.
    pub fn start(config: &OutputConfig, mut renderer: Renderer) -> Result<Self> {
        let host = cpal::default_host();
        let device = find_output_device(&host, config.device.as_deref())?;
        let name = device_name(&device).unwrap_or_else(|_| "unknown".to_string());

        let channels = device
            .default_output_config()
            .map_err(|e| Error::StreamConfig(e.to_string()))?
            .channels();

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: config.sample_rate,
            buffer_size: config
                .buffer_size
                .map_or(cpal::BufferSize::Default, cpal::BufferSize::Fixed),
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    renderer.fill(data, usize::from(channels));
                },
                |err| tracing::error!(%err, "output stream error"),
                None,
            )
            .map_err(|e| Error::BuildStream(e.to_string()))?;

        stream.play().map_err(|e| Error::PlayStream(e.to_string()))?;
        tracing::info!(
            device = %name,
            channels,
            sample_rate = config.sample_rate,
            "output stream started"
        );

        Ok(Self {
            _stream: stream,
            device: name,
            sample_rate: config.sample_rate,
            channels,
        })
    }

    /// Name of the output device.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Stream sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Output channel count.
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pling_config::{Patch, PatchStore, SearchPath};
    use pling_synth::ProgramEvent;
    use tempfile::TempDir;

    fn renderer_with(engine: &str) -> (TempDir, Arc<ProgramManager>, Arc<State>, Arc<RingBuffer>, Renderer) {
        let dir = TempDir::new().unwrap();
        let store = PatchStore::new(SearchPath::new(dir.path().join("local"), dir.path().join("data")));
        store.save(0, 0, &Patch::new("Test", engine)).unwrap();

        let programs = Arc::new(ProgramManager::new(store, 48000.0));
        let state = Arc::new(State::default());
        let scope = Arc::new(RingBuffer::default());
        let renderer = Renderer::new(Arc::clone(&programs), Arc::clone(&state), Arc::clone(&scope));
        (dir, programs, state, scope, renderer)
    }

    #[test]
    fn test_fill_spans_chunks() {
        let (_dir, _programs, _state, scope, mut renderer) = renderer_with("None");
        let mut buffer = vec![1.0; 300 * 2];
        renderer.fill(&mut buffer, 2);
        assert!(buffer.iter().all(|&s| s == 0.0));
        assert_eq!(scope.tail(), 3 * CHUNK_SIZE);

        // 84 frames left in the third chunk.
        let mut buffer = vec![0.0; 84];
        renderer.fill(&mut buffer, 1);
        assert_eq!(scope.tail(), 3 * CHUNK_SIZE);
        renderer.fill(&mut buffer[..1], 1);
        assert_eq!(scope.tail(), 4 * CHUNK_SIZE);
    }

    #[test]
    fn test_channels_carry_the_same_signal() {
        let (_dir, programs, _state, _scope, mut renderer) = renderer_with("Simple");
        let program = programs.open_slot().load_full();
        programs.dispatch(&program, ProgramEvent::NoteOn { key: 69, velocity: 127 });
        programs.activate(&program);

        let mut buffer = vec![0.0; 512 * 2];
        renderer.fill(&mut buffer, 2);
        assert!(buffer.iter().any(|&s| s.abs() > 1e-3));
        assert!(buffer.iter().all(|&s| s.abs() <= 1.0));
        for frame in buffer.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn test_master_volume_mutes_output_not_scope() {
        let (_dir, programs, state, scope, mut renderer) = renderer_with("Simple");
        let program = programs.open_slot().load_full();
        programs.dispatch(&program, ProgramEvent::NoteOn { key: 69, velocity: 127 });
        state.set_master_volume(0.0);

        let chunk = renderer.render_chunk();
        assert!(chunk.iter().all(|&s| s == 0.0));
        assert!(scope.rms() > 0.0);
        assert!((scope.base_frequency() - 440.0).abs() < 0.01);
    }
}
