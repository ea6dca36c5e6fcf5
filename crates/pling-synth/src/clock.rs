//! The master clock.
//!
//! Musical time is kept as a beat count at the moment the clock was last
//! started or repositioned, plus the wall time elapsed since then. While
//! stopped the position holds still.

use std::time::Instant;

use parking_lot::Mutex;

/// Time signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metre {
    /// Beats per measure.
    pub upper: u32,
    /// Note value of one beat.
    pub lower: u32,
}

impl Default for Metre {
    fn default() -> Self {
        Self { upper: 4, lower: 4 }
    }
}

/// Position in measures and beats, both zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    /// Measure.
    pub measure: i32,
    /// Beat within the measure.
    pub beat: f32,
}

#[derive(Debug, Clone, Copy)]
struct Inner {
    time_epoch: Option<Instant>,
    beat_epoch: f64,
    tempo: f32,
    metre: Metre,
}

impl Inner {
    fn beat_position(&self, now: Instant) -> f64 {
        let mut beat = self.beat_epoch;
        if let Some(epoch) = self.time_epoch {
            beat += now.saturating_duration_since(epoch).as_secs_f64() * f64::from(self.tempo) / 60.0;
        }
        beat
    }

    fn rebase(&mut self, now: Instant) {
        if self.time_epoch.is_some() {
            self.beat_epoch = self.beat_position(now);
            self.time_epoch = Some(now);
        }
    }
}

/// Transport clock shared by the control and MIDI threads.
#[derive(Debug)]
pub struct Clock {
    inner: Mutex<Inner>,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    /// Default tempo in beats per minute.
    pub const DEFAULT_TEMPO: f32 = 120.0;

    /// A stopped clock at beat 0, 120 BPM, 4/4.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                time_epoch: None,
                beat_epoch: 0.0,
                tempo: Self::DEFAULT_TEMPO,
                metre: Metre::default(),
            }),
        }
    }

    /// Whether the clock is running.
    pub fn is_running(&self) -> bool {
        self.inner.lock().time_epoch.is_some()
    }

    /// Start from the current position; no-op when running.
    pub fn start(&self) {
        self.start_at(Instant::now());
    }

    /// [`Clock::start`] at a given instant.
    pub fn start_at(&self, now: Instant) {
        let mut inner = self.inner.lock();
        if inner.time_epoch.is_none() {
            inner.time_epoch = Some(now);
        }
    }

    /// Stop and hold the current position; no-op when stopped.
    pub fn stop(&self) {
        self.stop_at(Instant::now());
    }

    /// [`Clock::stop`] at a given instant.
    pub fn stop_at(&self, now: Instant) {
        let mut inner = self.inner.lock();
        if inner.time_epoch.is_some() {
            inner.beat_epoch = inner.beat_position(now);
            inner.time_epoch = None;
        }
    }

    /// Go back to beat 0 without changing whether the clock runs.
    pub fn reset(&self) {
        self.reset_at(Instant::now());
    }

    /// [`Clock::reset`] at a given instant.
    pub fn reset_at(&self, now: Instant) {
        let mut inner = self.inner.lock();
        if inner.time_epoch.is_some() {
            inner.time_epoch = Some(now);
        }
        inner.beat_epoch = 0.0;
    }

    /// Position in beats.
    pub fn beat_position(&self) -> f64 {
        self.beat_position_at(Instant::now())
    }

    /// [`Clock::beat_position`] at a given instant.
    pub fn beat_position_at(&self, now: Instant) -> f64 {
        self.inner.lock().beat_position(now)
    }

    /// Position in seconds at the current tempo.
    pub fn time_position(&self) -> f64 {
        self.time_position_at(Instant::now())
    }

    /// [`Clock::time_position`] at a given instant.
    pub fn time_position_at(&self, now: Instant) -> f64 {
        let inner = self.inner.lock();
        inner.beat_position(now) * 60.0 / f64::from(inner.tempo)
    }

    /// Position in measures and beats.
    pub fn position(&self) -> Position {
        self.position_at(Instant::now())
    }

    /// [`Clock::position`] at a given instant.
    pub fn position_at(&self, now: Instant) -> Position {
        let inner = self.inner.lock();
        let metre = inner.metre;
        let metre_beat = inner.beat_position(now) / 4.0 * f64::from(metre.lower);
        let measure = (metre_beat / f64::from(metre.upper)).floor();
        Position {
            measure: measure as i32,
            beat: (metre_beat - measure * f64::from(metre.upper)) as f32,
        }
    }

    /// Move to a time in seconds. Restarts the running epoch.
    pub fn set_time_position(&self, seconds: f64) {
        self.set_time_position_at(seconds, Instant::now());
    }

    /// [`Clock::set_time_position`] at a given instant.
    pub fn set_time_position_at(&self, seconds: f64, now: Instant) {
        let mut inner = self.inner.lock();
        let beat = seconds * f64::from(inner.tempo) / 60.0;
        Self::seek(&mut inner, beat, now);
    }

    /// Move to a beat.
    pub fn set_beat_position(&self, beat: f64) {
        self.set_beat_position_at(beat, Instant::now());
    }

    /// [`Clock::set_beat_position`] at a given instant.
    pub fn set_beat_position_at(&self, beat: f64, now: Instant) {
        Self::seek(&mut self.inner.lock(), beat, now);
    }

    /// Move to a measure and beat.
    pub fn set_position(&self, position: Position) {
        self.set_position_at(position, Instant::now());
    }

    /// [`Clock::set_position`] at a given instant.
    pub fn set_position_at(&self, position: Position, now: Instant) {
        let mut inner = self.inner.lock();
        let metre = inner.metre;
        let beat = (f64::from(position.measure) * f64::from(metre.upper) + f64::from(position.beat)) * 4.0
            / f64::from(metre.lower);
        Self::seek(&mut inner, beat, now);
    }

    fn seek(inner: &mut Inner, beat: f64, now: Instant) {
        if inner.time_epoch.is_some() {
            inner.time_epoch = Some(now);
        }
        inner.beat_epoch = beat;
    }

    /// Tempo in beats per minute.
    pub fn tempo(&self) -> f32 {
        self.inner.lock().tempo
    }

    /// Change tempo, keeping the current beat position.
    pub fn set_tempo(&self, tempo: f32) {
        self.set_tempo_at(tempo, Instant::now());
    }

    /// [`Clock::set_tempo`] at a given instant.
    pub fn set_tempo_at(&self, tempo: f32, now: Instant) {
        if !(tempo.is_finite() && tempo > 0.0) {
            tracing::warn!(tempo, "ignoring invalid tempo");
            return;
        }
        let mut inner = self.inner.lock();
        inner.rebase(now);
        inner.tempo = tempo;
    }

    /// Time signature.
    pub fn metre(&self) -> Metre {
        self.inner.lock().metre
    }

    /// Change the time signature; zero fields are ignored.
    pub fn set_metre(&self, metre: Metre) {
        if metre.upper > 0 && metre.lower > 0 {
            self.inner.lock().metre = metre;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_stopped_clock_holds() {
        let clock = Clock::new();
        let t0 = Instant::now();
        assert!(!clock.is_running());
        assert_eq!(clock.beat_position_at(t0 + secs(5.0)), 0.0);
        assert_eq!(clock.tempo(), 120.0);
    }

    #[test]
    fn test_running_clock_counts_beats() {
        let clock = Clock::new();
        let t0 = Instant::now();
        clock.start_at(t0);
        assert!((clock.beat_position_at(t0 + secs(1.0)) - 2.0).abs() < 1e-9);
        assert!((clock.time_position_at(t0 + secs(1.5)) - 1.5).abs() < 1e-9);

        clock.stop_at(t0 + secs(2.0));
        assert!((clock.beat_position_at(t0 + secs(10.0)) - 4.0).abs() < 1e-9);

        clock.start_at(t0 + secs(3.0));
        assert!((clock.beat_position_at(t0 + secs(3.5)) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_start_twice_keeps_epoch() {
        let clock = Clock::new();
        let t0 = Instant::now();
        clock.start_at(t0);
        clock.start_at(t0 + secs(1.0));
        assert!((clock.beat_position_at(t0 + secs(1.0)) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset() {
        let clock = Clock::new();
        let t0 = Instant::now();
        clock.start_at(t0);
        clock.reset_at(t0 + secs(3.0));
        assert!(clock.is_running());
        assert!((clock.beat_position_at(t0 + secs(3.5)) - 1.0).abs() < 1e-9);

        clock.stop_at(t0 + secs(4.0));
        clock.reset_at(t0 + secs(5.0));
        assert_eq!(clock.beat_position_at(t0 + secs(6.0)), 0.0);
    }

    #[test]
    fn test_set_tempo_keeps_position() {
        let clock = Clock::new();
        let t0 = Instant::now();
        clock.start_at(t0);
        clock.set_tempo_at(60.0, t0 + secs(1.0));
        // Two beats at 120, then one more second at 60.
        assert!((clock.beat_position_at(t0 + secs(2.0)) - 3.0).abs() < 1e-9);
        assert_eq!(clock.tempo(), 60.0);

        clock.set_tempo_at(0.0, t0 + secs(2.0));
        assert_eq!(clock.tempo(), 60.0);
    }

    #[test]
    fn test_position_in_measures() {
        let clock = Clock::new();
        let t0 = Instant::now();
        clock.set_beat_position_at(9.5, t0);
        assert_eq!(clock.position_at(t0), Position { measure: 2, beat: 1.5 });

        clock.set_position_at(Position { measure: 1, beat: 2.0 }, t0);
        assert_eq!(clock.beat_position_at(t0), 6.0);

        clock.set_metre(Metre { upper: 3, lower: 4 });
        assert_eq!(clock.position_at(t0), Position { measure: 2, beat: 0.0 });
    }

    #[test]
    fn test_set_time_position() {
        let clock = Clock::new();
        let t0 = Instant::now();
        clock.set_time_position_at(3.0, t0);
        assert_eq!(clock.beat_position_at(t0), 6.0);
        assert_eq!(clock.time_position_at(t0), 3.0);
    }
}
