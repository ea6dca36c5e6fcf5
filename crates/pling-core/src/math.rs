//! Mathematical utility functions for synthesis.
//!
//! Pure, allocation-free helpers shared by every engine. All functions are
//! suitable for `no_std`.
//!
//! # Level Conversions
//!
//! - [`db_to_amplitude`] / [`amplitude_to_db`] - Convert between dB and linear gain
//!
//! # MIDI Control Curves
//!
//! Map a 7-bit controller value (0..=127) onto a parameter range:
//!
//! | Function | Response | Use Case |
//! |----------|----------|----------|
//! | [`cc_linear`] | Linear | Levels in dB, detune, pan |
//! | [`cc_exponential`] | Exponential | Times, frequencies, resonance |
//! | [`cc_select`] | Stepped | Enumerated selectors (filter type, waveform) |
//!
//! The `_clamped` variants pin the two extreme controller positions to
//! explicit values, so a fader at its bottom stop can mean "off" even when
//! the curve itself never reaches zero.
//!
//! # Pitch
//!
//! - [`key_to_frequency`] - MIDI key to Hz (A4 = 440 Hz)
//! - [`pitch_bend_ratio`] - 14-bit bend value to frequency ratio

use libm::{expf, exp2f, logf};

/// Convert decibels to linear amplitude.
///
/// # Example
/// ```rust
/// use pling_core::db_to_amplitude;
///
/// assert!((db_to_amplitude(0.0) - 1.0).abs() < 0.001);
/// assert!((db_to_amplitude(-6.02) - 0.5).abs() < 0.01);
/// ```
#[inline]
pub fn db_to_amplitude(db: f32) -> f32 {
    // 10^(dB/20) = e^(dB * ln(10)/20)
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear amplitude to decibels.
///
/// Amplitudes at or below 1e-10 are treated as -200 dB.
///
/// # Example
/// ```rust
/// use pling_core::amplitude_to_db;
///
/// assert!((amplitude_to_db(1.0) - 0.0).abs() < 0.001);
/// assert!((amplitude_to_db(0.5) - (-6.02)).abs() < 0.01);
/// ```
#[inline]
pub fn amplitude_to_db(amplitude: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    logf(amplitude.max(1e-10)) * FACTOR
}

/// Map a controller value linearly onto `lo..=hi`.
///
/// # Example
/// ```rust
/// use pling_core::cc_linear;
///
/// assert_eq!(cc_linear(0, -48.0, 0.0), -48.0);
/// assert_eq!(cc_linear(127, -48.0, 0.0), 0.0);
/// ```
#[inline]
pub fn cc_linear(value: u8, lo: f32, hi: f32) -> f32 {
    lo + f32::from(value) / 127.0 * (hi - lo)
}

/// Linear controller mapping with explicit values at both end stops.
///
/// Returns `min` for 0, `max` for 127 and [`cc_linear`] otherwise.
#[inline]
pub fn cc_linear_clamped(value: u8, min: f32, lo: f32, hi: f32, max: f32) -> f32 {
    match value {
        0 => min,
        127 => max,
        _ => cc_linear(value, lo, hi),
    }
}

/// Map a controller value exponentially onto `lo..=hi`.
///
/// Both bounds must be strictly positive.
///
/// # Example
/// ```rust
/// use pling_core::cc_exponential;
///
/// assert!((cc_exponential(0, 0.01, 10.0) - 0.01).abs() < 1e-6);
/// assert!((cc_exponential(127, 0.01, 10.0) - 10.0).abs() < 1e-3);
/// ```
#[inline]
pub fn cc_exponential(value: u8, lo: f32, hi: f32) -> f32 {
    lo * expf(f32::from(value) / 127.0 * logf(hi / lo))
}

/// Exponential controller mapping with explicit values at both end stops.
#[inline]
pub fn cc_exponential_clamped(value: u8, min: f32, lo: f32, hi: f32, max: f32) -> f32 {
    match value {
        0 => min,
        127 => max,
        _ => cc_exponential(value, lo, hi),
    }
}

/// Select one of `count` options with a controller value.
///
/// The controller range is split into `count` equal steps; the result is
/// always below `count`.
#[inline]
pub fn cc_select(value: u8, count: u32) -> u32 {
    u32::from(value.min(127)) * count / 128
}

/// Convert a MIDI key number to frequency in Hz.
///
/// Uses standard tuning: A4 (key 69) = 440 Hz.
#[inline]
pub fn key_to_frequency(key: u8) -> f32 {
    440.0 * exp2f((f32::from(key) - 69.0) / 12.0)
}

/// Convert a centred 14-bit pitch bend value (-8192..=8191) into a
/// frequency ratio, with `semitones` of range at full deflection.
#[inline]
pub fn pitch_bend_ratio(value: i16, semitones: f32) -> f32 {
    exp2f(f32::from(value) / 8192.0 * semitones / 12.0)
}

/// Linear interpolation between two values.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Flush denormal values to zero.
///
/// Filter and delay-line feedback paths decay into the denormal range when
/// a voice goes quiet, which is very slow on x86.
#[inline]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 { 0.0 } else { x }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_conversions() {
        assert!((db_to_amplitude(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_amplitude(20.0) - 10.0).abs() < 1e-4);
        assert!((db_to_amplitude(-40.0) - 0.01).abs() < 1e-6);

        for db in [-48.0, -24.0, -6.0, 0.0, 6.0] {
            let back = amplitude_to_db(db_to_amplitude(db));
            assert!((back - db).abs() < 1e-3, "{db} dB came back as {back}");
        }
    }

    #[test]
    fn test_amplitude_to_db_floor() {
        assert!(amplitude_to_db(0.0).is_finite());
        assert!(amplitude_to_db(0.0) < -190.0);
    }

    #[test]
    fn test_cc_linear_endpoints() {
        assert_eq!(cc_linear(0, -10.0, 10.0), -10.0);
        assert_eq!(cc_linear(127, -10.0, 10.0), 10.0);
        assert!(cc_linear(64, -10.0, 10.0).abs() < 0.1);
    }

    #[test]
    fn test_cc_clamped_endpoints() {
        assert_eq!(cc_linear_clamped(0, 0.0, -48.0, 0.0, 1.0), 0.0);
        assert_eq!(cc_linear_clamped(127, 0.0, -48.0, 0.0, 1.0), 1.0);
        assert_eq!(cc_exponential_clamped(0, 0.0, 1e-2, 1e1, 1e1), 0.0);
        assert_eq!(cc_exponential_clamped(127, 0.0, 1e-2, 1e1, 1e1), 1e1);
        assert!((cc_exponential_clamped(1, 0.0, 1e-2, 1e1, 1e1) - cc_exponential(1, 1e-2, 1e1)).abs() < 1e-9);
    }

    #[test]
    fn test_cc_exponential_is_monotonic() {
        let mut previous = 0.0;
        for value in 0..=127u8 {
            let mapped = cc_exponential(value, 0.01, 10.0);
            assert!(mapped > previous, "not monotonic at {value}");
            previous = mapped;
        }
    }

    #[test]
    fn test_cc_select_stays_in_range() {
        for value in 0..=255u8 {
            assert!(cc_select(value, 4) < 4);
        }
        assert_eq!(cc_select(0, 4), 0);
        assert_eq!(cc_select(31, 4), 0);
        assert_eq!(cc_select(32, 4), 1);
        assert_eq!(cc_select(127, 4), 3);
    }

    #[test]
    fn test_key_to_frequency() {
        assert!((key_to_frequency(69) - 440.0).abs() < 1e-3);
        assert!((key_to_frequency(81) - 880.0).abs() < 1e-2);
        assert!((key_to_frequency(60) - 261.626).abs() < 1e-2);
    }

    #[test]
    fn test_pitch_bend_ratio() {
        assert_eq!(pitch_bend_ratio(0, 2.0), 1.0);
        let up = pitch_bend_ratio(8191, 2.0);
        assert!((up - exp2f(2.0 / 12.0)).abs() < 1e-3);
        let down = pitch_bend_ratio(-8192, 2.0);
        assert!((down - exp2f(-2.0 / 12.0)).abs() < 1e-5);
    }

    #[test]
    fn test_flush_denormal() {
        assert_eq!(flush_denormal(1e-30), 0.0);
        assert_eq!(flush_denormal(0.5), 0.5);
    }
}
