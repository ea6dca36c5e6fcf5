//! Integration tests for pling-core DSP primitives.
//!
//! Verifies DSP accuracy using signal-level measurements: filter responses
//! from sine analysis, oscillator pitch from zero crossings, and envelope
//! timing in samples.

use pling_core::{
    AdsrParameters, Biquad, BiquadParameters, BiquadType, ExponentialAdsr, LinearAdsr, Operator,
    Oscillator, StateVariable, StateVariable24, SvfParameters, SvfType, amplitude_to_db,
    key_to_frequency, pitch_bend_ratio,
};

const SAMPLE_RATE: f32 = 48000.0;
const TAU: f32 = core::f32::consts::TAU;
const Q_BUTTERWORTH: f32 = core::f32::consts::FRAC_1_SQRT_2;

/// Generate a sine wave buffer at the given frequency and sample rate.
fn generate_sine(freq_hz: f32, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|n| libm::sinf(TAU * freq_hz * n as f32 / SAMPLE_RATE))
        .collect()
}

/// Measure RMS amplitude of a signal buffer.
fn rms(signal: &[f32]) -> f32 {
    let sum_sq: f32 = signal.iter().map(|&s| s * s).sum();
    libm::sqrtf(sum_sq / signal.len() as f32)
}

/// Gain in dB of `filter` at `freq_hz`, measured after the transient.
fn response_db(mut filter: impl FnMut(f32) -> f32, freq_hz: f32) -> f32 {
    let input = generate_sine(freq_hz, 24000);
    let output: Vec<f32> = input.iter().map(|&x| filter(x)).collect();
    amplitude_to_db(rms(&output[12000..]) / rms(&input[12000..]))
}

/// Count rising zero crossings.
fn rising_crossings(signal: &[f32]) -> usize {
    signal.windows(2).filter(|w| w[0] < 0.0 && w[1] >= 0.0).count()
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

#[test]
fn biquad_lowpass_frequency_response() {
    let mut params = BiquadParameters::new(SAMPLE_RATE);
    params.set(BiquadType::Lowpass, 1000.0, Q_BUTTERWORTH, 0.0);

    let mut measure = |freq| {
        let mut biquad = Biquad::new();
        response_db(|x| biquad.filter(&params, x), freq)
    };

    assert!(measure(100.0).abs() < 0.1, "passband should be flat");
    assert!((measure(1000.0) + 3.0).abs() < 0.3, "cutoff should be -3 dB");
    // Second order: about -12 dB per octave well above cutoff.
    let slope = measure(4000.0) - measure(8000.0);
    assert!(slope > 10.0 && slope < 16.0, "slope {slope}");
}

#[test]
fn biquad_highpass_frequency_response() {
    let mut params = BiquadParameters::new(SAMPLE_RATE);
    params.set(BiquadType::Highpass, 1000.0, Q_BUTTERWORTH, 0.0);

    let mut measure = |freq| {
        let mut biquad = Biquad::new();
        response_db(|x| biquad.filter(&params, x), freq)
    };

    assert!(measure(10000.0).abs() < 0.2);
    assert!((measure(1000.0) + 3.0).abs() < 0.3);
    assert!(measure(100.0) < -35.0);
}

#[test]
fn biquad_peak_boosts_centre() {
    let mut params = BiquadParameters::new(SAMPLE_RATE);
    params.set(BiquadType::Peak, 2000.0, 1.0, 6.0);
    let mut biquad = Biquad::new();
    assert!((response_db(|x| biquad.filter(&params, x), 2000.0) - 6.0).abs() < 0.3);

    params.set(BiquadType::Peak, 2000.0, 1.0, -6.0);
    let mut biquad = Biquad::new();
    assert!((response_db(|x| biquad.filter(&params, x), 2000.0) + 6.0).abs() < 0.3);
}

#[test]
fn svf_lowpass_frequency_response() {
    let mut params = SvfParameters::new(SAMPLE_RATE);
    params.set(SvfType::Lowpass, 1000.0, Q_BUTTERWORTH);

    let mut measure = |freq| {
        let mut svf = StateVariable::new();
        response_db(|x| svf.filter(&params, x), freq)
    };

    assert!(measure(100.0).abs() < 0.1);
    assert!((measure(1000.0) + 3.0).abs() < 0.3);
    assert!(measure(8000.0) < -30.0);
}

#[test]
fn svf_outputs_are_complementary() {
    let mut params = SvfParameters::new(SAMPLE_RATE);
    params.set(SvfType::Notch, 1000.0, 2.0);

    let mut svf = StateVariable::new();
    let at_centre = response_db(|x| svf.filter(&params, x), 1000.0);
    assert!(at_centre < -30.0, "notch should reject its centre, got {at_centre}");

    params.kind = SvfType::Bandpass;
    let mut svf = StateVariable::new();
    // Band output peaks at Q times unity for k = 1/Q.
    let band = response_db(|x| svf.filter(&params, x), 1000.0);
    assert!((band - amplitude_to_db(2.0)).abs() < 0.5, "band {band}");
}

#[test]
fn svf24_doubles_the_slope() {
    let mut params = SvfParameters::new(SAMPLE_RATE);
    params.set(SvfType::Lowpass, 500.0, Q_BUTTERWORTH);

    let mut two = StateVariable::new();
    let mut four = StateVariable24::new();
    let single = response_db(|x| two.filter(&params, x), 4000.0);
    let double = response_db(|x| four.filter(&params, x), 4000.0);
    assert!((double - 2.0 * single).abs() < 0.5, "{single} vs {double}");
}

#[test]
fn biquad_and_svf_lowpass_agree_on_cutoff_slope() {
    let mut bq_params = BiquadParameters::new(SAMPLE_RATE);
    bq_params.set(BiquadType::Lowpass, 2000.0, Q_BUTTERWORTH, 0.0);
    let mut svf_params = SvfParameters::new(SAMPLE_RATE);
    svf_params.set(SvfType::Lowpass, 2000.0, Q_BUTTERWORTH);

    for freq in [500.0, 2000.0, 6000.0] {
        let mut biquad = Biquad::new();
        let mut svf = StateVariable::new();
        let a = response_db(|x| biquad.filter(&bq_params, x), freq);
        let b = response_db(|x| svf.filter(&svf_params, x), freq);
        assert!((a - b).abs() < 0.5, "{freq} Hz: biquad {a} dB, svf {b} dB");
    }
}

// ---------------------------------------------------------------------------
// Oscillators
// ---------------------------------------------------------------------------

#[test]
fn oscillator_pitch_follows_key_and_bend() {
    let mut osc = Oscillator::new(SAMPLE_RATE);
    osc.init(key_to_frequency(69));

    let bend = pitch_bend_ratio(8191, 2.0);
    let samples: Vec<f32> = (0..48000)
        .map(|_| {
            let s = osc.sine();
            osc.update(bend);
            s
        })
        .collect();

    // Two semitones up from A4 is B4.
    let expected = key_to_frequency(71);
    let counted = rising_crossings(&samples) as f32;
    assert!((counted - expected).abs() <= 1.0, "{counted} crossings, expected {expected}");
    assert!((osc.frequency(bend) - expected).abs() < 0.1);
}

#[test]
fn oscillator_waveforms_are_bounded() {
    let mut osc = Oscillator::new(SAMPLE_RATE);
    osc.init(1234.5);
    for _ in 0..10000 {
        for s in [osc.sine(), osc.fast_sine(), osc.triangle(), osc.square(), osc.saw()] {
            assert!((-1.0..=1.0).contains(&s), "{s}");
        }
        osc.update(1.0);
    }
}

#[test]
fn operator_phase_modulation_shifts_phase() {
    let mut op = Operator::new();
    op.init();
    for _ in 0..10 {
        op.update(0.01);
    }
    // A full cycle of modulation changes nothing; half a cycle inverts.
    assert!((op.sine(1.0) - op.sine(0.0)).abs() < 1e-4);
    assert!((op.sine(0.5) + op.sine(0.0)).abs() < 1e-4);
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

#[test]
fn linear_adsr_full_cycle_timing() {
    let mut params = AdsrParameters::new(SAMPLE_RATE);
    params.set(0.01, 0.02, 0.5, 0.05);

    let mut env = LinearAdsr::new();
    env.init();

    // Attack plus decay is 30 ms; by then the sustain level holds.
    for _ in 0..(0.031 * SAMPLE_RATE) as usize {
        env.update(&params);
    }
    assert!((env.level() - 0.5).abs() < 1e-3);

    env.release();
    let mut samples = 0;
    while env.is_active() {
        env.update(&params);
        samples += 1;
        assert!(samples < 48000, "release never finished");
    }
    // Half of full scale at the full-scale rate: 25 ms.
    let expected = 0.025 * SAMPLE_RATE;
    assert!((samples as f32 - expected).abs() < 5.0, "{samples} samples");
}

#[test]
fn exponential_adsr_release_falls_40db_in_release_time() {
    let mut params = AdsrParameters::new(SAMPLE_RATE);
    params.set(0.0, 1.0, 1.0, 0.1);

    let mut env = ExponentialAdsr::new();
    env.init();
    for _ in 0..100 {
        env.update(&params);
    }
    let start = env.level();
    env.release();
    for _ in 0..(0.1 * SAMPLE_RATE) as usize {
        env.update(&params);
    }
    let drop = amplitude_to_db(env.level() / start);
    assert!((drop + 40.0).abs() < 1.0, "dropped {drop} dB");
}
