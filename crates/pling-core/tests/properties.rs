//! Property-based tests for pling-core DSP primitives.
//!
//! Tests filter stability and DC response, envelope release behaviour and
//! retrigger continuity using proptest for randomized input generation.

use proptest::prelude::*;
use pling_core::{
    Biquad, BiquadParameters, BiquadType, Dx7Parameters, Dx7Stage, ExponentialAdsr,
    ExponentialDx7, LinearAdsr, AdsrParameters, StateVariable, StateVariable24, SvfParameters,
    SvfType,
};

const SR: f32 = 48000.0;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// For any valid cutoff and Q, every biquad type produces finite output
    /// for random finite input.
    #[test]
    fn biquad_stability(
        freq in 20.0f32..20000.0f32,
        q in 0.1f32..10.0f32,
        gain in -24.0f32..24.0f32,
        variant in 0usize..7,
        input in prop::array::uniform32(-1.0f32..=1.0f32),
    ) {
        let mut params = BiquadParameters::new(SR);
        params.set(BiquadType::from_index(variant), freq, q, gain);
        let mut biquad = Biquad::new();

        for &sample in &input {
            let out = biquad.filter(&params, sample);
            prop_assert!(
                out.is_finite(),
                "Biquad type {} (freq={}, q={}) produced non-finite output {} for input {}",
                variant, freq, q, out, sample
            );
        }
    }

    /// The SVF stays finite in all output modes, including the cascaded form.
    #[test]
    fn svf_stability(
        freq in 20.0f32..23000.0f32,
        q in 0.5f32..100.0f32,
        mode in 0usize..4,
        input in prop::array::uniform32(-1.0f32..=1.0f32),
    ) {
        let mut params = SvfParameters::new(SR);
        params.set(SvfType::from_index(mode), freq, q);
        let mut two = StateVariable::new();
        let mut four = StateVariable24::new();

        for _ in 0..32 {
            for &sample in &input {
                let a = two.filter(&params, sample);
                let b = four.filter(&params, sample);
                prop_assert!(a.is_finite() && b.is_finite(), "SVF mode {} (freq={}, q={}) diverged", mode, freq, q);
            }
        }
    }

    /// A constant input through a lowpass settles on the input; through a
    /// highpass it settles on zero.
    #[test]
    fn lowpass_passes_dc_highpass_blocks_it(
        freq in 200.0f32..5000.0f32,
        q in 0.5f32..2.0f32,
        dc in -1.0f32..=1.0f32,
    ) {
        let mut lp = SvfParameters::new(SR);
        lp.set(SvfType::Lowpass, freq, q);
        let mut hp = SvfParameters::new(SR);
        hp.set(SvfType::Highpass, freq, q);
        let mut low = StateVariable::new();
        let mut high = StateVariable::new();

        let mut biquad_lp = BiquadParameters::new(SR);
        biquad_lp.set(BiquadType::Lowpass, freq, q, 0.0);
        let mut biquad_hp = BiquadParameters::new(SR);
        biquad_hp.set(BiquadType::Highpass, freq, q, 0.0);
        let mut b_low = Biquad::new();
        let mut b_high = Biquad::new();

        let (mut l, mut h, mut bl, mut bh) = (0.0, 0.0, 0.0, 0.0);
        for _ in 0..8000 {
            l = low.filter(&lp, dc);
            h = high.filter(&hp, dc);
            bl = b_low.filter(&biquad_lp, dc);
            bh = b_high.filter(&biquad_hp, dc);
        }

        prop_assert!((l - dc).abs() < 1e-3, "SVF lowpass settled at {} for {}", l, dc);
        prop_assert!(h.abs() < 1e-3, "SVF highpass settled at {}", h);
        prop_assert!((bl - dc).abs() < 1e-3, "Biquad lowpass settled at {} for {}", bl, dc);
        prop_assert!(bh.abs() < 1e-3, "Biquad highpass settled at {}", bh);
    }

    /// Releasing an ADSR at any point falls monotonically to silence within
    /// the time the release setting implies, and never goes negative.
    #[test]
    fn adsr_release_is_monotonic(
        attack in 0.0f32..0.05f32,
        decay in 0.0f32..0.5f32,
        sustain in 0.0f32..=1.0f32,
        release in 0.0f32..0.2f32,
        held in 0usize..4800,
    ) {
        let mut params = AdsrParameters::new(SR);
        params.set(attack, decay, sustain, release);

        let mut linear = LinearAdsr::new();
        let mut exponential = ExponentialAdsr::new();
        linear.init();
        exponential.init();
        for _ in 0..held {
            linear.update(&params);
            exponential.update(&params);
        }
        linear.release();
        exponential.release();

        // Exponential release falls 40 dB per release time, silence is 80 dB down.
        let bound = (SR * release * 2.0) as usize + 2;
        let (mut prev_lin, mut prev_exp) = (linear.level(), exponential.level());
        for _ in 0..bound {
            let lin = linear.update(&params);
            let exp = exponential.update(&params);
            prop_assert!(lin >= 0.0 && exp >= 0.0);
            prop_assert!(lin <= prev_lin, "linear release rose from {} to {}", prev_lin, lin);
            prop_assert!(exp <= prev_exp, "exponential release rose from {} to {}", prev_exp, exp);
            prev_lin = lin;
            prev_exp = exp;
        }
        prop_assert!(!linear.is_active(), "linear release still active after {} samples", bound);
        prop_assert!(!exponential.is_active(), "exponential release still active after {} samples", bound);
    }

    /// Retriggering a DX7 envelope mid-attack keeps the level continuous.
    #[test]
    fn dx7_reinit_is_continuous(
        levels in prop::array::uniform4(-48.0f32..0.0f32),
        durations in prop::array::uniform4(0.001f32..0.05f32),
        held in 1usize..4000,
    ) {
        let params = Dx7Parameters { level: levels, duration: durations };
        let mut env = ExponentialDx7::new(SR);
        env.init(&params);
        for _ in 0..held {
            env.update(&params, 1.0);
        }
        prop_assume!(matches!(env.stage(), Dx7Stage::Attack1 | Dx7Stage::Attack2 | Dx7Stage::Attack3));

        let before = env.update(&params, 0.0);
        env.reinit(&params);
        let after = env.update(&params, 0.0);
        prop_assert!(
            (before - after).abs() < 1e-4,
            "reinit moved the level from {} to {} (stage {:?})", before, after, env.stage()
        );
    }
}
