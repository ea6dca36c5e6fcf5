//! pling Core - DSP primitives for the pling synthesizer
//!
//! This crate provides the allocation-free building blocks every sound
//! engine is assembled from. Everything here is safe to call from the audio
//! thread.
//!
//! # Building Blocks
//!
//! ## Audio
//!
//! - [`Chunk`] - Fixed block of [`CHUNK_SIZE`] samples exchanged by every render call
//!
//! ## Oscillators
//!
//! - [`Oscillator`] - Phase accumulator with sine, triangle, square and saw outputs
//! - [`Operator`] - Phase-modulation operator for FM engines
//!
//! ## Envelopes
//!
//! - [`LinearAdsr`] / [`ExponentialAdsr`] - ADSR generators sharing [`AdsrParameters`]
//! - [`ExponentialDx7`] / [`BimodalDx7`] - Four-breakpoint envelopes sharing [`Dx7Parameters`]
//!
//! ## Curves
//!
//! - [`KeyboardScaling`] / [`VelocityScaling`] - Breakpoint scaling curves
//!
//! ## Filters
//!
//! - [`Biquad`] - Second-order IIR filter, seven response types
//! - [`StateVariable`] - TPT state variable filter with four outputs
//! - [`StateVariable24`] - Cascaded 24 dB/oct state variable filter
//!
//! ## Utilities
//!
//! - Control curves: [`cc_linear`], [`cc_exponential`], [`cc_select`]
//! - Conversions: [`db_to_amplitude`], [`amplitude_to_db`], [`key_to_frequency`]
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible. Disable the default `std` feature:
//!
//! ```toml
//! [dependencies]
//! pling-core = { version = "0.1", default-features = false }
//! ```
//!
//! The optional `serde` feature derives serialization for every parameter
//! type that belongs in a patch.
//!
//! # Design Principles
//!
//! - **Real-time safe**: No allocations in audio processing paths
//! - **Shared parameters**: Coefficients are separate from per-voice state
//! - **No dependencies on std**: Pure `no_std` with `libm` for math

#![cfg_attr(not(feature = "std"), no_std)]

pub mod biquad;
pub mod chunk;
pub mod curve;
pub mod envelope;
pub mod math;
pub mod oscillator;
pub mod svf;

pub use biquad::{Biquad, BiquadParameters, BiquadType};
pub use chunk::{CHUNK_SIZE, Chunk};
pub use curve::{KeyboardScaling, VelocityScaling};
pub use envelope::{
    AdsrParameters, AdsrStage, AdsrTimes, BimodalDx7, Dx7Parameters, Dx7Stage, ExponentialAdsr,
    ExponentialDx7, LinearAdsr,
};
pub use math::{
    amplitude_to_db, cc_exponential, cc_exponential_clamped, cc_linear, cc_linear_clamped,
    cc_select, db_to_amplitude, flush_denormal, key_to_frequency, lerp, pitch_bend_ratio,
};
pub use oscillator::{Operator, Oscillator};
pub use svf::{StateVariable, StateVariable24, SvfOutputs, SvfParameters, SvfType};
