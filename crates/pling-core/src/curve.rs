//! DX7-style scaling curves.
//!
//! Both curves split their input at a breakpoint and apply a separate
//! depth and shape on either side. They are evaluated once per note-on to
//! scale operator levels and envelope rates.

use libm::{exp2f, log2f};

/// Keyboard scaling around a breakpoint frequency.
///
/// The linear shape scales with the distance in octaves from the
/// breakpoint; the exponential shape scales with the frequency ratio
/// itself, so its effect doubles every octave on the right.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct KeyboardScaling {
    /// Breakpoint in Hz.
    pub breakpoint: f32,
    /// Exponential shape below the breakpoint.
    pub left_exponential: bool,
    /// Exponential shape above the breakpoint.
    pub right_exponential: bool,
    /// Depth below the breakpoint.
    pub left_depth: f32,
    /// Depth above the breakpoint.
    pub right_depth: f32,
}

impl Default for KeyboardScaling {
    fn default() -> Self {
        Self {
            breakpoint: 440.0,
            left_exponential: false,
            right_exponential: false,
            left_depth: 0.0,
            right_depth: 0.0,
        }
    }
}

impl KeyboardScaling {
    /// Scaling amount for a note frequency in Hz.
    ///
    /// A breakpoint of 0 or below makes the ratio meaningless; those curves
    /// evaluate to 0 like any other non-finite result.
    pub fn evaluate(&self, frequency: f32) -> f32 {
        let amount = self.shape(frequency / self.breakpoint);
        if amount.is_finite() { amount } else { 0.0 }
    }

    fn shape(&self, ratio: f32) -> f32 {
        if ratio < 1.0 {
            if self.left_exponential {
                self.left_depth * (1.0 - ratio)
            } else {
                self.left_depth * -log2f(ratio)
            }
        } else if self.right_exponential {
            self.right_depth * (ratio - 1.0)
        } else {
            self.right_depth * log2f(ratio)
        }
    }
}

/// Velocity scaling around a breakpoint velocity in `0..=1`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct VelocityScaling {
    /// Breakpoint as a fraction of full velocity.
    pub breakpoint: f32,
    /// Exponential shape below the breakpoint.
    pub left_exponential: bool,
    /// Exponential shape above the breakpoint.
    pub right_exponential: bool,
    /// Depth below the breakpoint.
    pub left_depth: f32,
    /// Depth above the breakpoint.
    pub right_depth: f32,
}

impl Default for VelocityScaling {
    fn default() -> Self {
        Self {
            breakpoint: 1.0,
            left_exponential: false,
            right_exponential: false,
            left_depth: 0.0,
            right_depth: 0.0,
        }
    }
}

impl VelocityScaling {
    /// Multiplier for a velocity in `0..=1`.
    pub fn evaluate(&self, velocity: f32) -> f32 {
        let diff = velocity - self.breakpoint;

        if diff < 0.0 {
            if self.left_exponential {
                exp2f(-diff * self.left_depth)
            } else {
                1.0 - diff * self.left_depth
            }
        } else if self.right_exponential {
            exp2f(diff * self.right_depth)
        } else {
            1.0 + diff * self.right_depth
        }
    }
}
