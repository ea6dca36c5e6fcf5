use super::{Dx7Parameters, Dx7Stage};
use crate::math::db_to_amplitude;

/// Four-breakpoint envelope, linear in dB.
///
/// Each attack segment interpolates between two breakpoints over its
/// duration; segments with zero duration are skipped. Time advances by
/// `rate / sample_rate` per sample, so keyboard and velocity rate scaling
/// can stretch or compress the whole envelope.
///
/// # Example
///
/// ```rust
/// use pling_core::envelope::{Dx7Parameters, ExponentialDx7};
///
/// let params = Dx7Parameters {
///     level: [-96.0, 0.0, -6.0, -12.0],
///     duration: [0.01, 0.1, 0.5, 0.3],
/// };
/// let mut env = ExponentialDx7::new(48000.0);
/// env.init(&params);
/// let first = env.update(&params, 1.0);
/// assert!(first < 0.01);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ExponentialDx7 {
    level: f32,
    remaining: f32,
    stage: Dx7Stage,
    sample_rate: f32,
}

impl Default for ExponentialDx7 {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

impl ExponentialDx7 {
    /// Create an envelope in the off stage.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            level: 0.0,
            remaining: 0.0,
            stage: Dx7Stage::Off,
            sample_rate,
        }
    }

    /// Restart from `level[0]`.
    pub fn init(&mut self, params: &Dx7Parameters) {
        self.level = params.level[0];
        self.remaining = params.duration[0];
        self.stage = Dx7Stage::Attack1;
    }

    /// Restart the attack from the current level.
    ///
    /// Finds the earliest attack segment whose span contains the current
    /// level and resumes at the matching point, so retriggering a sounding
    /// voice does not click. Flat segments only match on equality. When no
    /// segment matches, the attack restarts from `level[0]`.
    pub fn reinit(&mut self, params: &Dx7Parameters) {
        for i in 0..3 {
            let from = params.level[i];
            let delta = params.level[i + 1] - from;

            if delta == 0.0 {
                if self.level == from {
                    self.remaining = params.duration[i];
                    self.stage = Dx7Stage::attack(i + 1);
                    return;
                }
                continue;
            }

            let t = (self.level - from) / delta;
            if (0.0..1.0).contains(&t) {
                self.remaining = params.duration[i] * (1.0 - t);
                self.stage = Dx7Stage::attack(i + 1);
                return;
            }
        }

        self.init(params);
    }

    /// Enter the release stage, which lasts `duration[3]`.
    pub fn release(&mut self, params: &Dx7Parameters) {
        if self.stage != Dx7Stage::Off {
            self.stage = Dx7Stage::Release;
            self.remaining = params.duration[3];
        }
    }

    /// Whether the envelope has not finished its release.
    pub fn is_active(&self) -> bool {
        self.stage != Dx7Stage::Off
    }

    /// Current stage.
    pub fn stage(&self) -> Dx7Stage {
        self.stage
    }

    /// Current level in dB.
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Current level as linear amplitude.
    pub fn amplitude(&self) -> f32 {
        db_to_amplitude(self.level)
    }

    /// Advance one sample with time scaled by `rate` and return the linear
    /// amplitude.
    #[inline]
    pub fn update(&mut self, params: &Dx7Parameters, rate: f32) -> f32 {
        let dt = rate / self.sample_rate;

        match self.stage {
            Dx7Stage::Off => self.level = params.level[0],
            Dx7Stage::Attack1 | Dx7Stage::Attack2 | Dx7Stage::Attack3 => {
                let mut i = self.stage as usize;
                self.remaining -= dt;

                while self.remaining <= 0.0 {
                    i += 1;
                    if i > 3 {
                        break;
                    }
                    self.remaining += params.duration[i - 1].max(0.0);
                }

                self.stage = Dx7Stage::attack(i);
                if self.stage == Dx7Stage::Sustain {
                    self.level = params.level[3];
                } else {
                    let duration = params.duration[i - 1];
                    let fraction = if duration > 0.0 {
                        (self.remaining / duration).min(1.0)
                    } else {
                        0.0
                    };
                    self.level = params.level[i] + (params.level[i - 1] - params.level[i]) * fraction;
                }
            }
            Dx7Stage::Sustain => self.level = params.level[3],
            Dx7Stage::Release => {
                if self.remaining <= dt {
                    self.stage = Dx7Stage::Off;
                    self.level = params.level[0];
                } else {
                    self.level += (params.level[0] - self.level) * dt / self.remaining;
                    self.remaining -= dt;
                }
            }
        }

        if !self.level.is_finite() {
            self.level = 0.0;
        }

        db_to_amplitude(self.level)
    }
}
