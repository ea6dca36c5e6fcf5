use super::{Dx7Parameters, Dx7Stage};
use crate::math::db_to_amplitude;

/// Four-breakpoint envelope that moves at a constant dB rate per segment.
///
/// Levels are typically centred on 0 dB so the envelope can both raise and
/// lower whatever it scales, as pitch and cutoff envelopes do. Each segment
/// covers the distance from the level it started at to its breakpoint in
/// `duration·sr` samples at a constant dB rate. Release starts from wherever
/// the envelope was, so a release before sustain still reaches `level[0]`
/// on time.
#[derive(Debug, Clone, Copy)]
pub struct BimodalDx7 {
    level: f32,
    start: f32,
    stage: Dx7Stage,
    sample_rate: f32,
}

impl Default for BimodalDx7 {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

/// Step `level` towards `target` by `rate`; true once it arrives.
#[inline]
fn approach(level: &mut f32, target: f32, rate: f32) -> bool {
    if *level > target {
        *level -= rate;
        if *level <= target {
            *level = target;
            return true;
        }
    } else {
        *level += rate;
        if *level >= target {
            *level = target;
            return true;
        }
    }
    false
}

impl BimodalDx7 {
    /// Create an envelope in the off stage.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            level: 0.0,
            start: 0.0,
            stage: Dx7Stage::Off,
            sample_rate,
        }
    }

    /// Restart from `level[0]`.
    pub fn init(&mut self, params: &Dx7Parameters) {
        self.level = params.level[0];
        self.start = self.level;
        self.stage = Dx7Stage::Attack1;
    }

    /// Enter the release stage.
    pub fn release(&mut self) {
        if self.stage != Dx7Stage::Off {
            self.start = self.level;
            self.stage = Dx7Stage::Release;
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

    /// Step towards `target`, covering the segment in `duration` seconds.
    /// True once it arrives.
    #[inline]
    fn segment(&mut self, target: f32, duration: f32) -> bool {
        let rate = (target - self.start).abs() / (duration * self.sample_rate);
        // Zero distance, or breakpoints edited mid-segment: jump.
        if duration <= 0.0 || rate <= 0.0 || rate.is_nan() {
            self.level = target;
            return true;
        }
        approach(&mut self.level, target, rate)
    }

    /// Advance one sample and return the linear amplitude.
    #[inline]
    pub fn update(&mut self, params: &Dx7Parameters) -> f32 {
        match self.stage {
            Dx7Stage::Off => self.level = params.level[0],
            Dx7Stage::Attack1 | Dx7Stage::Attack2 | Dx7Stage::Attack3 => {
                let i = self.stage as usize;
                if self.segment(params.level[i], params.duration[i - 1]) {
                    self.start = self.level;
                    self.stage = Dx7Stage::attack(i + 1);
                }
            }
            Dx7Stage::Sustain => self.level = params.level[3],
            Dx7Stage::Release => {
                if self.segment(params.level[0], params.duration[3]) {
                    self.stage = Dx7Stage::Off;
                }
            }
        }

        if !self.level.is_finite() {
            self.level = 0.0;
        }

        db_to_amplitude(self.level)
    }
}
