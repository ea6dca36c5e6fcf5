use super::{AdsrParameters, AdsrStage, SILENCE};

/// ADSR envelope with a linear attack and exponential decay and release.
///
/// The decay approaches the sustain level asymptotically and stays in
/// [`AdsrStage::Decay`] until released. Decay and release fall by 40 dB
/// over their configured time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExponentialAdsr {
    level: f32,
    stage: AdsrStage,
}

impl ExponentialAdsr {
    /// Create a silent envelope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart the attack from silence.
    pub fn init(&mut self) {
        self.level = 0.0;
        self.stage = AdsrStage::Attack;
    }

    /// Enter the release stage.
    pub fn release(&mut self) {
        if self.stage != AdsrStage::Off {
            self.stage = AdsrStage::Release;
        }
    }

    /// Whether the envelope still produces output.
    pub fn is_active(&self) -> bool {
        self.stage != AdsrStage::Off
    }

    /// Current stage.
    pub fn stage(&self) -> AdsrStage {
        self.stage
    }

    /// Most recent output.
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Advance one sample.
    #[inline]
    pub fn update(&mut self, params: &AdsrParameters) -> f32 {
        match self.stage {
            AdsrStage::Off => self.level = 0.0,
            AdsrStage::Attack => {
                self.level += params.attack;
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = AdsrStage::Decay;
                }
            }
            AdsrStage::Decay => {
                self.level = params.sustain + (self.level - params.sustain) * params.decay_coeff;
            }
            AdsrStage::Release => {
                self.level *= params.release_coeff;
                if self.level < SILENCE {
                    self.level = 0.0;
                    self.stage = AdsrStage::Off;
                }
            }
        }
        self.level
    }
}
