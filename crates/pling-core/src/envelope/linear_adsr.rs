use super::{AdsrParameters, AdsrStage, SILENCE};

/// ADSR envelope with straight-line segments.
///
/// # Example
///
/// ```rust
/// use pling_core::envelope::{AdsrParameters, LinearAdsr};
///
/// let mut params = AdsrParameters::new(48000.0);
/// params.set(0.01, 0.1, 0.5, 0.2);
///
/// let mut env = LinearAdsr::new();
/// env.init();
/// for _ in 0..48000 {
///     env.update(&params);
/// }
/// assert!((env.level() - 0.5).abs() < 1e-3);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearAdsr {
    level: f32,
    stage: AdsrStage,
}

impl LinearAdsr {
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
                if self.level > params.sustain {
                    self.level = (self.level - params.decay).max(params.sustain);
                } else {
                    self.level = params.sustain;
                }
            }
            AdsrStage::Release => {
                self.level -= params.release;
                if self.level < SILENCE {
                    self.level = 0.0;
                    self.stage = AdsrStage::Off;
                }
            }
        }
        self.level
    }
}
