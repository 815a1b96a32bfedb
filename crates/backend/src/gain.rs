// Volume step to gain conversion with per-period ramping

use chime_core::{VolumeStep, VOLUME_MAX, VOLUME_MIN};

/// Attenuation or boost per volume step
pub const STEP_DB: f32 = 0.5;

/// Linear gain for a volume step. Step 0 is unity gain.
pub fn step_to_linear(step: VolumeStep) -> f32 {
    let step = step.clamp(VOLUME_MIN, VOLUME_MAX);
    let db = f32::from(step) * STEP_DB;
    10.0_f32.powf(db / 20.0)
}

/// Gain applied to successive render periods.
///
/// `ramp_to` spreads a change over a number of periods; `set` applies it at
/// the next period boundary.
#[derive(Debug, Clone)]
pub struct GainRamp {
    current: f32,
    target: f32,
    remaining: u32,
}

impl GainRamp {
    pub fn new(step: VolumeStep) -> Self {
        let gain = step_to_linear(step);
        Self {
            current: gain,
            target: gain,
            remaining: 0,
        }
    }

    pub fn set(&mut self, step: VolumeStep) {
        let gain = step_to_linear(step);
        self.current = gain;
        self.target = gain;
        self.remaining = 0;
    }

    pub fn ramp_to(&mut self, step: VolumeStep, periods: u32) {
        if periods == 0 {
            self.set(step);
            return;
        }
        self.target = step_to_linear(step);
        self.remaining = periods;
    }

    /// Gain for the next period
    pub fn advance(&mut self) -> f32 {
        if self.remaining > 0 {
            self.current += (self.target - self.current) / self.remaining as f32;
            self.remaining -= 1;
            if self.remaining == 0 {
                self.current = self.target;
            }
        }
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }
}

impl Default for GainRamp {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Scale samples in place, clipping to full scale
pub fn apply_gain(samples: &mut [f32], gain: f32) {
    if gain == 1.0 {
        return;
    }
    for sample in samples.iter_mut() {
        *sample = (*sample * gain).clamp(-1.0, 1.0);
    }
}
