// Persisted volume step with saturating up/down adjustment

/// Discrete playback volume level
pub type VolumeStep = i8;

/// Quietest accepted volume step
pub const VOLUME_MIN: VolumeStep = -20;

/// Loudest accepted volume step
pub const VOLUME_MAX: VolumeStep = 20;

/// Volume step that survives across plays for the lifetime of the owner.
/// The stored value always lies in `[VOLUME_MIN, VOLUME_MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeControl {
    step: VolumeStep,
}

impl VolumeControl {
    pub fn new(step: VolumeStep) -> Self {
        Self {
            step: step.clamp(VOLUME_MIN, VOLUME_MAX),
        }
    }

    pub fn step(&self) -> VolumeStep {
        self.step
    }

    /// Store a new step, clamped into range. Returns the stored value.
    pub fn set(&mut self, step: VolumeStep) -> VolumeStep {
        let clamped = step.clamp(VOLUME_MIN, VOLUME_MAX);
        if clamped != step {
            log::debug!("Volume step {} clamped to {}", step, clamped);
        }
        self.step = clamped;
        self.step
    }

    /// Raise by one step.
    /// Returns the new step, or `VOLUME_MAX + 1` if the level was already at the top.
    pub fn up(&mut self) -> VolumeStep {
        if self.step >= VOLUME_MAX {
            self.step = VOLUME_MAX;
            log::debug!("Volume already at maximum ({})", VOLUME_MAX);
            return VOLUME_MAX + 1;
        }
        self.step += 1;
        log::debug!("Volume step up to {}", self.step);
        self.step
    }

    /// Lower by one step.
    /// Returns the new step, or `VOLUME_MIN - 1` if the level was already at the bottom.
    pub fn down(&mut self) -> VolumeStep {
        if self.step <= VOLUME_MIN {
            self.step = VOLUME_MIN;
            log::debug!("Volume already at minimum ({})", VOLUME_MIN);
            return VOLUME_MIN - 1;
        }
        self.step -= 1;
        log::debug!("Volume step down to {}", self.step);
        self.step
    }

    pub fn is_saturated(value: VolumeStep) -> bool {
        !(VOLUME_MIN..=VOLUME_MAX).contains(&value)
    }
}

impl Default for VolumeControl {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_out_of_range_steps() {
        assert_eq!(VolumeControl::new(i8::MAX).step(), VOLUME_MAX);
        assert_eq!(VolumeControl::new(i8::MIN).step(), VOLUME_MIN);
        assert_eq!(VolumeControl::new(3).step(), 3);
    }

    #[test]
    fn up_saturates_with_sentinel() {
        let mut volume = VolumeControl::new(VOLUME_MAX - 1);
        assert_eq!(volume.up(), VOLUME_MAX);
        assert_eq!(volume.up(), VOLUME_MAX + 1);
        assert_eq!(volume.up(), VOLUME_MAX + 1);
        assert_eq!(volume.step(), VOLUME_MAX);
    }

    #[test]
    fn down_saturates_with_sentinel() {
        let mut volume = VolumeControl::new(VOLUME_MIN + 1);
        assert_eq!(volume.down(), VOLUME_MIN);
        assert_eq!(volume.down(), VOLUME_MIN - 1);
        assert_eq!(volume.step(), VOLUME_MIN);
    }

    #[test]
    fn stored_step_never_leaves_range() {
        let mut volume = VolumeControl::default();
        for _ in 0..100 {
            volume.up();
            assert!(!VolumeControl::is_saturated(volume.step()));
        }
        for _ in 0..100 {
            volume.down();
            assert!(!VolumeControl::is_saturated(volume.step()));
        }
        assert_eq!(volume.step(), VOLUME_MIN);
    }

    #[test]
    fn saturation_sentinels_are_recognised() {
        assert!(VolumeControl::is_saturated(VOLUME_MAX + 1));
        assert!(VolumeControl::is_saturated(VOLUME_MIN - 1));
        assert!(!VolumeControl::is_saturated(0));
    }
}
