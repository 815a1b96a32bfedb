// Sound player configuration

use chime_audio_api::{InputDevice, OutputDevice, PowerMode, Priority};

/// How the player asks for and opens the shared output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundConfig {
    /// Priority of the output resource request
    pub priority: Priority,
    pub power_mode: PowerMode,
    pub input: InputDevice,
    pub output: OutputDevice,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            priority: Priority::High,
            power_mode: PowerMode::Full,
            input: InputDevice::None,
            output: OutputDevice::Normal,
        }
    }
}
