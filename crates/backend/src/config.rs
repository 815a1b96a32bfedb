// Backend tuning

use std::time::Duration;

/// Backend configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendConfig {
    /// Length of one render period in milliseconds
    pub period_ms: u32,
    /// Send rendered periods to the default output device when the `cpal`
    /// feature is compiled in. Ignored otherwise.
    pub device_output: bool,
}

impl BackendConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(u64::from(self.period_ms.max(1)))
    }

    /// Whether sessions will try to open an output device
    pub fn uses_device(&self) -> bool {
        cfg!(feature = "cpal") && self.device_output
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            period_ms: 10,
            device_output: true,
        }
    }
}
