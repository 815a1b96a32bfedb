// In-process audio subsystem
//
// Sessions share one output arbitrated by priority. Each session delivers its
// notifications from a dedicated event thread and renders PCM on a render
// thread, paced by the clock or (with the `cpal` feature) by the device.

mod arbiter;
mod config;
mod dispatch;
mod gain;
mod render;
mod session;

#[cfg(feature = "cpal")]
mod device;

pub use arbiter::{Arbiter, SessionId};
pub use config::BackendConfig;
pub use gain::{step_to_linear, GainRamp, STEP_DB};
pub use render::{decode_samples, ClockSink, PeriodSink};
pub use session::BackendSession;

#[cfg(feature = "cpal")]
pub use device::DeviceSink;

use chime_audio_api::AudioSubsystem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub(crate) struct BackendShared {
    pub config: BackendConfig,
    pub arbiter: Arbiter,
    next_id: AtomicU64,
}

/// Audio subsystem handle; clones share the same arbiter
#[derive(Clone)]
pub struct Backend {
    shared: Arc<BackendShared>,
}

impl Backend {
    pub fn new(config: BackendConfig) -> Self {
        log::info!(
            "Audio backend: {} ms periods, device output {}",
            config.period().as_millis(),
            if config.uses_device() { "on" } else { "off" }
        );
        Self {
            shared: Arc::new(BackendShared {
                config,
                arbiter: Arbiter::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.shared.config
    }

    pub fn arbiter(&self) -> &Arbiter {
        &self.shared.arbiter
    }
}

impl Default for Backend {
    fn default() -> Self {
        Self::new(BackendConfig::default())
    }
}

impl AudioSubsystem for Backend {
    type Session = BackendSession;

    fn create_session(&self) -> Option<BackendSession> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        match BackendSession::new(id, self.shared.clone()) {
            Ok(session) => {
                log::debug!("Session {} created", id);
                Some(session)
            }
            Err(e) => {
                log::error!("Failed to create session: {}", e);
                None
            }
        }
    }
}
