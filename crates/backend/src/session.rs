// One client session against the backend

use crate::arbiter::SessionId;
use crate::dispatch::Dispatcher;
use crate::gain::GainRamp;
use crate::render::{ClockSink, PeriodSink, RenderJob, Renderer, SinkFactory};
use crate::BackendShared;
use chime_audio_api::{
    AudioSession, Container, InputDevice, OutputDevice, OutputFormat, PcmBuffer, PlaybackNotify,
    PowerMode, Priority, ResourceNotify,
};
use chime_core::{AudioError, Result, VolumeStep};
use parking_lot::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub struct BackendSession {
    id: SessionId,
    shared: Arc<BackendShared>,
    dispatcher: Option<Dispatcher>,
    requested: bool,
    opened: bool,
    gain: Arc<Mutex<GainRamp>>,
    renderer: Option<Renderer>,
}

impl BackendSession {
    pub(crate) fn new(id: SessionId, shared: Arc<BackendShared>) -> Result<Self> {
        let dispatcher = Dispatcher::spawn(format!("chime-events-{}", id))?;
        Ok(Self {
            id,
            shared,
            dispatcher: Some(dispatcher),
            requested: false,
            opened: false,
            gain: Arc::new(Mutex::new(GainRamp::default())),
            renderer: None,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// True while a render thread is running for this session
    pub fn is_rendering(&self) -> bool {
        self.renderer.as_ref().is_some_and(|r| !r.is_finished())
    }

    fn dispatcher(&self) -> Result<&Dispatcher> {
        self.dispatcher
            .as_ref()
            .ok_or_else(|| AudioError::InvalidState("session destroyed".to_string()))
    }

    fn validate_format(format: &OutputFormat, pcm: &PcmBuffer) -> Result<()> {
        if format.container != Container::None {
            return Err(AudioError::UnsupportedFormat(format!(
                "expected raw PCM, got {:?} container",
                format.container
            )));
        }
        if format.sample_rate == 0 {
            return Err(AudioError::InvalidParam("sample rate is zero".to_string()));
        }
        if format.channels == 0 {
            return Err(AudioError::InvalidParam("channel count is zero".to_string()));
        }
        if !matches!(format.bits_per_sample, 8 | 16 | 24 | 32) {
            return Err(AudioError::UnsupportedFormat(format!(
                "{}-bit samples",
                format.bits_per_sample
            )));
        }
        if pcm.len() < format.frame_size() {
            return Err(AudioError::InvalidParam("no sample data".to_string()));
        }
        Ok(())
    }

    fn sink_factory(&self) -> SinkFactory {
        let period = self.shared.config.period();
        let use_device = self.shared.config.uses_device();
        Box::new(move |format: &OutputFormat, stop: Arc<AtomicBool>| {
            open_sink(format, period, stop, use_device)
        })
    }

    fn teardown(&mut self) {
        if self.opened {
            self.close();
        }
        if self.requested {
            self.release_resource();
        }
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.shutdown();
        }
    }
}

#[cfg(feature = "cpal")]
fn open_sink(
    format: &OutputFormat,
    period: std::time::Duration,
    stop: Arc<AtomicBool>,
    use_device: bool,
) -> Result<Box<dyn PeriodSink>> {
    if use_device {
        match crate::device::DeviceSink::open(format, period, stop) {
            Ok(sink) => return Ok(Box::new(sink)),
            Err(e) => log::warn!("{}; pacing output without a device", e),
        }
    }
    Ok(Box::new(ClockSink::new(period)))
}

#[cfg(not(feature = "cpal"))]
fn open_sink(
    _format: &OutputFormat,
    period: std::time::Duration,
    _stop: Arc<AtomicBool>,
    _use_device: bool,
) -> Result<Box<dyn PeriodSink>> {
    Ok(Box::new(ClockSink::new(period)))
}

impl AudioSession for BackendSession {
    fn request_resource(&mut self, priority: Priority, notify: ResourceNotify) -> Result<()> {
        if self.requested {
            return Err(AudioError::InvalidState("output already requested".to_string()));
        }
        let dispatcher = self.dispatcher()?;
        // Handler first: the grant can be queued before request() returns
        dispatcher.set_resource_handler(Some(notify));
        if let Err(e) = self
            .shared
            .arbiter
            .request(self.id, priority, dispatcher.sender())
        {
            dispatcher.set_resource_handler(None);
            return Err(e);
        }
        self.requested = true;
        Ok(())
    }

    fn release_resource(&mut self) {
        if !self.requested {
            return;
        }
        self.shared.arbiter.release(self.id);
        if let Some(dispatcher) = self.dispatcher.as_ref() {
            dispatcher.set_resource_handler(None);
        }
        self.requested = false;
    }

    fn open(&mut self, power_mode: PowerMode, input: InputDevice, output: OutputDevice) -> Result<()> {
        if self.opened {
            return Err(AudioError::InvalidState("session already open".to_string()));
        }
        if power_mode == PowerMode::Sleep {
            return Err(AudioError::InvalidParam("cannot open in sleep mode".to_string()));
        }
        if input != InputDevice::None {
            return Err(AudioError::InvalidParam("capture is not supported".to_string()));
        }
        if output == OutputDevice::None {
            return Err(AudioError::InvalidParam("no output device selected".to_string()));
        }
        self.opened = true;
        log::debug!("Session {} open ({:?})", self.id, power_mode);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.stop();
        }
        if let Some(dispatcher) = self.dispatcher.as_ref() {
            dispatcher.set_playback_handler(None);
        }
        if self.opened {
            self.opened = false;
            log::debug!("Session {} closed", self.id);
        }
    }

    fn play_from_memory(
        &mut self,
        format: &OutputFormat,
        pcm: PcmBuffer,
        notify: PlaybackNotify,
    ) -> Result<()> {
        if !self.opened {
            return Err(AudioError::InvalidState("session not open".to_string()));
        }
        if self.renderer.is_some() {
            return Err(AudioError::InvalidState("playback already started".to_string()));
        }
        Self::validate_format(format, &pcm)?;
        if !self.shared.arbiter.is_holder(self.id) {
            return Err(AudioError::ResourceBusy("output not held".to_string()));
        }

        let dispatcher = self.dispatcher()?;
        dispatcher.set_playback_handler(Some(notify));
        let job = RenderJob {
            format: *format,
            pcm,
            period: self.shared.config.period(),
            gain: self.gain.clone(),
            events: dispatcher.sender(),
            revoked: dispatcher.revoked_flag(),
        };
        match Renderer::spawn(job, self.sink_factory()) {
            Ok(renderer) => {
                log::debug!(
                    "Session {} rendering {} Hz, {} ch, {} bit",
                    self.id,
                    format.sample_rate,
                    format.channels,
                    format.bits_per_sample
                );
                self.renderer = Some(renderer);
                Ok(())
            }
            Err(e) => {
                dispatcher.set_playback_handler(None);
                Err(e)
            }
        }
    }

    // Output only; there is no capture path to scale
    fn set_volume(&mut self, _level_in: VolumeStep, level_out: VolumeStep) {
        log::debug!("Session {} volume {}", self.id, level_out);
        self.gain.lock().set(level_out);
    }

    fn ramp_volume(&mut self, _level_in: VolumeStep, level_out: VolumeStep, steps: u32) {
        log::debug!("Session {} volume ramp to {} over {}", self.id, level_out, steps);
        self.gain.lock().ramp_to(level_out, steps);
    }

    fn destroy(mut self) {
        self.teardown();
        log::debug!("Session {} destroyed", self.id);
    }
}

impl Drop for BackendSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
