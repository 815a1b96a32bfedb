// Scripted audio subsystem for exercising the player without a device

use chime_audio_api::{
    AudioSession, AudioSubsystem, InputDevice, OutputDevice, OutputFormat, PcmBuffer,
    PlaybackEvent, PlaybackNotify, PowerMode, Priority, ResourceEvent, ResourceNotify,
};
use chime_core::{AudioError, Result, VolumeStep};
use parking_lot::Mutex;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create,
    Request(Priority),
    Release,
    Open(PowerMode, InputDevice, OutputDevice),
    Close,
    Play {
        format: OutputFormat,
        range: Range<usize>,
        storage_len: usize,
    },
    SetVolume(VolumeStep, VolumeStep),
    Ramp(VolumeStep, VolumeStep, u32),
    Destroy,
}

/// What the arbiter does with a resource request
#[derive(Debug, Clone)]
pub enum Grant {
    Immediate,
    Never,
    Reject(AudioError),
}

/// What the engine does once playback starts
#[derive(Debug, Clone)]
pub enum Start {
    FirstFrame,
    Revoke,
    ErrorBeforeFrame,
    Fail(AudioError),
}

#[derive(Debug, Clone)]
pub struct Script {
    pub create_fails: bool,
    pub grant: Grant,
    pub open_error: Option<AudioError>,
    pub start: Start,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            create_fails: false,
            grant: Grant::Immediate,
            open_error: None,
            start: Start::FirstFrame,
        }
    }
}

#[derive(Default)]
struct MockInner {
    script: Mutex<Script>,
    calls: Mutex<Vec<Call>>,
    live_sessions: AtomicUsize,
    held_resources: AtomicUsize,
    open_sessions: AtomicUsize,
    buffers: Mutex<Vec<Weak<[u8]>>>,
    resource_notify: Mutex<Option<ResourceNotify>>,
    playback_notify: Mutex<Option<PlaybackNotify>>,
}

impl MockInner {
    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[derive(Clone, Default)]
pub struct MockSubsystem {
    inner: Arc<MockInner>,
}

impl MockSubsystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: Script) -> Self {
        let mock = Self::new();
        mock.set_script(script);
        mock
    }

    pub fn set_script(&self, script: Script) {
        *self.inner.script.lock() = script;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.inner.calls.lock().iter().filter(|c| pred(c)).count()
    }

    pub fn live_sessions(&self) -> usize {
        self.inner.live_sessions.load(Ordering::SeqCst)
    }

    pub fn resources_held(&self) -> usize {
        self.inner.held_resources.load(Ordering::SeqCst)
    }

    pub fn open_sessions(&self) -> usize {
        self.inner.open_sessions.load(Ordering::SeqCst)
    }

    /// Sample buffers handed to the engine that are still allocated
    pub fn buffers_alive(&self) -> usize {
        self.inner
            .buffers
            .lock()
            .iter()
            .filter(|weak| weak.upgrade().is_some())
            .count()
    }

    /// No session, resource, open device or buffer left behind
    pub fn is_clean(&self) -> bool {
        self.live_sessions() == 0
            && self.resources_held() == 0
            && self.open_sessions() == 0
            && self.buffers_alive() == 0
    }

    /// Deliver a resource event from a separate thread
    pub fn emit_resource(&self, event: ResourceEvent) {
        let notify = self.inner.resource_notify.lock().clone();
        if let Some(notify) = notify {
            thread::spawn(move || notify(event)).join().unwrap();
        }
    }

    /// Deliver a playback event from a separate thread
    pub fn emit_playback(&self, event: PlaybackEvent) {
        let notify = self.inner.playback_notify.lock().clone();
        if let Some(notify) = notify {
            thread::spawn(move || notify(event)).join().unwrap();
        }
    }
}

impl AudioSubsystem for MockSubsystem {
    type Session = MockSession;

    fn create_session(&self) -> Option<MockSession> {
        self.inner.record(Call::Create);
        if self.inner.script.lock().create_fails {
            return None;
        }
        self.inner.live_sessions.fetch_add(1, Ordering::SeqCst);
        Some(MockSession {
            inner: self.inner.clone(),
            requested: false,
            opened: false,
            pcm: None,
        })
    }
}

pub struct MockSession {
    inner: Arc<MockInner>,
    requested: bool,
    opened: bool,
    pcm: Option<PcmBuffer>,
}

impl AudioSession for MockSession {
    fn request_resource(&mut self, priority: Priority, notify: ResourceNotify) -> Result<()> {
        self.inner.record(Call::Request(priority));
        let grant = self.inner.script.lock().grant.clone();
        if let Grant::Reject(e) = &grant {
            return Err(e.clone());
        }

        self.requested = true;
        self.inner.held_resources.fetch_add(1, Ordering::SeqCst);
        *self.inner.resource_notify.lock() = Some(notify.clone());

        if let Grant::Immediate = grant {
            thread::spawn(move || notify(ResourceEvent::Granted));
        }
        Ok(())
    }

    fn release_resource(&mut self) {
        self.inner.record(Call::Release);
        if self.requested {
            self.requested = false;
            self.inner.held_resources.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn open(&mut self, power_mode: PowerMode, input: InputDevice, output: OutputDevice) -> Result<()> {
        self.inner.record(Call::Open(power_mode, input, output));
        if let Some(e) = self.inner.script.lock().open_error.clone() {
            return Err(e);
        }
        if self.opened {
            return Err(AudioError::InvalidState("already open".to_string()));
        }
        self.opened = true;
        self.inner.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        self.inner.record(Call::Close);
        if self.opened {
            self.opened = false;
            self.inner.open_sessions.fetch_sub(1, Ordering::SeqCst);
        }
        self.pcm = None;
        *self.inner.playback_notify.lock() = None;
    }

    fn play_from_memory(
        &mut self,
        format: &OutputFormat,
        pcm: PcmBuffer,
        notify: PlaybackNotify,
    ) -> Result<()> {
        self.inner.record(Call::Play {
            format: *format,
            range: pcm.range(),
            storage_len: pcm.storage().len(),
        });
        if !self.opened {
            return Err(AudioError::InvalidState("not open".to_string()));
        }
        let start = self.inner.script.lock().start.clone();
        if let Start::Fail(e) = &start {
            return Err(e.clone());
        }

        self.inner.buffers.lock().push(Arc::downgrade(pcm.storage()));
        self.pcm = Some(pcm);
        *self.inner.playback_notify.lock() = Some(notify.clone());

        match start {
            Start::FirstFrame => {
                thread::spawn(move || notify(PlaybackEvent::FirstFrame));
            }
            Start::ErrorBeforeFrame => {
                thread::spawn(move || notify(PlaybackEvent::Error));
            }
            Start::Revoke => {
                let resource = self.inner.resource_notify.lock().clone();
                if let Some(resource) = resource {
                    thread::spawn(move || resource(ResourceEvent::Revoked));
                }
            }
            Start::Fail(_) => {}
        }
        Ok(())
    }

    fn set_volume(&mut self, level_in: VolumeStep, level_out: VolumeStep) {
        self.inner.record(Call::SetVolume(level_in, level_out));
    }

    fn ramp_volume(&mut self, level_in: VolumeStep, level_out: VolumeStep, steps: u32) {
        self.inner.record(Call::Ramp(level_in, level_out, steps));
    }

    fn destroy(self) {
        self.inner.record(Call::Destroy);
        self.inner.live_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}
