// Single-instance sound playback through the shared audio output
//
// play() runs the whole start-up protocol on the caller's thread:
// load → parse → create session → request resource → wait for grant →
// open → play from memory → wait for first frame.
// Grants, revocations and playback events arrive on the audio subsystem's
// context and only touch SessionShared.

use crate::config::SoundConfig;
use crate::error::PlayError;
use crate::signal::Signal;
use chime_audio_api::{
    AudioSession, AudioSubsystem, ContainerParser, PcmBuffer, PlaybackEvent, PlaybackNotify,
    ResourceEvent, ResourceNotify,
};
use chime_core::{
    load_file_contents, AudioError, CompletionSlot, EndReason, PlayerState, SoundCallback,
    VolumeControl, VolumeStep,
};
use chime_wave::WaveParser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// State shared with the audio subsystem's callbacks for one play attempt
struct SessionShared {
    grant: Signal,
    first_frame: Signal,
    completion: CompletionSlot,
}

impl SessionShared {
    fn new(callback: Option<SoundCallback>) -> Self {
        Self {
            grant: Signal::new(),
            first_frame: Signal::new(),
            completion: CompletionSlot::new(callback),
        }
    }

    fn on_resource_event(&self, event: ResourceEvent) {
        match event {
            ResourceEvent::Granted => {
                log::debug!("Output resource granted");
                self.grant.post();
            }
            ResourceEvent::Revoked => {
                log::warn!("Output resource revoked");
                self.finish(EndReason::Revoked);
            }
        }
    }

    fn finish(&self, reason: EndReason) {
        // play() may still be waiting for a first frame that will never come
        self.first_frame.post();
        self.completion.deliver(reason);
    }

    fn on_playback_event(&self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Ok => {}
            PlaybackEvent::FirstFrame => {
                log::debug!("First frame rendered");
                self.first_frame.post();
            }
            PlaybackEvent::Eof => {
                log::info!("Sound playback complete");
                self.finish(EndReason::Done);
            }
            PlaybackEvent::Error => {
                log::error!("Sound playback error");
                self.finish(EndReason::Error);
            }
            PlaybackEvent::Other(code) => {
                log::error!("Unexpected playback event {}", code);
                self.finish(EndReason::Error);
            }
        }
    }
}

/// A session that made it through start-up
struct ActiveSession<T> {
    session: T,
    // Keeps the sample data alive while the engine reads it
    _pcm: PcmBuffer,
    shared: Arc<SessionShared>,
}

/// Close/release/destroy in reverse order of acquisition
fn unwind<T: AudioSession>(mut session: T, resource_requested: bool, opened: bool) {
    if opened {
        session.close();
    }
    if resource_requested {
        session.release_resource();
    }
    session.destroy();
}

/// Plays one short sound at a time through a shared, arbitrated output.
///
/// The player owns at most one session. A second `play` while a session is
/// active is rejected, not queued. The session stays alive after the sound
/// ends until [`SoundPlayer::stop`] is called, typically in response to the
/// completion callback.
pub struct SoundPlayer<S: AudioSubsystem> {
    subsystem: S,
    parser: Box<dyn ContainerParser>,
    config: SoundConfig,
    volume: VolumeControl,
    state: PlayerState,
    active: Option<ActiveSession<S::Session>>,
    last_error: String,
    #[cfg(test)]
    loaded: Vec<std::sync::Weak<[u8]>>,
}

impl<S: AudioSubsystem> SoundPlayer<S> {
    pub fn new(subsystem: S) -> Self {
        Self::with_config(subsystem, SoundConfig::default())
    }

    pub fn with_config(subsystem: S, config: SoundConfig) -> Self {
        Self::with_parser(subsystem, config, Box::new(WaveParser::new()))
    }

    pub fn with_parser(subsystem: S, config: SoundConfig, parser: Box<dyn ContainerParser>) -> Self {
        Self {
            subsystem,
            parser,
            config,
            volume: VolumeControl::default(),
            state: PlayerState::Idle,
            active: None,
            last_error: String::new(),
            #[cfg(test)]
            loaded: Vec::new(),
        }
    }

    pub fn subsystem(&self) -> &S {
        &self.subsystem
    }

    pub fn config(&self) -> &SoundConfig {
        &self.config
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    /// True while a session exists, whether or not the sound is still audible
    pub fn is_playing(&self) -> bool {
        self.active.is_some()
    }

    /// Diagnostic of the most recent failed `play`, empty after a success
    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    pub fn volume_step(&self) -> VolumeStep {
        self.volume.step()
    }

    /// Play `file` and return once its first frame has been rendered.
    ///
    /// Blocks for at most `timeout` waiting for the output resource, then
    /// until the first frame plays or the resource is revoked. `callback`
    /// receives exactly one [`EndReason`] once playback ends, on the audio
    /// subsystem's context. It is dropped without being called if `play`
    /// fails or if `stop` runs first.
    pub fn play(
        &mut self,
        file: impl AsRef<Path>,
        timeout: Duration,
        volume_step: VolumeStep,
        callback: Option<SoundCallback>,
    ) -> Result<(), PlayError> {
        self.last_error.clear();
        let file = file.as_ref();

        let result = self.try_play(file, timeout, volume_step, callback);
        if let Err(err) = &result {
            log::error!("Failed to play {}: {}", file.display(), err);
            self.last_error = err.diagnostic();
        }
        result
    }

    fn try_play(
        &mut self,
        file: &Path,
        timeout: Duration,
        volume_step: VolumeStep,
        callback: Option<SoundCallback>,
    ) -> Result<(), PlayError> {
        if file.as_os_str().is_empty() {
            return Err(PlayError::NullArgument);
        }
        if self.active.is_some() {
            return Err(PlayError::AlreadyPlaying);
        }

        log::info!("Playing {} (timeout {:?})", file.display(), timeout);
        self.volume.set(volume_step);
        self.set_state(PlayerState::Loading);

        match self.start_session(file, timeout, callback) {
            Ok(active) => {
                self.active = Some(active);
                self.set_state(PlayerState::Playing);
                Ok(())
            }
            Err(err) => {
                self.set_state(PlayerState::Idle);
                Err(err)
            }
        }
    }

    fn start_session(
        &mut self,
        file: &Path,
        timeout: Duration,
        callback: Option<SoundCallback>,
    ) -> Result<ActiveSession<S::Session>, PlayError> {
        let contents = load_file_contents(file).map_err(|source| PlayError::FileUnreadable {
            path: file.to_path_buf(),
            source,
        })?;

        let storage: Arc<[u8]> = Arc::from(contents);
        #[cfg(test)]
        self.loaded.push(Arc::downgrade(&storage));

        let header = self
            .parser
            .parse_header(&storage)
            .map_err(PlayError::HeaderInvalid)?;
        if header.data_len == 0 {
            return Err(PlayError::HeaderInvalid(AudioError::InvalidHeader(
                "no audio data".to_string(),
            )));
        }

        // The buffer is released when the last PcmBuffer clone goes away,
        // on every return path below
        let pcm = PcmBuffer::new(storage, header.data_offset, header.data_len)
            .map_err(PlayError::HeaderInvalid)?;

        let mut session = self
            .subsystem
            .create_session()
            .ok_or(PlayError::ObjectCreation)?;

        let shared = Arc::new(SessionShared::new(callback));
        self.set_state(PlayerState::AwaitingGrant);

        let resource_notify: ResourceNotify = {
            let shared = Arc::clone(&shared);
            Arc::new(move |event: ResourceEvent| shared.on_resource_event(event))
        };
        if let Err(e) = session.request_resource(self.config.priority, resource_notify) {
            shared.completion.clear();
            unwind(session, false, false);
            return Err(PlayError::ResourceRequest(e));
        }

        log::debug!("Waiting up to {:?} for the output resource", timeout);
        if !shared.grant.wait_timeout(timeout) {
            log::warn!("Output resource not granted within {:?}", timeout);
            shared.completion.clear();
            unwind(session, true, false);
            return Err(PlayError::ResourceTimeout(timeout));
        }
        self.set_state(PlayerState::Starting);

        if let Err(e) = session.open(self.config.power_mode, self.config.input, self.config.output) {
            shared.completion.clear();
            unwind(session, true, false);
            return Err(PlayError::Open(e));
        }

        let step = self.volume.step();
        session.set_volume(step, step);

        let format = header.format.raw();
        let playback_notify: PlaybackNotify = {
            let shared = Arc::clone(&shared);
            Arc::new(move |event: PlaybackEvent| shared.on_playback_event(event))
        };
        if let Err(e) = session.play_from_memory(&format, pcm.clone(), playback_notify) {
            shared.completion.clear();
            unwind(session, true, true);
            return Err(PlayError::PlayStart(e));
        }

        shared.first_frame.wait();
        log::info!("Sound playback started");

        Ok(ActiveSession {
            session,
            _pcm: pcm,
            shared,
        })
    }

    /// File buffers loaded so far, and how many of them are still referenced
    #[cfg(test)]
    fn loaded_buffers(&self) -> (usize, usize) {
        let alive = self.loaded.iter().filter(|b| b.strong_count() > 0).count();
        (self.loaded.len(), alive)
    }

    /// Tear down the active session, if any.
    ///
    /// Must not be called from inside the completion callback: the callback
    /// runs on the subsystem's context, which the teardown waits on.
    pub fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        log::info!("Stopping sound playback");

        let ActiveSession {
            session,
            _pcm: pcm,
            shared,
        } = active;
        unwind(session, true, true);
        shared.completion.clear();
        drop(pcm);

        self.set_state(PlayerState::Idle);
    }

    /// Raise the persisted volume by one step.
    /// Returns `VOLUME_MAX + 1` if it was already at the maximum.
    pub fn volume_up(&mut self) -> VolumeStep {
        let result = self.volume.up();
        self.apply_live_volume();
        result
    }

    /// Lower the persisted volume by one step.
    /// Returns `VOLUME_MIN - 1` if it was already at the minimum.
    pub fn volume_down(&mut self) -> VolumeStep {
        let result = self.volume.down();
        self.apply_live_volume();
        result
    }

    fn apply_live_volume(&mut self) {
        let step = self.volume.step();
        if let Some(active) = self.active.as_mut() {
            active.session.ramp_volume(step, step, 1);
        }
    }

    fn set_state(&mut self, to: PlayerState) {
        if let Err(e) = self.state.validate_transition(to) {
            log::warn!("{}", e);
        }
        log::debug!("Sound player state: {:?} -> {:?}", self.state, to);
        self.state = to;
    }
}

impl<S: AudioSubsystem> Drop for SoundPlayer<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
