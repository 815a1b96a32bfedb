// Audio subsystem abstraction layer
// The sound player only talks to the output resource arbiter, the session
// object and the container parser through these contracts.

use chime_core::{AudioError, Result, VolumeStep};
use std::ops::Range;
use std::sync::Arc;

/// Priority attached to an output resource request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Normal,
    High,
}

/// Power mode a session is opened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerMode {
    Full,
    Low,
    Sleep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDevice {
    None,
    Microphone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDevice {
    None,
    Normal,
}

/// Notification from the resource arbiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceEvent {
    /// Exclusive output access was granted to the session
    Granted,
    /// Access was taken away (higher priority request, device loss)
    Revoked,
}

/// Notification from the playback engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Periodic progress, nothing to do
    Ok,
    /// The first frame has been rendered
    FirstFrame,
    /// All data has been played
    Eof,
    /// Playback failed
    Error,
    /// Event code this contract does not know about
    Other(i32),
}

/// Callback for resource grants/revocations, invoked from the subsystem's context
pub type ResourceNotify = Arc<dyn Fn(ResourceEvent) + Send + Sync>;

/// Callback for playback events, invoked from the subsystem's context
pub type PlaybackNotify = Arc<dyn Fn(PlaybackEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// Raw samples, no container framing
    None,
    Wave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Pcm,
}

/// Audio format handed to the playback engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub container: Container,
    pub encoding: Encoding,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl OutputFormat {
    /// Same sample layout without any container framing
    pub fn raw(self) -> Self {
        Self {
            container: Container::None,
            encoding: Encoding::Pcm,
            ..self
        }
    }

    /// Bytes per interleaved frame
    pub fn frame_size(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }

    pub fn bytes_per_second(&self) -> usize {
        self.frame_size() * self.sample_rate as usize
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self {
            container: Container::None,
            encoding: Encoding::Pcm,
            sample_rate: 16000,
            channels: 1,
            bits_per_sample: 16,
        }
    }
}

/// Result of parsing a container header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedHeader {
    /// Offset of the first sample byte within the file
    pub data_offset: usize,
    /// Length of the sample data in bytes
    pub data_len: usize,
    pub format: OutputFormat,
}

impl ParsedHeader {
    pub fn data_range(&self) -> Range<usize> {
        self.data_offset..self.data_offset + self.data_len
    }
}

/// Container/format parser contract
pub trait ContainerParser: Send + Sync {
    /// Locate the sample data in a fully buffered file
    fn parse_header(&self, data: &[u8]) -> Result<ParsedHeader>;
}

/// Shared view of in-memory sample data.
/// The storage is freed when the last clone is dropped, so the engine can keep
/// reading while playback runs and nothing outlives the session's teardown.
#[derive(Clone)]
pub struct PcmBuffer {
    storage: Arc<[u8]>,
    range: Range<usize>,
}

impl PcmBuffer {
    pub fn new(storage: Arc<[u8]>, offset: usize, len: usize) -> Result<Self> {
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= storage.len())
            .ok_or_else(|| {
                AudioError::InvalidParam(format!(
                    "Data region {}+{} exceeds buffer of {} bytes",
                    offset,
                    len,
                    storage.len()
                ))
            })?;
        Ok(Self {
            storage,
            range: offset..end,
        })
    }

    /// Byte range of the samples within the storage
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.storage[self.range.clone()]
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Underlying storage, including any container header
    pub fn storage(&self) -> &Arc<[u8]> {
        &self.storage
    }
}

impl std::fmt::Debug for PcmBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcmBuffer")
            .field("range", &self.range)
            .field("storage_len", &self.storage.len())
            .finish()
    }
}

/// Audio session contract: one output stream plus its resource request
pub trait AudioSession: Send {
    /// Ask the arbiter for the output resource.
    /// The outcome arrives later through `notify`.
    fn request_resource(&mut self, priority: Priority, notify: ResourceNotify) -> Result<()>;

    /// Give back the resource, or withdraw a pending request
    fn release_resource(&mut self);

    /// Open the devices for playback
    fn open(&mut self, power_mode: PowerMode, input: InputDevice, output: OutputDevice)
        -> Result<()>;

    /// Stop any playback and close the devices
    fn close(&mut self);

    /// Start playing `pcm`, reporting progress through `notify`
    fn play_from_memory(
        &mut self,
        format: &OutputFormat,
        pcm: PcmBuffer,
        notify: PlaybackNotify,
    ) -> Result<()>;

    /// Set input/output volume immediately
    fn set_volume(&mut self, level_in: VolumeStep, level_out: VolumeStep);

    /// Move input/output volume to the given level over `steps` increments
    fn ramp_volume(&mut self, level_in: VolumeStep, level_out: VolumeStep, steps: u32);

    /// Tear the session down
    fn destroy(self)
    where
        Self: Sized;
}

/// Audio subsystem factory
pub trait AudioSubsystem: Send + Sync {
    type Session: AudioSession;

    /// Create a new session object; `None` if the subsystem cannot provide one
    fn create_session(&self) -> Option<Self::Session>;
}
