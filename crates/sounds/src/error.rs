// Synchronous failures reported by SoundPlayer::play

use chime_core::AudioError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Capacity of the stored diagnostic, terminator included
pub const ERROR_CAPACITY: usize = 128;

/// Why a play request failed. Every variant leaves no resource held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayError {
    /// No file was given
    NullArgument,

    /// A playback session is already active
    AlreadyPlaying,

    /// The file could not be opened or read in full
    FileUnreadable { path: PathBuf, source: AudioError },

    /// The container header is invalid or holds no audio
    HeaderInvalid(AudioError),

    /// The audio subsystem could not create a session object
    ObjectCreation,

    /// The resource arbiter rejected the request
    ResourceRequest(AudioError),

    /// The resource was not granted within the timeout
    ResourceTimeout(Duration),

    /// The session could not be opened
    Open(AudioError),

    /// Playback could not be started
    PlayStart(AudioError),
}

impl PlayError {
    /// Negative status code for callers across the C boundary
    pub fn status_code(&self) -> i32 {
        match self {
            PlayError::NullArgument => -1,
            PlayError::AlreadyPlaying => -2,
            PlayError::FileUnreadable { .. } => -3,
            PlayError::HeaderInvalid(_) => -4,
            PlayError::ObjectCreation => -5,
            PlayError::ResourceRequest(_) => -6,
            PlayError::ResourceTimeout(_) => -7,
            PlayError::Open(_) => -8,
            PlayError::PlayStart(_) => -9,
        }
    }

    /// Diagnostic text bounded to `ERROR_CAPACITY - 1` bytes
    pub fn diagnostic(&self) -> String {
        bounded(self.to_string())
    }
}

/// Truncate to at most `ERROR_CAPACITY - 1` bytes on a char boundary
pub fn bounded(mut msg: String) -> String {
    let limit = ERROR_CAPACITY - 1;
    if msg.len() > limit {
        let mut end = limit;
        while !msg.is_char_boundary(end) {
            end -= 1;
        }
        msg.truncate(end);
    }
    msg
}

impl fmt::Display for PlayError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlayError::NullArgument => write!(f, "NULL file param"),
            PlayError::AlreadyPlaying => write!(f, "playback in progress"),
            PlayError::FileUnreadable { path, .. } => {
                write!(f, "Unable to open wave file <{}>", path.display())
            }
            PlayError::HeaderInvalid(_) => write!(f, "Unable to parse wave header"),
            PlayError::ObjectCreation => write!(f, "unable to create object"),
            PlayError::ResourceRequest(e) => write!(f, "resource request error <{}>", e),
            PlayError::ResourceTimeout(_) => write!(f, "resource timeout"),
            PlayError::Open(e) => write!(f, "open error <{}>", e),
            PlayError::PlayStart(e) => write!(f, "play error <{}>", e),
        }
    }
}

impl std::error::Error for PlayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlayError::FileUnreadable { source, .. } => Some(source),
            PlayError::HeaderInvalid(e)
            | PlayError::ResourceRequest(e)
            | PlayError::Open(e)
            | PlayError::PlayStart(e) => Some(e),
            _ => None,
        }
    }
}
