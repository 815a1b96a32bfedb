// Error handling for the audio subsystem contracts

use std::fmt;

/// Errors reported by the audio subsystem and its collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// A parameter was rejected by the callee
    InvalidParam(String),

    /// The call is not valid in the current session state
    InvalidState(String),

    /// The output resource is held by someone else
    ResourceBusy(String),

    /// Device error (hardware or host API)
    DeviceError(String),

    /// Audio format not supported
    UnsupportedFormat(String),

    /// Malformed container data
    InvalidHeader(String),

    /// Thread/synchronization error
    ThreadError(String),

    /// IO error
    IoError(String),

    /// Generic error
    Other(String),
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AudioError::InvalidParam(msg) => write!(f, "Invalid parameter: {}", msg),
            AudioError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            AudioError::ResourceBusy(msg) => write!(f, "Resource busy: {}", msg),
            AudioError::DeviceError(msg) => write!(f, "Device error: {}", msg),
            AudioError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            AudioError::InvalidHeader(msg) => write!(f, "Invalid header: {}", msg),
            AudioError::ThreadError(msg) => write!(f, "Thread error: {}", msg),
            AudioError::IoError(msg) => write!(f, "IO error: {}", msg),
            AudioError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for AudioError {}

/// Result type alias for audio operations
pub type Result<T> = std::result::Result<T, AudioError>;

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::IoError(err.to_string())
    }
}
