// Core types shared by the chime sound player crates

pub mod callback;
pub mod error;
pub mod loader;
pub mod state;
pub mod volume;

// Re-export commonly used types
pub use callback::{CompletionSlot, EndReason, SoundCallback};
pub use error::{AudioError, Result};
pub use loader::load_file_contents;
pub use state::PlayerState;
pub use volume::{VolumeControl, VolumeStep, VOLUME_MAX, VOLUME_MIN};
