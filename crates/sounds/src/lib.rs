// Single-instance sound playback over a shared, arbitrated audio output

pub mod config;
pub mod error;
pub mod player;
pub mod signal;

#[cfg(test)]
mod mock;

pub use chime_core::{EndReason, PlayerState, SoundCallback, VolumeStep, VOLUME_MAX, VOLUME_MIN};
pub use config::SoundConfig;
pub use error::{PlayError, ERROR_CAPACITY};
pub use player::SoundPlayer;
pub use signal::Signal;
