// Sound player lifecycle state

use crate::error::{AudioError, Result};

/// Player state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    /// No session exists
    #[default]
    Idle,
    /// Reading and parsing the sound file
    Loading,
    /// Session created, waiting for the output resource grant
    AwaitingGrant,
    /// Resource granted, opening the session and waiting for the first frame
    Starting,
    /// Playback handed to the audio subsystem
    Playing,
}

impl PlayerState {
    /// True while a session object exists
    pub fn has_session(self) -> bool {
        matches!(
            self,
            PlayerState::AwaitingGrant | PlayerState::Starting | PlayerState::Playing
        )
    }

    pub fn validate_transition(self, to: PlayerState) -> Result<()> {
        match (self, to) {
            (PlayerState::Idle, PlayerState::Loading) => Ok(()),

            (PlayerState::Loading, PlayerState::AwaitingGrant) => Ok(()),
            (PlayerState::Loading, PlayerState::Idle) => Ok(()),

            (PlayerState::AwaitingGrant, PlayerState::Starting) => Ok(()),
            (PlayerState::AwaitingGrant, PlayerState::Idle) => Ok(()),

            (PlayerState::Starting, PlayerState::Playing) => Ok(()),
            (PlayerState::Starting, PlayerState::Idle) => Ok(()),

            (PlayerState::Playing, PlayerState::Idle) => Ok(()),

            _ => Err(AudioError::InvalidState(format!(
                "Invalid state transition from {:?} to {:?}",
                self, to
            ))),
        }
    }
}
