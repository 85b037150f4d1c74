//! Play/pause of an already recorded artifact.
//!
//! Capture itself is not pausable; only review playback is.

use trashcam_model::Artifact;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Paused,
    Playing,
}

/// Review player bound to one artifact.
#[derive(Debug, Clone)]
pub struct Playback {
    artifact_id: Uuid,
    state: PlaybackState,
}

impl Playback {
    /// Load an artifact; playback starts immediately, like an autoplaying
    /// preview.
    pub fn load(artifact: &Artifact) -> Self {
        Self {
            artifact_id: artifact.id,
            state: PlaybackState::Playing,
        }
    }

    pub fn artifact_id(&self) -> Uuid {
        self.artifact_id
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Flip between playing and paused; returns the new state.
    pub fn toggle(&mut self) -> PlaybackState {
        self.state = match self.state {
            PlaybackState::Playing => PlaybackState::Paused,
            PlaybackState::Paused => PlaybackState::Playing,
        };
        tracing::debug!(artifact_id = %self.artifact_id, state = ?self.state, "Playback toggled");
        self.state
    }
}
