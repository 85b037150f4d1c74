//! Recorded video artifacts.
//!
//! An artifact is produced exactly once per finished recording. Its bytes
//! are shared and never mutated afterwards; dropping the last clone frees
//! the underlying blob.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

/// Why a recording stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The user pressed stop.
    User,
    /// The duration ceiling was reached.
    DurationCeiling,
}

/// An immutable, playable recording.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    /// Unique artifact identifier.
    pub id: Uuid,

    /// Opaque reference suitable for a player (`blob:trashcam/<id>`).
    pub url: String,

    /// Container/codec reported by the recorder.
    pub mime_type: String,

    /// Assembled recording bytes.
    #[serde(skip)]
    pub bytes: Arc<[u8]>,

    /// Whole seconds counted while recording.
    pub duration_secs: u32,

    /// Whether a microphone track was attached.
    pub has_audio: bool,

    pub stop_reason: StopReason,

    /// Recording start (RFC 3339).
    pub recorded_at: String,
}

impl Artifact {
    /// Assemble recorder chunks into a single artifact.
    pub fn assemble(
        chunks: Vec<Vec<u8>>,
        mime_type: impl Into<String>,
        duration_secs: u32,
        has_audio: bool,
        stop_reason: StopReason,
        recorded_at: impl Into<String>,
    ) -> Self {
        let id = Uuid::new_v4();
        let bytes: Arc<[u8]> = chunks.concat().into();
        Self {
            id,
            url: format!("blob:trashcam/{id}"),
            mime_type: mime_type.into(),
            bytes,
            duration_secs,
            has_audio,
            stop_reason,
            recorded_at: recorded_at.into(),
        }
    }

    /// Size of the assembled blob.
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}
