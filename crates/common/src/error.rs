//! Error types shared across Trashcam crates.
//!
//! Every variant maps to a user-visible notification. Platform and storage
//! layers keep their own narrower error types and convert into this one at
//! the boundary where the call was made.

use std::path::PathBuf;

/// Top-level error type for Trashcam operations.
#[derive(Debug, thiserror::Error)]
pub enum TrashcamError {
    #[error("Camera unavailable: {message}")]
    CameraUnavailable { message: String },

    #[error("Recording could not be started: {message}")]
    RecordingConstructionFailed { message: String },

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("Submission failed: {message}")]
    SubmissionFailed {
        message: String,
        /// True when the cleanup row was written before the failure.
        record_written: bool,
    },

    #[error("Invalid transition: {message}")]
    InvalidTransition { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using TrashcamError.
pub type TrashcamResult<T> = Result<T, TrashcamError>;

impl TrashcamError {
    pub fn camera_unavailable(msg: impl Into<String>) -> Self {
        Self::CameraUnavailable {
            message: msg.into(),
        }
    }

    pub fn recording_construction(msg: impl Into<String>) -> Self {
        Self::RecordingConstructionFailed {
            message: msg.into(),
        }
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence {
            message: msg.into(),
        }
    }

    pub fn submission(msg: impl Into<String>, record_written: bool) -> Self {
        Self::SubmissionFailed {
            message: msg.into(),
            record_written,
        }
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether the user can retry the same operation without changing
    /// anything first. A write the backend rejected fails the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CameraUnavailable { .. }
                | Self::RecordingConstructionFailed { .. }
                | Self::SubmissionFailed { .. }
        )
    }
}
