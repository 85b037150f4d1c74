//! Trashcam platform core contracts.
//!
//! This crate contains the media-capture seams used by the capture engine
//! without coupling to a concrete camera stack: device acquisition, live
//! streams and their tracks, and the chunked recording primitive.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod simulated;

pub use simulated::{Permission, SimulatedMediaDevices, SimulatedOptions};

/// Which camera to ask the platform for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Front camera.
    User,
    /// Rear camera.
    #[default]
    Environment,
}

impl FacingMode {
    pub fn opposite(self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FacingMode::User => "user",
            FacingMode::Environment => "environment",
        }
    }
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FacingMode {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "front" => Ok(FacingMode::User),
            "environment" | "rear" | "back" => Ok(FacingMode::Environment),
            other => Err(MediaError::Unsupported(format!(
                "unknown facing mode '{other}'"
            ))),
        }
    }
}

/// Frame geometry in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

/// A still sampled from the live video sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSample {
    pub size: FrameSize,
    /// Monotonic sample counter for the bound stream.
    pub sequence: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Video,
    Audio,
}

/// Description of one track inside a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub id: String,
    pub kind: TrackKind,
    pub label: String,
}

/// Cheap, cloneable reference to a live stream. Holding a handle does not
/// keep the stream alive; only the owning [`MediaStream`] does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    pub id: u64,
    pub kind: TrackKind,
    /// Set for camera streams.
    pub facing: Option<FacingMode>,
    /// Set for camera streams.
    pub frame: Option<FrameSize>,
}

/// Errors reported by the media platform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("no such device: {0}")]
    DeviceNotFound(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("permission revoked: {0}")]
    Revoked(String),

    #[error("media failure: {0}")]
    Failed(String),
}

/// An acquired stream. Owning it owns the hardware lock.
pub trait MediaStream: Send + Sync {
    fn handle(&self) -> &StreamHandle;

    fn tracks(&self) -> &[TrackInfo];

    /// Number of tracks still delivering media.
    fn live_tracks(&self) -> usize;

    /// Stop every track. Safe to call more than once.
    fn stop_all(&mut self);
}

/// The platform recording primitive: turns a stream into binary chunks.
pub trait MediaRecorder: Send + Sync {
    /// Begin accumulating media.
    fn start(&mut self) -> Result<(), MediaError>;

    /// Next chunk made available since the last call, if any.
    fn take_chunk(&mut self) -> Option<Vec<u8>>;

    /// Stop and flush whatever has not been taken yet.
    fn finish(&mut self) -> Result<Vec<Vec<u8>>, MediaError>;

    fn mime_type(&self) -> &str;
}

/// Access to cameras, microphones and the recorder.
#[async_trait::async_trait]
pub trait MediaDevices: Send + Sync {
    /// Request a video-only stream from the camera facing `facing`.
    async fn open_camera(&self, facing: FacingMode) -> Result<Box<dyn MediaStream>, MediaError>;

    /// Request an audio-only stream.
    async fn open_microphone(&self) -> Result<Box<dyn MediaStream>, MediaError>;

    /// Construct a recorder over a video stream and optional audio stream.
    fn create_recorder(
        &self,
        video: &StreamHandle,
        audio: Option<&StreamHandle>,
    ) -> Result<Box<dyn MediaRecorder>, MediaError>;
}
