//! Trashcam Capture Engine
//!
//! Owns the camera and turns it into short recorded clips. The capture
//! manager holds the only reference to the live camera stream; the
//! recording machine borrows it for the duration of each call.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               CaptureManager                 │
//! │  MediaDevices ──► MediaStream ──► VideoSink  │
//! └───────────────────────┬──────────────────────┘
//!                         │ &mut borrow
//!                         ▼
//! ┌──────────────────────────────────────────────┐
//! │             RecordingMachine                 │
//! │  Idle ──start──► Recording ──stop/ceiling──► │
//! │                  (1 Hz ticks)     Artifact   │
//! └──────────────────────────────────────────────┘
//! ```

pub mod capture;
pub mod playback;
pub mod recording;

pub use capture::*;
pub use playback::*;
pub use recording::*;
