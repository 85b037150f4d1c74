//! Trashcam Detection
//!
//! Staged trash detection over the live camera feed:
//! - **Catalog:** The fixed set of trash types, thresholds and point values
//! - **Strategy:** Pluggable box proposal and classification
//! - **Engine:** Tick-driven progress, stage messages and terminal states
//! - **Verification:** The confirmation channel that releases the disposal
//!   hold
//!
//! The engine never owns a timer. Its owner calls [`DetectionEngine::tick`]
//! at a fixed interval and stops calling when the engine leaves
//! [`DetectionState::Detecting`].

pub mod catalog;
pub mod engine;
pub mod strategy;
pub mod types;
pub mod verification;

pub use catalog::*;
pub use engine::*;
pub use strategy::*;
pub use types::*;
pub use verification::*;
