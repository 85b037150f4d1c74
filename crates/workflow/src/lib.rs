//! Trashcam Workflow
//!
//! Drives one cleanup from first recording to persisted record:
//! - **Orchestrator:** Step order, per-step results, point commits
//! - **Submission:** Record insert and running-total update
//! - **Store:** The hosted backend seam and an in-memory implementation
//! - **Runtime:** The single-task event loop that owns the camera,
//!   recorder, detector and timers for a session

pub mod orchestrator;
pub mod runtime;
pub mod store;
pub mod submission;

pub use orchestrator::*;
pub use runtime::*;
pub use store::*;
pub use submission::*;
