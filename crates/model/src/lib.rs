//! Trashcam Data Model
//!
//! Defines the data contracts shared by the capture, detection and workflow
//! crates:
//! - **Artifact:** An immutable recorded video segment
//! - **Steps:** The ordered capture steps of one cleanup
//! - **Records:** The persisted cleanup row and the user's profile totals

pub mod artifact;
pub mod record;
pub mod step;

pub use artifact::*;
pub use record::*;
pub use step::*;
