//! Capture steps.
//!
//! A cleanup is recorded as an ordered sequence of short clips. Each step
//! kind decides which detection phase validates it.

use serde::{Deserialize, Serialize};

/// Which detection phase validates a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionPhase {
    /// Locate and classify trash in view.
    Finding,
    /// Confirm the trash went into a bin.
    Disposing,
}

/// The kind of action recorded at a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    ShowTrash,
    PickUp,
    Dispose,
}

impl StepKind {
    pub fn phase(&self) -> DetectionPhase {
        match self {
            StepKind::ShowTrash | StepKind::PickUp => DetectionPhase::Finding,
            StepKind::Dispose => DetectionPhase::Disposing,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::ShowTrash => "show_trash",
            StepKind::PickUp => "pick_up",
            StepKind::Dispose => "dispose",
        }
    }
}

/// Static description of one capture step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStep {
    /// Zero-based position in the workflow.
    pub index: usize,
    pub kind: StepKind,
    pub title: String,
    pub instruction: String,
}

impl CaptureStep {
    pub fn new(
        index: usize,
        kind: StepKind,
        title: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            index,
            kind,
            title: title.into(),
            instruction: instruction.into(),
        }
    }
}

/// The standard three-step cleanup: show, pick up, dispose.
pub fn default_steps() -> Vec<CaptureStep> {
    vec![
        CaptureStep::new(
            0,
            StepKind::ShowTrash,
            "Show the trash",
            "Point your camera at the litter you found.",
        ),
        CaptureStep::new(
            1,
            StepKind::PickUp,
            "Pick it up",
            "Record yourself picking the item up.",
        ),
        CaptureStep::new(
            2,
            StepKind::Dispose,
            "Dispose of it properly",
            "Film the item going into the right bin.",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_steps_are_indexed_in_order() {
        let steps = default_steps();
        assert_eq!(steps.len(), 3);
        for (i, step) in steps.iter().enumerate() {
            assert_eq!(step.index, i);
        }
        assert_eq!(steps[2].kind.phase(), DetectionPhase::Disposing);
    }

    #[test]
    fn test_only_dispose_uses_disposing_phase() {
        assert_eq!(StepKind::ShowTrash.phase(), DetectionPhase::Finding);
        assert_eq!(StepKind::PickUp.phase(), DetectionPhase::Finding);
        assert_eq!(StepKind::Dispose.phase(), DetectionPhase::Disposing);
    }
}
