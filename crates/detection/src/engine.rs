//! Staged detection engine.
//!
//! Progress advances by a fixed step per tick. Stage boundaries at 20, 40,
//! 60 and 80 percent change the status message; the finding phase samples
//! the frame at 20 and proposes boxes at 60. At 100 the finding phase
//! classifies and the disposing phase either verifies or holds until the
//! confirmation channel fires. Progress never decreases within a cycle.

use trashcam_common::config::DetectionDefaults;
use trashcam_model::DetectionPhase;
use trashcam_platform_core::FrameSample;

use crate::strategy::DetectionStrategy;
use crate::types::{DetectionBox, DetectionOutcome};
use crate::verification::VerificationReceiver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionState {
    None,
    Detecting,
    Detected,
    Verified,
}

/// Named stages of a detection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DetectionStage {
    AnalyzingEnvironment,
    IdentifyingObjects,
    ClassifyingMaterials,
    DeterminingType,
    AnalyzingImpact,
}

impl DetectionStage {
    pub fn for_progress(progress: u8) -> Self {
        match progress {
            0..=19 => Self::AnalyzingEnvironment,
            20..=39 => Self::IdentifyingObjects,
            40..=59 => Self::ClassifyingMaterials,
            60..=79 => Self::DeterminingType,
            _ => Self::AnalyzingImpact,
        }
    }

    /// Progress at which this stage begins.
    pub fn starts_at(&self) -> u8 {
        match self {
            Self::AnalyzingEnvironment => 0,
            Self::IdentifyingObjects => 20,
            Self::ClassifyingMaterials => 40,
            Self::DeterminingType => 60,
            Self::AnalyzingImpact => 80,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::AnalyzingEnvironment => "Analyzing environment…",
            Self::IdentifyingObjects => "Identifying objects…",
            Self::ClassifyingMaterials => "Classifying materials…",
            Self::DeterminingType => "Determining object type…",
            Self::AnalyzingImpact => "Analyzing environmental impact…",
        }
    }
}

/// Engine pacing.
#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub progress_step: u8,
    pub hold_percent: u8,
    pub max_boxes: usize,
}

impl DetectionSettings {
    pub fn from_defaults(defaults: &DetectionDefaults) -> Self {
        Self {
            progress_step: defaults.progress_step.clamp(1, 100),
            hold_percent: defaults.disposal_hold_percent.min(99),
            max_boxes: defaults.max_boxes.max(1),
        }
    }
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self::from_defaults(&DetectionDefaults::default())
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionCompletion {
    Detected(DetectionOutcome),
    Verified,
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub progress: u8,
    /// Set when this tick entered a new stage.
    pub entered_stage: Option<DetectionStage>,
    /// Set when this tick proposed boxes.
    pub boxes_proposed: bool,
    /// True while the disposal phase waits for confirmation.
    pub holding: bool,
    pub completion: Option<DetectionCompletion>,
}

pub struct DetectionEngine {
    strategy: Box<dyn DetectionStrategy>,
    settings: DetectionSettings,
    phase: Option<DetectionPhase>,
    state: DetectionState,
    progress: u8,
    stage: Option<DetectionStage>,
    boxes: Vec<DetectionBox>,
    last_frame: Option<FrameSample>,
    outcome: Option<DetectionOutcome>,
    verification: Option<VerificationReceiver>,
}

impl DetectionEngine {
    pub fn new(strategy: Box<dyn DetectionStrategy>, settings: DetectionSettings) -> Self {
        Self {
            strategy,
            settings,
            phase: None,
            state: DetectionState::None,
            progress: 0,
            stage: None,
            boxes: Vec::new(),
            last_frame: None,
            outcome: None,
            verification: None,
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    pub fn phase(&self) -> Option<DetectionPhase> {
        self.phase
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Current status line; empty when idle.
    pub fn message(&self) -> &'static str {
        self.stage.map(|s| s.message()).unwrap_or("")
    }

    pub fn boxes(&self) -> &[DetectionBox] {
        &self.boxes
    }

    pub fn outcome(&self) -> Option<&DetectionOutcome> {
        self.outcome.as_ref()
    }

    /// Frame sampled at the identification stage, if any.
    pub fn last_frame(&self) -> Option<FrameSample> {
        self.last_frame
    }

    pub fn is_running(&self) -> bool {
        self.state == DetectionState::Detecting
    }

    /// Start a new cycle, discarding any previous one.
    ///
    /// The disposing phase only completes once `verification` reports
    /// confirmed; without a receiver it holds indefinitely.
    pub fn begin(&mut self, phase: DetectionPhase, verification: Option<VerificationReceiver>) {
        self.reset();
        self.phase = Some(phase);
        self.verification = verification;
        self.state = DetectionState::Detecting;
        self.stage = Some(DetectionStage::AnalyzingEnvironment);
        tracing::debug!(?phase, strategy = self.strategy.name(), "Detection cycle started");
    }

    /// Advance one fixed step. `frame` is the current video frame, if a
    /// camera is bound. Returns `None` when no cycle is running.
    pub fn tick(&mut self, frame: Option<FrameSample>) -> Option<TickReport> {
        if self.state != DetectionState::Detecting {
            return None;
        }
        let phase = self.phase?;
        let before = self.progress;
        let verified = self.is_verified();

        let mut next = before.saturating_add(self.settings.progress_step).min(100);
        let holding = phase == DetectionPhase::Disposing && !verified && next >= self.settings.hold_percent;
        if holding {
            next = self.settings.hold_percent.max(before);
        }
        self.progress = next;

        let stage = DetectionStage::for_progress(next);
        let entered_stage = (Some(stage) != self.stage).then_some(stage);
        self.stage = Some(stage);

        let mut boxes_proposed = false;
        if phase == DetectionPhase::Finding {
            if crossed(before, next, DetectionStage::IdentifyingObjects.starts_at()) {
                self.last_frame = frame;
            }
            if crossed(before, next, DetectionStage::DeterminingType.starts_at()) {
                let size = frame.or(self.last_frame).map(|f| f.size).unwrap_or_default();
                self.boxes = self.strategy.propose_boxes(size, self.settings.max_boxes);
                boxes_proposed = true;
                tracing::debug!(count = self.boxes.len(), "Detection boxes proposed");
            }
        }

        let completion = if next >= 100 {
            Some(self.complete(phase))
        } else {
            None
        };

        Some(TickReport {
            progress: self.progress,
            entered_stage,
            boxes_proposed,
            holding,
            completion,
        })
    }

    /// Discard the boxes but keep the outcome. Used when recording stops
    /// after a completed cycle.
    pub fn clear_boxes(&mut self) {
        self.boxes.clear();
    }

    /// Return to `None`: no boxes, zero progress, no message, no cycle.
    /// Safe to call at any time.
    pub fn reset(&mut self) {
        if self.state == DetectionState::Detecting {
            tracing::debug!(progress = self.progress, "Detection cycle cancelled");
        }
        self.phase = None;
        self.state = DetectionState::None;
        self.progress = 0;
        self.stage = None;
        self.boxes.clear();
        self.last_frame = None;
        self.outcome = None;
        self.verification = None;
    }

    fn is_verified(&self) -> bool {
        self.verification
            .as_ref()
            .map(|v| v.is_confirmed())
            .unwrap_or(false)
    }

    fn complete(&mut self, phase: DetectionPhase) -> DetectionCompletion {
        match phase {
            DetectionPhase::Finding => {
                let outcome = self.strategy.classify(&self.boxes);
                tracing::info!(
                    trash_type = outcome.label(),
                    confidence = outcome.confidence,
                    "Trash detected"
                );
                self.outcome = Some(outcome.clone());
                self.state = DetectionState::Detected;
                DetectionCompletion::Detected(outcome)
            }
            DetectionPhase::Disposing => {
                tracing::info!("Disposal verified");
                self.state = DetectionState::Verified;
                DetectionCompletion::Verified
            }
        }
    }
}

fn crossed(before: u8, after: u8, threshold: u8) -> bool {
    before < threshold && after >= threshold
}
