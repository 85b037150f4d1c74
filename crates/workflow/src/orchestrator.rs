//! Step orchestration and scoring.
//!
//! The session walks an ordered list of capture steps. Each step holds at
//! most one artifact and one detection result. `advance` commits the
//! step's award into the running total; `retreat` removes exactly what was
//! committed for the step it returns to, so the total always equals the
//! sum of committed awards.

use serde::Serialize;
use trashcam_detection::{DetectionOutcome, TrashTypeDefinition};
use trashcam_model::{default_steps, Artifact, CaptureStep, DetectionPhase};
use uuid::Uuid;

/// Per-step results.
#[derive(Debug, Clone, Default)]
pub struct StepResult {
    pub artifact: Option<Artifact>,
    /// Finding-phase classification.
    pub outcome: Option<DetectionOutcome>,
    /// Disposal confirmed for this step.
    pub verified: bool,
    /// Trash type the disposal was verified against.
    pub verified_type: Option<&'static TrashTypeDefinition>,
    /// Points added to the running total when this step was advanced.
    pub committed_award: Option<u32>,
}

impl StepResult {
    fn discard(&mut self) -> Option<u32> {
        let committed = self.committed_award.take();
        *self = StepResult::default();
        committed
    }
}

/// Why `advance` did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceBlocker {
    /// No clip recorded for the step yet.
    MissingArtifact,
    /// Finding step without a classification.
    AwaitingDetection,
    /// Disposal step not yet confirmed.
    AwaitingVerification,
    /// A clip is still being recorded.
    RecordingInProgress,
    /// Every step is committed; the session is waiting for submission.
    AlreadyComplete,
}

impl std::fmt::Display for AdvanceBlocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::MissingArtifact => "record a clip for this step first",
            Self::AwaitingDetection => "wait for detection to finish",
            Self::AwaitingVerification => "wait for disposal to be verified",
            Self::RecordingInProgress => "stop recording first",
            Self::AlreadyComplete => "all steps are complete",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved to the step at `index`.
    Advanced { index: usize, award: u32 },
    /// The last step was committed; the session should be submitted.
    ReadyToSubmit { award: u32 },
    Rejected(AdvanceBlocker),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetreatOutcome {
    /// Moved back to `index`, removing `points_removed` from the total.
    SteppedBack { index: usize, points_removed: u32 },
    /// Retreated past the first step; all state was discarded.
    Exited,
}

/// One cleanup in progress.
#[derive(Debug, Clone)]
pub struct WorkflowSession {
    steps: Vec<CaptureStep>,
    results: Vec<StepResult>,
    current: usize,
    cumulative_points: u32,
    complete: bool,
    submission_id: Uuid,
}

impl WorkflowSession {
    /// A session over `steps`. An empty list falls back to the standard
    /// three steps.
    pub fn new(steps: Vec<CaptureStep>) -> Self {
        let steps = if steps.is_empty() { default_steps() } else { steps };
        let results = vec![StepResult::default(); steps.len()];
        Self {
            steps,
            results,
            current: 0,
            cumulative_points: 0,
            complete: false,
            submission_id: Uuid::new_v4(),
        }
    }

    pub fn steps(&self) -> &[CaptureStep] {
        &self.steps
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_step(&self) -> &CaptureStep {
        &self.steps[self.current]
    }

    pub fn current_phase(&self) -> DetectionPhase {
        self.current_step().kind.phase()
    }

    pub fn result(&self, index: usize) -> Option<&StepResult> {
        self.results.get(index)
    }

    pub fn current_result(&self) -> &StepResult {
        &self.results[self.current]
    }

    pub fn cumulative_points(&self) -> u32 {
        self.cumulative_points
    }

    /// Every step committed; waiting for submission.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Idempotency key for this session's submission. Stable until the
    /// session is cleared.
    pub fn submission_id(&self) -> Uuid {
        self.submission_id
    }

    /// Number of artifacts currently held across all steps.
    pub fn artifact_count(&self) -> usize {
        self.results.iter().filter(|r| r.artifact.is_some()).count()
    }

    /// Most recent classification at or before the current step.
    pub fn identified_type(&self) -> Option<&'static TrashTypeDefinition> {
        self.results[..=self.current]
            .iter()
            .rev()
            .find_map(|r| r.outcome.as_ref().map(|o| o.trash_type))
    }

    /// Estimated weight of the identified item, zero if nothing was
    /// identified.
    pub fn estimated_weight_kg(&self) -> f64 {
        self.identified_type()
            .map(|t| t.typical_weight_kg)
            .unwrap_or(0.0)
    }

    /// Forget the current step's clip and results ahead of a new
    /// recording. Committed steps are not touched.
    pub fn begin_retake(&mut self) {
        if self.complete {
            return;
        }
        self.results[self.current] = StepResult::default();
    }

    pub fn record_artifact(&mut self, artifact: Artifact) {
        if self.complete {
            tracing::debug!("Ignoring artifact: session complete");
            return;
        }
        tracing::debug!(
            step = self.current,
            artifact_id = %artifact.id,
            duration_secs = artifact.duration_secs,
            "Artifact attached to step"
        );
        self.results[self.current].artifact = Some(artifact);
    }

    /// Attach a finding-phase classification to the current step.
    pub fn record_outcome(&mut self, outcome: DetectionOutcome) {
        if self.complete || self.current_phase() != DetectionPhase::Finding {
            tracing::debug!(step = self.current, "Ignoring outcome for this step");
            return;
        }
        tracing::info!(
            step = self.current,
            trash_type = outcome.label(),
            confidence = outcome.confidence,
            "Trash identified"
        );
        self.results[self.current].outcome = Some(outcome);
    }

    /// Mark the current disposing step as confirmed.
    pub fn record_verified(&mut self) {
        if self.complete || self.current_phase() != DetectionPhase::Disposing {
            tracing::debug!(step = self.current, "Ignoring verification for this step");
            return;
        }
        let identified = self.identified_type();
        let result = &mut self.results[self.current];
        result.verified = true;
        result.verified_type = identified;
        tracing::info!(step = self.current, "Disposal verified");
    }

    /// Points the current step would commit, if it can be scored.
    pub fn award_for_current(&self) -> Option<u32> {
        let kind = self.current_step().kind;
        let result = self.current_result();
        let trash_type = match kind.phase() {
            DetectionPhase::Finding => result.outcome.as_ref()?.trash_type,
            DetectionPhase::Disposing => result.verified_type.or_else(|| self.identified_type())?,
        };
        Some(trash_type.points.for_step(kind))
    }

    pub fn can_advance(&self) -> Result<(), AdvanceBlocker> {
        if self.complete {
            return Err(AdvanceBlocker::AlreadyComplete);
        }
        let result = self.current_result();
        if result.artifact.is_none() {
            return Err(AdvanceBlocker::MissingArtifact);
        }
        match self.current_phase() {
            DetectionPhase::Finding if result.outcome.is_none() => {
                Err(AdvanceBlocker::AwaitingDetection)
            }
            DetectionPhase::Disposing if !result.verified => {
                Err(AdvanceBlocker::AwaitingVerification)
            }
            _ => Ok(()),
        }
    }

    /// Commit the current step and move on.
    pub fn advance(&mut self) -> AdvanceOutcome {
        if let Err(blocker) = self.can_advance() {
            tracing::debug!(step = self.current, %blocker, "Advance rejected");
            return AdvanceOutcome::Rejected(blocker);
        }
        // A disposal with nothing identified earlier scores zero.
        let award = self.award_for_current().unwrap_or(0);
        self.results[self.current].committed_award = Some(award);
        self.cumulative_points += award;

        if self.current + 1 == self.steps.len() {
            self.complete = true;
            tracing::info!(
                award,
                total = self.cumulative_points,
                "Final step committed; ready to submit"
            );
            AdvanceOutcome::ReadyToSubmit { award }
        } else {
            self.current += 1;
            tracing::info!(
                index = self.current,
                award,
                total = self.cumulative_points,
                "Advanced to next step"
            );
            AdvanceOutcome::Advanced {
                index: self.current,
                award,
            }
        }
    }

    /// Step back, or exit from the first step.
    pub fn retreat(&mut self) -> RetreatOutcome {
        // Undo the current step, including its own commit if the session
        // had been completed.
        if let Some(own) = self.results[self.current].discard() {
            self.cumulative_points = self.cumulative_points.saturating_sub(own);
        }
        self.complete = false;

        if self.current == 0 {
            self.clear();
            tracing::info!("Retreated past first step; session discarded");
            return RetreatOutcome::Exited;
        }

        self.current -= 1;
        let removed = self.results[self.current]
            .committed_award
            .take()
            .unwrap_or(0);
        self.cumulative_points = self.cumulative_points.saturating_sub(removed);
        tracing::info!(
            index = self.current,
            removed,
            total = self.cumulative_points,
            "Stepped back"
        );
        RetreatOutcome::SteppedBack {
            index: self.current,
            points_removed: removed,
        }
    }

    /// Discard everything and start over with a fresh submission id.
    pub fn clear(&mut self) {
        for result in &mut self.results {
            *result = StepResult::default();
        }
        self.current = 0;
        self.cumulative_points = 0;
        self.complete = false;
        self.submission_id = Uuid::new_v4();
    }

    /// Sum of all committed awards.
    pub fn committed_total(&self) -> u32 {
        self.results.iter().filter_map(|r| r.committed_award).sum()
    }

    /// Label of the trash type to persist.
    pub fn trash_type_label(&self) -> Option<&'static str> {
        self.identified_type().map(|t| t.label)
    }
}

impl Default for WorkflowSession {
    fn default() -> Self {
        Self::new(default_steps())
    }
}
