//! Session event loop.
//!
//! One task owns everything that mutates during a cleanup: the camera,
//! the recording machine, the detection engine, the step orchestrator and
//! the timers that drive them. Commands arrive on an mpsc channel and
//! events leave on another. Timers live in `Option` slots; disarming a
//! timer is setting its slot to `None`, and a tick that arrives after the
//! owning machine left its active state is ignored by the machine itself.

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use trashcam_capture_engine::{
    CaptureManager, Playback, PlaybackState, RecorderSettings, RecordingMachine, RecordingTick,
};
use trashcam_common::config::AppConfig;
use trashcam_common::error::TrashcamError;
use trashcam_detection::{
    verification_channel, DetectionBox, DetectionCompletion, DetectionEngine, DetectionOutcome,
    DetectionSettings, DetectionState, DetectionStrategy, VerificationSender,
};
use trashcam_model::{
    default_steps, Artifact, CaptureStep, DetectionPhase, GeoPoint, StopReason, UserId,
};
use trashcam_platform_core::{FacingMode, MediaDevices};
use uuid::Uuid;

use crate::orchestrator::{AdvanceBlocker, AdvanceOutcome, RetreatOutcome, WorkflowSession};
use crate::store::CleanupStore;
use crate::submission::{SubmissionReceipt, Submitter};

/// Everything a session needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub facing: FacingMode,
    pub recorder: RecorderSettings,
    pub detection: DetectionSettings,
    pub recording_tick: Duration,
    pub detection_tick: Duration,
    /// Auto-confirm a disposal this long after its clip exists.
    pub disposal_fallback: Option<Duration>,
    pub steps: Vec<CaptureStep>,
    /// Authenticated identity; submission is refused without one.
    pub user: Option<UserId>,
    pub location: GeoPoint,
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let facing = config
            .capture
            .facing_mode
            .parse()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Invalid facing mode in config; using rear camera");
                FacingMode::default()
            });
        Self {
            facing,
            recorder: RecorderSettings::from_defaults(
                &config.recording,
                config.capture.record_audio,
            ),
            detection: DetectionSettings::from_defaults(&config.detection),
            recording_tick: Duration::from_millis(config.recording.tick_interval_ms.max(1)),
            detection_tick: Duration::from_millis(config.detection.tick_interval_ms.max(1)),
            disposal_fallback: config
                .detection
                .disposal_fallback_secs
                .map(Duration::from_secs),
            steps: default_steps(),
            user: None,
            location: GeoPoint::default(),
        }
    }

    pub fn with_user(mut self, user: UserId) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = location;
        self
    }

    pub fn with_disposal_fallback(mut self, fallback: Option<Duration>) -> Self {
        self.disposal_fallback = fallback;
        self
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// User intents accepted by a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Re-request the camera after a failure.
    AcquireCamera,
    SwitchCamera,
    StartRecording,
    StopRecording,
    /// Confirm that the item went into the bin.
    ConfirmDisposal,
    TogglePlayback,
    Advance,
    Retreat,
    /// Retry a failed submission.
    Submit,
    Close,
}

/// Notifications emitted by a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    CameraReady {
        facing: FacingMode,
    },
    CameraUnavailable {
        message: String,
    },
    RecordingStarted {
        step: usize,
        audio: bool,
    },
    RecordingProgress {
        step: usize,
        elapsed_secs: u32,
        remaining_secs: u32,
    },
    RecordingFinished {
        step: usize,
        artifact_id: Uuid,
        duration_secs: u32,
        size_bytes: usize,
        reason: StopReason,
    },
    DetectionProgress {
        progress: u8,
        message: &'static str,
    },
    BoxesProposed {
        boxes: Vec<DetectionBox>,
    },
    TrashDetected {
        step: usize,
        outcome: DetectionOutcome,
    },
    /// Recording stopped before the finding cycle finished.
    DetectionDiscarded {
        step: usize,
    },
    DisposalHolding {
        progress: u8,
    },
    DisposalVerified {
        step: usize,
    },
    StepAdvanced {
        index: usize,
        award: u32,
        cumulative_points: u32,
    },
    AdvanceRejected {
        reason: AdvanceBlocker,
    },
    SteppedBack {
        index: usize,
        points_removed: u32,
        cumulative_points: u32,
    },
    ReadyToSubmit {
        cumulative_points: u32,
    },
    Submitted {
        receipt: SubmissionReceipt,
    },
    PlaybackToggled {
        playing: bool,
    },
    Notice {
        message: String,
        retryable: bool,
    },
    Exited,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Submitted(SubmissionReceipt),
    /// The user backed out of the first step.
    Exited,
    /// Closed by command or because every handle was dropped.
    Closed,
}

/// Sending side of a session's command channel.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { commands: tx }, rx)
    }

    /// Queue a command. Returns `false` once the session has ended.
    pub fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).is_ok()
    }
}

pub struct CleanupSession {
    settings: SessionSettings,
    capture: CaptureManager,
    recorder: RecordingMachine,
    detection: DetectionEngine,
    workflow: WorkflowSession,
    submitter: Submitter,
    playback: Option<Playback>,
    verification: Option<VerificationSender>,
    hold_announced: bool,

    recording_timer: Option<Interval>,
    detection_timer: Option<Interval>,
    fallback: Option<Pin<Box<Sleep>>>,

    events: mpsc::UnboundedSender<SessionEvent>,
}

impl CleanupSession {
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        store: Arc<dyn CleanupStore>,
        strategy: Box<dyn DetectionStrategy>,
        settings: SessionSettings,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let session = Self {
            capture: CaptureManager::new(devices, settings.facing),
            recorder: RecordingMachine::new(settings.recorder.clone()),
            detection: DetectionEngine::new(strategy, settings.detection.clone()),
            workflow: WorkflowSession::new(settings.steps.clone()),
            submitter: Submitter::new(store),
            playback: None,
            verification: None,
            hold_announced: false,
            recording_timer: None,
            detection_timer: None,
            fallback: None,
            events,
            settings,
        };
        (session, events_rx)
    }

    pub fn workflow(&self) -> &WorkflowSession {
        &self.workflow
    }

    pub fn capture(&self) -> &CaptureManager {
        &self.capture
    }

    pub fn recorder(&self) -> &RecordingMachine {
        &self.recorder
    }

    pub fn detection(&self) -> &DetectionEngine {
        &self.detection
    }

    pub fn playback_state(&self) -> Option<PlaybackState> {
        self.playback.as_ref().map(|p| p.state())
    }

    /// Whether any timer slot is armed.
    pub fn timers_armed(&self) -> bool {
        self.recording_timer.is_some() || self.detection_timer.is_some() || self.fallback.is_some()
    }

    /// Acquire the camera with the configured facing mode.
    pub async fn open(&mut self) -> Result<(), TrashcamError> {
        let facing = self.capture.facing();
        match self.capture.acquire(facing).await {
            Ok(_) => {
                self.emit(SessionEvent::CameraReady { facing });
                Ok(())
            }
            Err(e) => {
                self.camera_failed(&e);
                Err(e)
            }
        }
    }

    /// Drive the session until it is submitted, exited or closed.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    ) -> SessionOutcome {
        tracing::info!(
            steps = self.workflow.steps().len(),
            strategy = self.detection.strategy_name(),
            "Cleanup session started"
        );

        let outcome = loop {
            let exit = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => {
                        self.shutdown();
                        Some(SessionOutcome::Closed)
                    }
                },
                _ = next_tick(&mut self.recording_timer) => {
                    self.on_recording_tick();
                    None
                }
                _ = next_tick(&mut self.detection_timer) => {
                    self.on_detection_tick();
                    None
                }
                _ = fallback_elapsed(&mut self.fallback) => {
                    self.on_fallback();
                    None
                }
            };
            if let Some(outcome) = exit {
                break outcome;
            }
        };

        tracing::info!(?outcome, "Cleanup session ended");
        outcome
    }

    /// Apply one command. Returns the outcome when the command ended the
    /// session.
    pub async fn handle(&mut self, command: SessionCommand) -> Option<SessionOutcome> {
        tracing::debug!(?command, step = self.workflow.current_index(), "Session command");
        match command {
            SessionCommand::AcquireCamera => {
                if self.recorder.is_recording() {
                    self.notice(&TrashcamError::invalid_transition(
                        "cannot change camera while recording",
                    ));
                } else {
                    let _ = self.open().await;
                }
            }
            SessionCommand::SwitchCamera => self.switch_camera().await,
            SessionCommand::StartRecording => self.start_recording().await,
            SessionCommand::StopRecording => self.stop_recording(),
            SessionCommand::ConfirmDisposal => self.confirm_disposal(),
            SessionCommand::TogglePlayback => self.toggle_playback(),
            SessionCommand::Advance => return self.advance().await,
            SessionCommand::Retreat => return self.retreat(),
            SessionCommand::Submit => return self.submit().await,
            SessionCommand::Close => {
                self.shutdown();
                return Some(SessionOutcome::Closed);
            }
        }
        None
    }

    /// Stop recording and detection, disarm every timer and release the
    /// camera. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        self.recorder.abort(&mut self.capture);
        self.recording_timer = None;
        self.reset_step_state();
        self.capture.release();
    }

    async fn switch_camera(&mut self) {
        if self.recorder.is_recording() {
            self.notice(&TrashcamError::invalid_transition(
                "cannot switch camera while recording",
            ));
            return;
        }
        match self.capture.switch_facing().await {
            Ok(_) => self.emit(SessionEvent::CameraReady {
                facing: self.capture.facing(),
            }),
            Err(e) => self.camera_failed(&e),
        }
    }

    async fn start_recording(&mut self) {
        if self.workflow.is_complete() {
            self.notice(&TrashcamError::invalid_transition(
                "all steps are recorded; submit or go back",
            ));
            return;
        }
        match self.recorder.start(&mut self.capture).await {
            Ok(true) => {}
            Ok(false) => {
                if !self.recorder.is_recording() {
                    self.notice(&TrashcamError::camera_unavailable("camera is not ready"));
                }
                return;
            }
            Err(e) => {
                self.notice(&e);
                return;
            }
        }

        let retake = self.workflow.current_result().artifact.is_some();
        self.workflow.begin_retake();
        self.playback = None;
        self.fallback = None;
        self.recording_timer = Some(periodic(self.settings.recording_tick));

        let phase = self.workflow.current_phase();
        let receiver = match phase {
            DetectionPhase::Finding => {
                self.verification = None;
                None
            }
            DetectionPhase::Disposing => {
                // A confirmation latched before the first take carries into it.
                let sender = match self.verification.take() {
                    Some(latched) if !retake => latched,
                    _ => verification_channel().0,
                };
                let receiver = sender.subscribe();
                self.verification = Some(sender);
                Some(receiver)
            }
        };
        self.detection.begin(phase, receiver);
        self.hold_announced = false;
        self.detection_timer = Some(periodic(self.settings.detection_tick));

        self.emit(SessionEvent::RecordingStarted {
            step: self.workflow.current_index(),
            audio: self.recorder.has_audio(),
        });
    }

    fn stop_recording(&mut self) {
        match self.recorder.stop(&mut self.capture) {
            Ok(Some(artifact)) => self.finish_recording(artifact),
            Ok(None) => {}
            Err(e) => self.recording_failed(&e),
        }
    }

    fn finish_recording(&mut self, artifact: Artifact) {
        self.recording_timer = None;
        let step = self.workflow.current_index();
        self.emit(SessionEvent::RecordingFinished {
            step,
            artifact_id: artifact.id,
            duration_secs: artifact.duration_secs,
            size_bytes: artifact.size_bytes(),
            reason: artifact.stop_reason,
        });
        self.playback = Some(Playback::load(&artifact));
        self.workflow.record_artifact(artifact);

        match self.workflow.current_phase() {
            DetectionPhase::Finding => {
                if self.detection.state() == DetectionState::Detected {
                    self.detection.clear_boxes();
                } else {
                    if self.detection.is_running() {
                        self.emit(SessionEvent::DetectionDiscarded { step });
                    }
                    self.detection.reset();
                    self.detection_timer = None;
                }
            }
            DetectionPhase::Disposing => {
                if let Some(delay) = self.settings.disposal_fallback {
                    if !self.workflow.current_result().verified {
                        tracing::debug!(?delay, "Disposal fallback armed");
                        self.fallback = Some(Box::pin(tokio::time::sleep(delay)));
                    }
                }
            }
        }
    }

    fn recording_failed(&mut self, e: &TrashcamError) {
        self.recording_timer = None;
        self.detection.reset();
        self.detection_timer = None;
        self.verification = None;
        self.notice(e);
    }

    fn on_recording_tick(&mut self) {
        match self.recorder.tick(&mut self.capture) {
            Ok(RecordingTick::Running {
                elapsed_secs,
                remaining_secs,
            }) => {
                self.emit(SessionEvent::RecordingProgress {
                    step: self.workflow.current_index(),
                    elapsed_secs,
                    remaining_secs,
                });
            }
            Ok(RecordingTick::AutoStopped(artifact)) => self.finish_recording(artifact),
            Ok(RecordingTick::Ignored) => self.recording_timer = None,
            Err(e) => self.recording_failed(&e),
        }
    }

    fn on_detection_tick(&mut self) {
        let frame = self.capture.sample_frame();
        let Some(report) = self.detection.tick(frame) else {
            self.detection_timer = None;
            return;
        };
        let step = self.workflow.current_index();

        if let Some(stage) = report.entered_stage {
            self.emit(SessionEvent::DetectionProgress {
                progress: report.progress,
                message: stage.message(),
            });
        }
        if report.boxes_proposed {
            self.emit(SessionEvent::BoxesProposed {
                boxes: self.detection.boxes().to_vec(),
            });
        }
        if report.holding && !self.hold_announced {
            self.hold_announced = true;
            self.emit(SessionEvent::DisposalHolding {
                progress: report.progress,
            });
        }

        match report.completion {
            Some(DetectionCompletion::Detected(outcome)) => {
                self.detection_timer = None;
                self.workflow.record_outcome(outcome.clone());
                self.emit(SessionEvent::TrashDetected { step, outcome });
            }
            Some(DetectionCompletion::Verified) => {
                self.detection_timer = None;
                self.fallback = None;
                self.verification = None;
                self.workflow.record_verified();
                self.emit(SessionEvent::DisposalVerified { step });
            }
            None => {}
        }
    }

    fn on_fallback(&mut self) {
        self.fallback = None;
        tracing::info!("Disposal fallback elapsed; confirming automatically");
        self.confirm_disposal();
    }

    fn confirm_disposal(&mut self) {
        let step = self.workflow.current_index();
        if let Some(sender) = &self.verification {
            if sender.confirm() {
                tracing::info!(step, "Disposal confirmed");
            }
            return;
        }
        let awaiting = self.workflow.current_phase() == DetectionPhase::Disposing
            && !self.workflow.is_complete()
            && !self.workflow.current_result().verified;
        if !awaiting {
            tracing::debug!("No disposal awaiting confirmation");
            return;
        }
        let (sender, _) = verification_channel();
        sender.confirm();
        self.verification = Some(sender);
        tracing::info!(step, "Disposal confirmed ahead of its recording");
    }

    fn toggle_playback(&mut self) {
        if let Some(playback) = self.playback.as_mut() {
            let playing = playback.toggle() == PlaybackState::Playing;
            self.emit(SessionEvent::PlaybackToggled { playing });
        }
    }

    async fn advance(&mut self) -> Option<SessionOutcome> {
        if self.recorder.is_recording() {
            self.emit(SessionEvent::AdvanceRejected {
                reason: AdvanceBlocker::RecordingInProgress,
            });
            return None;
        }
        match self.workflow.advance() {
            AdvanceOutcome::Advanced { index, award } => {
                self.reset_step_state();
                self.emit(SessionEvent::StepAdvanced {
                    index,
                    award,
                    cumulative_points: self.workflow.cumulative_points(),
                });
                None
            }
            AdvanceOutcome::ReadyToSubmit { .. } => {
                self.reset_step_state();
                self.emit(SessionEvent::ReadyToSubmit {
                    cumulative_points: self.workflow.cumulative_points(),
                });
                self.submit().await
            }
            AdvanceOutcome::Rejected(reason) => {
                self.emit(SessionEvent::AdvanceRejected { reason });
                None
            }
        }
    }

    fn retreat(&mut self) -> Option<SessionOutcome> {
        if self.recorder.is_recording() {
            self.recorder.abort(&mut self.capture);
            self.recording_timer = None;
        }
        self.reset_step_state();
        match self.workflow.retreat() {
            RetreatOutcome::SteppedBack {
                index,
                points_removed,
            } => {
                self.playback = self
                    .workflow
                    .current_result()
                    .artifact
                    .as_ref()
                    .map(Playback::load);
                self.emit(SessionEvent::SteppedBack {
                    index,
                    points_removed,
                    cumulative_points: self.workflow.cumulative_points(),
                });
                None
            }
            RetreatOutcome::Exited => {
                self.shutdown();
                self.emit(SessionEvent::Exited);
                Some(SessionOutcome::Exited)
            }
        }
    }

    async fn submit(&mut self) -> Option<SessionOutcome> {
        if !self.workflow.is_complete() {
            self.notice(&TrashcamError::invalid_transition(
                "nothing to submit until every step is complete",
            ));
            return None;
        }
        let result = self
            .submitter
            .submit(
                &mut self.workflow,
                self.settings.user.as_ref(),
                self.settings.location,
            )
            .await;
        match result {
            Ok(receipt) => {
                self.shutdown();
                self.emit(SessionEvent::Submitted {
                    receipt: receipt.clone(),
                });
                Some(SessionOutcome::Submitted(receipt))
            }
            Err(e) => {
                self.notice(&e);
                None
            }
        }
    }

    fn reset_step_state(&mut self) {
        self.detection.reset();
        self.detection_timer = None;
        self.fallback = None;
        self.verification = None;
        self.playback = None;
        self.hold_announced = false;
    }

    fn camera_failed(&mut self, e: &TrashcamError) {
        tracing::warn!(error = %e, "Camera unavailable");
        self.emit(SessionEvent::CameraUnavailable {
            message: e.to_string(),
        });
    }

    fn notice(&self, e: &TrashcamError) {
        tracing::warn!(error = %e, "Session notice");
        self.emit(SessionEvent::Notice {
            message: e.to_string(),
            retryable: e.is_retryable(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Event receiver dropped");
        }
    }
}

/// An interval whose first tick is one full period away.
fn periodic(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => pending::<()>().await,
    }
}

async fn fallback_elapsed(sleep: &mut Option<Pin<Box<Sleep>>>) {
    match sleep {
        Some(sleep) => sleep.as_mut().await,
        None => pending::<()>().await,
    }
}
