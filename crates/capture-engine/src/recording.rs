//! Recording state machine.
//!
//! `start` is only honoured from [`RecordingState::Idle`] with a ready
//! camera. While recording, the owner calls [`RecordingMachine::tick`] once
//! per second; the tick that reaches the ceiling finalizes the recording.
//! `stop` finalizes early. Finalizing yields one [`Artifact`] and settles
//! back at `Idle` in the same transition, so a late tick or a second stop
//! after either path is a no-op.

use trashcam_common::clock::{CounterTick, DurationCounter, RecordingClock};
use trashcam_common::config::RecordingDefaults;
use trashcam_common::error::{TrashcamError, TrashcamResult};
use trashcam_model::{Artifact, StopReason};
use trashcam_platform_core::{MediaRecorder, MediaStream};

use crate::capture::CaptureManager;

/// State of the recording machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
}

/// Recording parameters.
#[derive(Debug, Clone)]
pub struct RecorderSettings {
    /// Forced stop after this many seconds.
    pub max_duration_secs: u32,

    /// Try to attach a microphone track.
    pub record_audio: bool,
}

impl RecorderSettings {
    pub fn from_defaults(defaults: &RecordingDefaults, record_audio: bool) -> Self {
        Self {
            max_duration_secs: defaults.max_duration_secs,
            record_audio,
        }
    }
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            max_duration_secs: 10,
            record_audio: true,
        }
    }
}

/// Result of a one-second tick.
#[derive(Debug)]
pub enum RecordingTick {
    /// Not recording; nothing happened.
    Ignored,
    /// Still recording.
    Running {
        elapsed_secs: u32,
        remaining_secs: u32,
    },
    /// The ceiling was reached and the recording was finalized.
    AutoStopped(Artifact),
}

/// Start/stop recording over the camera held by a [`CaptureManager`].
pub struct RecordingMachine {
    settings: RecorderSettings,
    state: RecordingState,
    recorder: Option<Box<dyn MediaRecorder>>,
    audio: Option<Box<dyn MediaStream>>,
    chunks: Vec<Vec<u8>>,
    counter: DurationCounter,
    clock: Option<RecordingClock>,
    finished: u64,
}

impl RecordingMachine {
    pub fn new(settings: RecorderSettings) -> Self {
        let counter = DurationCounter::new(settings.max_duration_secs);
        Self {
            settings,
            state: RecordingState::Idle,
            recorder: None,
            audio: None,
            chunks: Vec::new(),
            counter,
            clock: None,
            finished: 0,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    /// Seconds counted in the current recording.
    pub fn elapsed_secs(&self) -> u32 {
        if self.is_recording() {
            self.counter.elapsed_secs()
        } else {
            0
        }
    }

    /// Number of artifacts produced so far.
    pub fn recordings_finished(&self) -> u64 {
        self.finished
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// Begin recording.
    ///
    /// Returns `Ok(false)` without touching anything when not idle or the
    /// camera is not ready. A denied microphone degrades to video-only. If
    /// the recorder cannot be built or started the machine stays idle and
    /// no artifact is produced.
    pub async fn start(&mut self, capture: &mut CaptureManager) -> TrashcamResult<bool> {
        if self.state != RecordingState::Idle {
            tracing::debug!(state = ?self.state, "Ignoring start: not idle");
            return Ok(false);
        }
        let Some(video) = capture.stream_handle().cloned() else {
            tracing::debug!("Ignoring start: camera not ready");
            return Ok(false);
        };
        if !capture.is_ready() {
            tracing::debug!("Ignoring start: camera not ready");
            return Ok(false);
        }

        let devices = capture.devices().clone();
        let mut audio = None;
        if self.settings.record_audio {
            match devices.open_microphone().await {
                Ok(stream) => {
                    if let Some(track) = stream.tracks().first() {
                        tracing::debug!(label = %track.label, "Microphone attached");
                    }
                    audio = Some(stream);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Microphone unavailable; recording video only");
                }
            }
        }

        let built = devices
            .create_recorder(&video, audio.as_ref().map(|a| a.handle()))
            .and_then(|mut recorder| recorder.start().map(|()| recorder));
        let recorder = match built {
            Ok(recorder) => recorder,
            Err(e) => {
                if let Some(mut stream) = audio.take() {
                    stream.stop_all();
                }
                tracing::warn!(error = %e, "Recorder construction failed");
                return Err(TrashcamError::recording_construction(e.to_string()));
            }
        };

        self.recorder = Some(recorder);
        self.audio = audio;
        self.chunks.clear();
        self.counter = DurationCounter::new(self.settings.max_duration_secs);
        self.clock = Some(RecordingClock::start());
        self.state = RecordingState::Recording;
        capture.set_recording_lock(true);

        tracing::info!(
            stream_id = video.id,
            audio = self.audio.is_some(),
            max_secs = self.settings.max_duration_secs,
            "Recording started"
        );
        Ok(true)
    }

    /// Advance the duration counter by one second.
    pub fn tick(&mut self, capture: &mut CaptureManager) -> TrashcamResult<RecordingTick> {
        if self.state != RecordingState::Recording {
            return Ok(RecordingTick::Ignored);
        }
        self.drain_chunks();

        match self.counter.tick() {
            CounterTick::Running(elapsed_secs) => {
                let remaining_secs = self.counter.remaining_secs();
                tracing::trace!(elapsed_secs, remaining_secs, "Recording tick");
                Ok(RecordingTick::Running {
                    elapsed_secs,
                    remaining_secs,
                })
            }
            CounterTick::CeilingReached(elapsed_secs) => {
                tracing::info!(elapsed_secs, "Recording ceiling reached; stopping");
                self.finalize(capture, StopReason::DurationCeiling)
                    .map(RecordingTick::AutoStopped)
            }
            CounterTick::Exhausted => Ok(RecordingTick::Ignored),
        }
    }

    /// Stop recording and produce the artifact. `Ok(None)` when not
    /// recording.
    pub fn stop(&mut self, capture: &mut CaptureManager) -> TrashcamResult<Option<Artifact>> {
        if self.state != RecordingState::Recording {
            tracing::debug!("Ignoring stop: not recording");
            return Ok(None);
        }
        self.finalize(capture, StopReason::User).map(Some)
    }

    /// Drop an in-progress recording without producing an artifact.
    pub fn abort(&mut self, capture: &mut CaptureManager) {
        if self.state == RecordingState::Recording {
            tracing::info!("Recording aborted");
        }
        if let Some(mut recorder) = self.recorder.take() {
            if let Err(e) = recorder.finish() {
                tracing::debug!(error = %e, "Recorder finish failed during abort");
            }
        }
        self.teardown(capture);
    }

    fn drain_chunks(&mut self) {
        if let Some(chunk) = self.recorder.as_mut().and_then(|r| r.take_chunk()) {
            if !chunk.is_empty() {
                self.chunks.push(chunk);
            }
        }
    }

    fn finalize(
        &mut self,
        capture: &mut CaptureManager,
        reason: StopReason,
    ) -> TrashcamResult<Artifact> {
        let Some(mut recorder) = self.recorder.take() else {
            self.teardown(capture);
            return Err(TrashcamError::invalid_transition("no active recorder"));
        };

        let tail = recorder.finish();
        let mime_type = recorder.mime_type().to_string();
        let has_audio = self.audio.is_some();
        let duration_secs = self.counter.elapsed_secs();
        let (recorded_at, wall_secs) = self
            .clock
            .as_ref()
            .map(|c| (c.epoch_wall().to_string(), c.elapsed_secs()))
            .unwrap_or_default();

        let tail = match tail {
            Ok(tail) => tail,
            Err(e) => {
                self.teardown(capture);
                tracing::warn!(error = %e, "Recorder failed to finalize; discarding");
                return Err(TrashcamError::recording_construction(e.to_string()));
            }
        };

        let mut chunks = std::mem::take(&mut self.chunks);
        chunks.extend(tail);
        self.teardown(capture);

        let artifact = Artifact::assemble(
            chunks,
            mime_type,
            duration_secs,
            has_audio,
            reason,
            recorded_at,
        );
        self.finished += 1;
        tracing::info!(
            artifact_id = %artifact.id,
            duration_secs,
            wall_secs,
            bytes = artifact.size_bytes(),
            ?reason,
            "Recording finalized"
        );
        Ok(artifact)
    }

    /// Release recording-only resources. The camera stream stays live.
    fn teardown(&mut self, capture: &mut CaptureManager) {
        if let Some(mut stream) = self.audio.take() {
            stream.stop_all();
        }
        self.recorder = None;
        self.chunks.clear();
        self.clock = None;
        self.state = RecordingState::Idle;
        capture.set_recording_lock(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use trashcam_platform_core::{
        FacingMode, Permission, SimulatedMediaDevices, SimulatedOptions,
    };

    async fn ready(devices: &SimulatedMediaDevices) -> CaptureManager {
        let mut capture = CaptureManager::new(Arc::new(devices.clone()), FacingMode::Environment);
        capture.acquire(FacingMode::Environment).await.unwrap();
        capture
    }

    #[tokio::test]
    async fn test_start_requires_ready_camera() {
        let devices = SimulatedMediaDevices::default();
        let mut capture = CaptureManager::new(Arc::new(devices.clone()), FacingMode::Environment);
        let mut machine = RecordingMachine::new(RecorderSettings::default());

        assert!(!machine.start(&mut capture).await.unwrap());
        assert_eq!(machine.state(), RecordingState::Idle);
        assert_eq!(devices.live_track_count(), 0);
    }

    #[tokio::test]
    async fn test_start_while_recording_is_noop() {
        let devices = SimulatedMediaDevices::default();
        let mut capture = ready(&devices).await;
        let mut machine = RecordingMachine::new(RecorderSettings::default());

        assert!(machine.start(&mut capture).await.unwrap());
        assert!(matches!(
            machine.tick(&mut capture).unwrap(),
            RecordingTick::Running {
                elapsed_secs: 1,
                remaining_secs: 9
            }
        ));
        let tracks_before = devices.live_track_count();

        assert!(!machine.start(&mut capture).await.unwrap());
        assert_eq!(machine.state(), RecordingState::Recording);
        assert_eq!(machine.elapsed_secs(), 1);
        assert_eq!(devices.live_track_count(), tracks_before);
    }

    #[tokio::test]
    async fn test_ceiling_auto_stops_exactly_once() {
        let devices = SimulatedMediaDevices::default();
        let mut capture = ready(&devices).await;
        let mut machine = RecordingMachine::new(RecorderSettings::default());
        machine.start(&mut capture).await.unwrap();

        let mut artifacts = Vec::new();
        for _ in 0..15 {
            if let RecordingTick::AutoStopped(artifact) = machine.tick(&mut capture).unwrap() {
                artifacts.push(artifact);
            }
        }
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].duration_secs, 10);
        assert_eq!(artifacts[0].stop_reason, StopReason::DurationCeiling);
        assert_eq!(machine.recordings_finished(), 1);
        assert_eq!(machine.state(), RecordingState::Idle);

        // A user stop racing the ceiling loses quietly.
        assert!(machine.stop(&mut capture).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stop_keeps_camera_and_releases_microphone() {
        let devices = SimulatedMediaDevices::default();
        let mut capture = ready(&devices).await;
        let mut machine = RecordingMachine::new(RecorderSettings::default());

        machine.start(&mut capture).await.unwrap();
        assert!(machine.has_audio());
        assert_eq!(devices.live_track_count(), 2);
        assert!(capture.is_recording_locked());

        machine.tick(&mut capture).unwrap();
        let artifact = machine.stop(&mut capture).unwrap().unwrap();
        assert!(artifact.has_audio);
        assert_eq!(artifact.duration_secs, 1);
        assert!(artifact.size_bytes() > 0);
        assert_eq!(devices.live_track_count(), 1);
        assert!(capture.is_ready());
        assert!(!capture.is_recording_locked());
    }

    #[tokio::test]
    async fn test_denied_microphone_records_video_only() {
        let devices = SimulatedMediaDevices::new(SimulatedOptions {
            microphone: Permission::Denied,
            ..Default::default()
        });
        let mut capture = ready(&devices).await;
        let mut machine = RecordingMachine::new(RecorderSettings::default());

        assert!(machine.start(&mut capture).await.unwrap());
        let artifact = machine.stop(&mut capture).unwrap().unwrap();
        assert!(!artifact.has_audio);
        assert!(artifact.mime_type.ends_with("vp8"));
    }

    #[tokio::test]
    async fn test_recorder_failure_reverts_to_idle() {
        let devices = SimulatedMediaDevices::new(SimulatedOptions {
            recorder_unsupported: true,
            ..Default::default()
        });
        let mut capture = ready(&devices).await;
        let mut machine = RecordingMachine::new(RecorderSettings::default());

        let err = machine.start(&mut capture).await.unwrap_err();
        assert!(matches!(err, TrashcamError::RecordingConstructionFailed { .. }));
        assert_eq!(machine.state(), RecordingState::Idle);
        assert_eq!(machine.recordings_finished(), 0);
        // Microphone opened for the attempt is released again.
        assert_eq!(devices.live_track_count(), 1);
        assert!(!capture.is_recording_locked());

        devices.update(|o| o.recorder_unsupported = false);
        assert!(machine.start(&mut capture).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoked_permission_on_start_produces_no_artifact() {
        let devices = SimulatedMediaDevices::new(SimulatedOptions {
            recorder_revoked: true,
            ..Default::default()
        });
        let mut capture = ready(&devices).await;
        let mut machine = RecordingMachine::new(RecorderSettings::default());

        assert!(machine.start(&mut capture).await.is_err());
        assert!(matches!(machine.tick(&mut capture).unwrap(), RecordingTick::Ignored));
        assert!(machine.stop(&mut capture).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_abort_is_idempotent_and_discards() {
        let devices = SimulatedMediaDevices::default();
        let mut capture = ready(&devices).await;
        let mut machine = RecordingMachine::new(RecorderSettings::default());

        machine.start(&mut capture).await.unwrap();
        machine.abort(&mut capture);
        machine.abort(&mut capture);
        assert_eq!(machine.state(), RecordingState::Idle);
        assert_eq!(machine.recordings_finished(), 0);
        assert_eq!(devices.live_track_count(), 1);
    }

    #[tokio::test]
    async fn test_flush_failure_discards_recording_and_unlocks() {
        let devices = SimulatedMediaDevices::new(SimulatedOptions {
            recorder_flush_fails: true,
            ..Default::default()
        });
        let mut capture = ready(&devices).await;
        let mut machine = RecordingMachine::new(RecorderSettings::default());

        machine.start(&mut capture).await.unwrap();
        let err = machine.stop(&mut capture).unwrap_err();
        assert!(matches!(err, TrashcamError::RecordingConstructionFailed { .. }));
        assert_eq!(machine.state(), RecordingState::Idle);
        assert_eq!(machine.recordings_finished(), 0);
        assert!(!capture.is_recording_locked());

        // Aborting over a recorder that cannot flush still tears down.
        machine.start(&mut capture).await.unwrap();
        machine.abort(&mut capture);
        assert_eq!(machine.state(), RecordingState::Idle);
        assert!(!capture.is_recording_locked());
        assert_eq!(devices.live_track_count(), 1);
    }
}
