//! Camera acquisition and the video sink.

use std::sync::Arc;

use trashcam_common::error::{TrashcamError, TrashcamResult};
use trashcam_platform_core::{
    FacingMode, FrameSample, MediaDevices, MediaStream, StreamHandle,
};

/// Where the live camera stream is rendered and sampled from.
#[derive(Debug, Default)]
pub struct VideoSink {
    bound: Option<StreamHandle>,
    frames_sampled: u64,
}

impl VideoSink {
    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    pub fn bound_stream(&self) -> Option<&StreamHandle> {
        self.bound.as_ref()
    }

    fn bind(&mut self, handle: StreamHandle) {
        self.bound = Some(handle);
        self.frames_sampled = 0;
    }

    fn unbind(&mut self) {
        self.bound = None;
    }

    /// Grab the current frame, if a camera stream is bound.
    pub fn sample(&mut self) -> Option<FrameSample> {
        let size = self.bound.as_ref()?.frame?;
        self.frames_sampled += 1;
        Some(FrameSample {
            size,
            sequence: self.frames_sampled,
        })
    }
}

/// Exclusive owner of the live camera stream.
///
/// Every exit path must end in [`CaptureManager::release`]; dropping the
/// manager releases as well.
pub struct CaptureManager {
    devices: Arc<dyn MediaDevices>,
    stream: Option<Box<dyn MediaStream>>,
    sink: VideoSink,
    facing: FacingMode,
    recording_lock: bool,
}

impl CaptureManager {
    pub fn new(devices: Arc<dyn MediaDevices>, facing: FacingMode) -> Self {
        Self {
            devices,
            stream: None,
            sink: VideoSink::default(),
            facing,
            recording_lock: false,
        }
    }

    /// Request a video-only stream and bind it to the sink.
    ///
    /// Any stream already held is released first. On failure the sink stays
    /// unbound and the manager is not ready.
    pub async fn acquire(&mut self, facing: FacingMode) -> TrashcamResult<StreamHandle> {
        if self.recording_lock {
            return Err(TrashcamError::invalid_transition(
                "cannot change camera while recording",
            ));
        }
        self.release();
        self.facing = facing;

        tracing::info!(%facing, "Acquiring camera");
        let stream = self.devices.open_camera(facing).await.map_err(|e| {
            tracing::warn!(%facing, error = %e, "Camera acquisition failed");
            TrashcamError::camera_unavailable(e.to_string())
        })?;

        let handle = stream.handle().clone();
        self.sink.bind(handle.clone());
        self.stream = Some(stream);
        tracing::info!(stream_id = handle.id, frame = ?handle.frame, "Camera ready");
        Ok(handle)
    }

    /// Stop every track of the held stream. Safe to call at any time.
    pub fn release(&mut self) {
        self.sink.unbind();
        if let Some(mut stream) = self.stream.take() {
            stream.stop_all();
            tracing::info!(stream_id = stream.handle().id, "Camera released");
        }
    }

    /// Re-acquire with the opposite facing mode. Rejected while recording.
    pub async fn switch_facing(&mut self) -> TrashcamResult<StreamHandle> {
        if self.recording_lock {
            return Err(TrashcamError::invalid_transition(
                "cannot switch camera while recording",
            ));
        }
        let next = self.facing.opposite();
        tracing::debug!(from = %self.facing, to = %next, "Switching camera");
        self.acquire(next).await
    }

    pub fn is_ready(&self) -> bool {
        self.sink.is_bound()
            && self
                .stream
                .as_ref()
                .map(|s| s.live_tracks() > 0)
                .unwrap_or(false)
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn stream_handle(&self) -> Option<&StreamHandle> {
        self.stream.as_ref().map(|s| s.handle())
    }

    /// Live tracks held by this manager.
    pub fn live_tracks(&self) -> usize {
        self.stream.as_ref().map(|s| s.live_tracks()).unwrap_or(0)
    }

    pub fn sink(&self) -> &VideoSink {
        &self.sink
    }

    pub fn sample_frame(&mut self) -> Option<FrameSample> {
        self.sink.sample()
    }

    pub fn is_recording_locked(&self) -> bool {
        self.recording_lock
    }

    pub(crate) fn devices(&self) -> &Arc<dyn MediaDevices> {
        &self.devices
    }

    pub(crate) fn set_recording_lock(&mut self, locked: bool) {
        self.recording_lock = locked;
    }
}

impl Drop for CaptureManager {
    fn drop(&mut self) {
        self.release();
    }
}
