//! In-process media platform.
//!
//! Behaves like a browser media stack closely enough to drive the capture
//! engine without hardware: permissions can be denied, the recorder can be
//! made to fail, and every live track is counted so leaks are observable.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{
    FacingMode, FrameSize, MediaDevices, MediaError, MediaRecorder, MediaStream, StreamHandle,
    TrackInfo, TrackKind,
};

/// Outcome of a simulated permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permission {
    #[default]
    Granted,
    Denied,
    /// No such device on this machine.
    Missing,
}

/// Knobs for [`SimulatedMediaDevices`].
#[derive(Debug, Clone)]
pub struct SimulatedOptions {
    pub camera: Permission,
    pub microphone: Permission,
    /// Make recorder construction fail (unsupported codec).
    pub recorder_unsupported: bool,
    /// Make `MediaRecorder::start` fail (permission revoked mid-stream).
    pub recorder_revoked: bool,
    /// Make `MediaRecorder::finish` fail (encoder lost while flushing).
    pub recorder_flush_fails: bool,
    pub frame: FrameSize,
    /// Bytes produced per `take_chunk` call.
    pub chunk_bytes: usize,
}

impl Default for SimulatedOptions {
    fn default() -> Self {
        Self {
            camera: Permission::Granted,
            microphone: Permission::Granted,
            recorder_unsupported: false,
            recorder_revoked: false,
            recorder_flush_fails: false,
            frame: FrameSize::default(),
            chunk_bytes: 4096,
        }
    }
}

/// Simulated camera/microphone/recorder stack.
#[derive(Debug, Clone)]
pub struct SimulatedMediaDevices {
    options: Arc<Mutex<SimulatedOptions>>,
    live_tracks: Arc<AtomicUsize>,
    next_id: Arc<AtomicU64>,
}

impl SimulatedMediaDevices {
    pub fn new(options: SimulatedOptions) -> Self {
        Self {
            options: Arc::new(Mutex::new(options)),
            live_tracks: Arc::new(AtomicUsize::new(0)),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Change behaviour for subsequent calls.
    pub fn update(&self, f: impl FnOnce(&mut SimulatedOptions)) {
        let mut options = self.options.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut options);
    }

    /// Tracks across all streams that have not been stopped.
    pub fn live_track_count(&self) -> usize {
        self.live_tracks.load(Ordering::SeqCst)
    }

    fn options(&self) -> SimulatedOptions {
        self.options
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn open(
        &self,
        kind: TrackKind,
        facing: Option<FacingMode>,
        frame: Option<FrameSize>,
    ) -> SimulatedStream {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let label = match (kind, facing) {
            (TrackKind::Video, Some(facing)) => format!("simulated camera ({facing})"),
            (TrackKind::Video, None) => "simulated camera".to_string(),
            (TrackKind::Audio, _) => "simulated microphone".to_string(),
        };
        self.live_tracks.fetch_add(1, Ordering::SeqCst);
        SimulatedStream {
            handle: StreamHandle {
                id,
                kind,
                facing,
                frame,
            },
            tracks: vec![TrackInfo {
                id: format!("track-{id}"),
                kind,
                label,
            }],
            live: 1,
            counter: self.live_tracks.clone(),
        }
    }
}

impl Default for SimulatedMediaDevices {
    fn default() -> Self {
        Self::new(SimulatedOptions::default())
    }
}

fn check(permission: Permission, device: &str) -> Result<(), MediaError> {
    match permission {
        Permission::Granted => Ok(()),
        Permission::Denied => Err(MediaError::PermissionDenied(format!(
            "{device} access was denied"
        ))),
        Permission::Missing => Err(MediaError::DeviceNotFound(format!("no {device} found"))),
    }
}

#[async_trait::async_trait]
impl MediaDevices for SimulatedMediaDevices {
    async fn open_camera(&self, facing: FacingMode) -> Result<Box<dyn MediaStream>, MediaError> {
        let options = self.options();
        check(options.camera, "camera")?;
        let stream = self.open(TrackKind::Video, Some(facing), Some(options.frame));
        tracing::debug!(stream_id = stream.handle.id, %facing, "Simulated camera opened");
        Ok(Box::new(stream))
    }

    async fn open_microphone(&self) -> Result<Box<dyn MediaStream>, MediaError> {
        check(self.options().microphone, "microphone")?;
        let stream = self.open(TrackKind::Audio, None, None);
        tracing::debug!(stream_id = stream.handle.id, "Simulated microphone opened");
        Ok(Box::new(stream))
    }

    fn create_recorder(
        &self,
        video: &StreamHandle,
        audio: Option<&StreamHandle>,
    ) -> Result<Box<dyn MediaRecorder>, MediaError> {
        let options = self.options();
        if options.recorder_unsupported {
            return Err(MediaError::Unsupported(
                "no supported recording codec".to_string(),
            ));
        }
        if video.kind != TrackKind::Video {
            return Err(MediaError::Failed("recorder needs a video stream".to_string()));
        }
        let mime_type = if audio.is_some() {
            "video/webm;codecs=vp8,opus"
        } else {
            "video/webm;codecs=vp8"
        };
        Ok(Box::new(SimulatedRecorder {
            mime_type: mime_type.to_string(),
            chunk_bytes: options.chunk_bytes,
            fail_on_start: options.recorder_revoked,
            fail_on_finish: options.recorder_flush_fails,
            state: RecorderState::Inactive,
            sequence: 0,
        }))
    }
}

/// A stream whose tracks are reflected in the shared live counter.
#[derive(Debug)]
pub struct SimulatedStream {
    handle: StreamHandle,
    tracks: Vec<TrackInfo>,
    live: usize,
    counter: Arc<AtomicUsize>,
}

impl MediaStream for SimulatedStream {
    fn handle(&self) -> &StreamHandle {
        &self.handle
    }

    fn tracks(&self) -> &[TrackInfo] {
        &self.tracks
    }

    fn live_tracks(&self) -> usize {
        self.live
    }

    fn stop_all(&mut self) {
        if self.live > 0 {
            self.counter.fetch_sub(self.live, Ordering::SeqCst);
            self.live = 0;
        }
    }
}

impl Drop for SimulatedStream {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecorderState {
    Inactive,
    Recording,
    Finished,
}

#[derive(Debug)]
struct SimulatedRecorder {
    mime_type: String,
    chunk_bytes: usize,
    fail_on_start: bool,
    fail_on_finish: bool,
    state: RecorderState,
    sequence: u8,
}

impl SimulatedRecorder {
    fn chunk(&mut self) -> Vec<u8> {
        self.sequence = self.sequence.wrapping_add(1);
        vec![self.sequence; self.chunk_bytes]
    }
}

impl MediaRecorder for SimulatedRecorder {
    fn start(&mut self) -> Result<(), MediaError> {
        if self.fail_on_start {
            return Err(MediaError::Revoked("camera permission revoked".to_string()));
        }
        if self.state != RecorderState::Inactive {
            return Err(MediaError::Failed("recorder already used".to_string()));
        }
        self.state = RecorderState::Recording;
        Ok(())
    }

    fn take_chunk(&mut self) -> Option<Vec<u8>> {
        (self.state == RecorderState::Recording).then(|| self.chunk())
    }

    fn finish(&mut self) -> Result<Vec<Vec<u8>>, MediaError> {
        if self.fail_on_finish && self.state == RecorderState::Recording {
            self.state = RecorderState::Finished;
            return Err(MediaError::Failed("encoder lost while flushing".to_string()));
        }
        match self.state {
            RecorderState::Recording => {
                self.state = RecorderState::Finished;
                Ok(vec![self.chunk()])
            }
            RecorderState::Inactive => Err(MediaError::Failed("recorder never started".to_string())),
            RecorderState::Finished => Ok(Vec::new()),
        }
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }
}
