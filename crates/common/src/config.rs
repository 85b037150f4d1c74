//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{TrashcamError, TrashcamResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Camera acquisition defaults.
    pub capture: CaptureDefaults,

    /// Recording limits and timer cadence.
    pub recording: RecordingDefaults,

    /// Simulated detection pacing.
    pub detection: DetectionDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default camera parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureDefaults {
    /// Preferred camera: "environment" (rear) or "user" (front).
    pub facing_mode: String,

    /// Attach a microphone track to recordings when the platform allows it.
    pub record_audio: bool,
}

/// Recording parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingDefaults {
    /// Hard ceiling after which a recording stops on its own.
    pub max_duration_secs: u32,

    /// Duration counter cadence.
    pub tick_interval_ms: u64,
}

/// Detection pacing. Progress is a fixed increment per tick, not wall-clock
/// adaptive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionDefaults {
    /// Interval between progress ticks.
    pub tick_interval_ms: u64,

    /// Percentage points added per tick.
    pub progress_step: u8,

    /// Progress value at which the disposal phase waits for confirmation.
    pub disposal_hold_percent: u8,

    /// Upper bound on synthetic boxes per finding cycle.
    pub max_boxes: usize,

    /// Seconds after the disposal video is available before confirmation is
    /// sent automatically. `None` disables the fallback.
    pub disposal_fallback_secs: Option<u64>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trashcam=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Include the event target in plain-text output.
    pub with_target: bool,
}

impl Default for CaptureDefaults {
    fn default() -> Self {
        Self {
            facing_mode: "environment".to_string(),
            record_audio: true,
        }
    }
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            max_duration_secs: 10,
            tick_interval_ms: 1000,
        }
    }
}

impl Default for DetectionDefaults {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            progress_step: 2,
            disposal_hold_percent: 95,
            max_boxes: 3,
            disposal_fallback_secs: Some(2),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            with_target: true,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load and validate config from an explicit path.
    pub fn load_from(path: &Path) -> TrashcamResult<Self> {
        if !path.exists() {
            return Err(TrashcamError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&config_path, json)?;
        Ok(config_path)
    }

    /// Reject values that would stall or break the timers.
    pub fn validate(&self) -> TrashcamResult<()> {
        if self.recording.max_duration_secs == 0 {
            return Err(TrashcamError::config("recording.max_duration_secs must be > 0"));
        }
        if self.recording.tick_interval_ms == 0 || self.detection.tick_interval_ms == 0 {
            return Err(TrashcamError::config("tick intervals must be > 0"));
        }
        if self.detection.progress_step == 0 || self.detection.progress_step > 100 {
            return Err(TrashcamError::config(
                "detection.progress_step must be within 1..=100",
            ));
        }
        if self.detection.disposal_hold_percent >= 100 {
            return Err(TrashcamError::config(
                "detection.disposal_hold_percent must be below 100",
            ));
        }
        if self.detection.max_boxes == 0 {
            return Err(TrashcamError::config("detection.max_boxes must be > 0"));
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("trashcam").join("config.json")
}
