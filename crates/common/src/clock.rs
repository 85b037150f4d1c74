//! Clock and duration utilities for recordings.
//!
//! A recording is anchored to a monotonic epoch captured at start. Its
//! visible duration is driven by a once-per-second tick counter that also
//! enforces the hard recording ceiling.

use std::time::Instant;

/// A recording clock that provides monotonic timestamps relative to
/// a fixed epoch (the moment recording started).
#[derive(Debug, Clone)]
pub struct RecordingClock {
    /// The instant recording started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl RecordingClock {
    /// Create a new recording clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Get seconds elapsed since recording start.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at recording start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

/// Result of advancing a [`DurationCounter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterTick {
    /// Still below the ceiling; carries the elapsed seconds.
    Running(u32),
    /// This tick hit the ceiling. Reported exactly once.
    CeilingReached(u32),
    /// The ceiling was already reported; the tick is ignored.
    Exhausted,
}

/// One-tick-per-second duration counter with a hard ceiling.
#[derive(Debug, Clone)]
pub struct DurationCounter {
    elapsed_secs: u32,
    ceiling_secs: u32,
}

impl DurationCounter {
    pub fn new(ceiling_secs: u32) -> Self {
        Self {
            elapsed_secs: 0,
            ceiling_secs: ceiling_secs.max(1),
        }
    }

    /// Count one second.
    pub fn tick(&mut self) -> CounterTick {
        if self.elapsed_secs >= self.ceiling_secs {
            return CounterTick::Exhausted;
        }
        self.elapsed_secs += 1;
        if self.elapsed_secs >= self.ceiling_secs {
            CounterTick::CeilingReached(self.elapsed_secs)
        } else {
            CounterTick::Running(self.elapsed_secs)
        }
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs
    }

    pub fn ceiling_secs(&self) -> u32 {
        self.ceiling_secs
    }

    /// Seconds left before the ceiling forces a stop.
    pub fn remaining_secs(&self) -> u32 {
        self.ceiling_secs.saturating_sub(self.elapsed_secs)
    }
}
