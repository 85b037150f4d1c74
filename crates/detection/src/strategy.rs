//! Box proposal and classification strategies.
//!
//! The engine owns the staging and timing; a strategy only answers "where
//! are the objects" and "what is it". Swapping in a model-backed strategy
//! does not change the engine.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use trashcam_platform_core::FrameSize;

use crate::catalog::{catalog, find_trash_type, TrashTypeDefinition};
use crate::types::{DetectionBox, DetectionOutcome};

/// Smallest box edge as a fraction of the frame edge.
const MIN_BOX_FRACTION: f64 = 0.2;
/// Largest box edge as a fraction of the frame edge.
const MAX_BOX_FRACTION: f64 = 0.5;

pub trait DetectionStrategy: Send {
    fn name(&self) -> &'static str;

    /// Propose between one and `max_boxes` boxes inside `frame`.
    fn propose_boxes(&mut self, frame: FrameSize, max_boxes: usize) -> Vec<DetectionBox>;

    /// Classify the scene given the boxes proposed earlier in the cycle
    /// (possibly none).
    fn classify(&mut self, boxes: &[DetectionBox]) -> DetectionOutcome;
}

/// Random boxes and labels; confidence drawn uniformly above the type's
/// threshold.
pub struct SimulatedDetectionStrategy {
    rng: StdRng,
}

impl SimulatedDetectionStrategy {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic strategy for tests and reproducible demos.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn random_type(&mut self) -> &'static TrashTypeDefinition {
        // The catalog is a non-empty static array.
        catalog()
            .choose(&mut self.rng)
            .unwrap_or(&catalog()[0])
    }

    fn span(&mut self, edge: f64) -> (f64, f64) {
        if edge <= 0.0 {
            return (0.0, 0.0);
        }
        let size = edge * self.rng.gen_range(MIN_BOX_FRACTION..=MAX_BOX_FRACTION);
        let origin = self.rng.gen_range(0.0..=(edge - size));
        (origin.clamp(0.0, edge - size), size)
    }
}

impl Default for SimulatedDetectionStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionStrategy for SimulatedDetectionStrategy {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn propose_boxes(&mut self, frame: FrameSize, max_boxes: usize) -> Vec<DetectionBox> {
        let count = self.rng.gen_range(1..=max_boxes.max(1));
        (0..count)
            .map(|_| {
                let (x, width) = self.span(frame.width as f64);
                let (y, height) = self.span(frame.height as f64);
                DetectionBox {
                    x,
                    y,
                    width,
                    height,
                    label: self.random_type().label.to_string(),
                }
            })
            .collect()
    }

    fn classify(&mut self, boxes: &[DetectionBox]) -> DetectionOutcome {
        let trash_type = match boxes.first().and_then(|b| find_trash_type(&b.label)) {
            Some(t) => t,
            None => self.random_type(),
        };
        let confidence = self
            .rng
            .gen_range(trash_type.confidence_threshold..=1.0);
        DetectionOutcome::new(trash_type, confidence)
    }
}

/// Always reports the same trash type. One centred box, fixed confidence.
pub struct ScriptedDetectionStrategy {
    trash_type: &'static TrashTypeDefinition,
    confidence: f64,
}

impl ScriptedDetectionStrategy {
    /// Report `trash_type` at its threshold confidence.
    pub fn new(trash_type: &'static TrashTypeDefinition) -> Self {
        Self {
            trash_type,
            confidence: trash_type.confidence_threshold,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

impl DetectionStrategy for ScriptedDetectionStrategy {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn propose_boxes(&mut self, frame: FrameSize, _max_boxes: usize) -> Vec<DetectionBox> {
        let width = frame.width as f64 * 0.4;
        let height = frame.height as f64 * 0.4;
        vec![DetectionBox {
            x: (frame.width as f64 - width) / 2.0,
            y: (frame.height as f64 - height) / 2.0,
            width,
            height,
            label: self.trash_type.label.to_string(),
        }]
    }

    fn classify(&mut self, _boxes: &[DetectionBox]) -> DetectionOutcome {
        DetectionOutcome::new(self.trash_type, self.confidence)
    }
}
