//! Detection results.

use serde::Serialize;

use crate::catalog::TrashTypeDefinition;

/// A synthetic bounding box in source-frame pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub label: String,
}

impl DetectionBox {
    /// Whether the box lies fully inside a `width` x `height` frame.
    pub fn fits_within(&self, width: f64, height: f64) -> bool {
        const TOLERANCE: f64 = 1e-6;
        self.x >= 0.0
            && self.y >= 0.0
            && self.width >= 0.0
            && self.height >= 0.0
            && self.x + self.width <= width + TOLERANCE
            && self.y + self.height <= height + TOLERANCE
    }
}

/// Classification produced at the end of a finding cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionOutcome {
    pub trash_type: &'static TrashTypeDefinition,
    /// Always within `[trash_type.confidence_threshold, 1.0]`.
    pub confidence: f64,
    pub impact_text: String,
    pub recycling_text: String,
}

impl DetectionOutcome {
    /// Build an outcome, clamping `confidence` into the type's valid range.
    pub fn new(trash_type: &'static TrashTypeDefinition, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            trash_type.confidence_threshold
        } else {
            confidence.clamp(trash_type.confidence_threshold, 1.0)
        };
        Self {
            trash_type,
            confidence,
            impact_text: trash_type.environmental_impact.to_string(),
            recycling_text: trash_type.recycling_guidance.to_string(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.trash_type.label
    }
}
