//! The static trash catalog.

use serde::Serialize;
use trashcam_model::StepKind;

/// Points awarded at each step kind for one trash type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PointSchedule {
    pub find: u32,
    pub pick_up: u32,
    pub dispose: u32,
}

impl PointSchedule {
    pub fn for_step(&self, kind: StepKind) -> u32 {
        match kind {
            StepKind::ShowTrash => self.find,
            StepKind::PickUp => self.pick_up,
            StepKind::Dispose => self.dispose,
        }
    }

    /// Points for a complete cleanup of this type.
    pub fn total(&self) -> u32 {
        self.find + self.pick_up + self.dispose
    }
}

/// One kind of trash the detector can report.
#[derive(Debug, PartialEq, Serialize)]
pub struct TrashTypeDefinition {
    pub label: &'static str,
    pub environmental_impact: &'static str,
    pub recycling_guidance: &'static str,
    /// Descriptive only; matching does not use them.
    pub match_keywords: &'static [&'static str],
    /// Lowest confidence ever reported for this type.
    pub confidence_threshold: f64,
    pub points: PointSchedule,
    pub typical_weight_kg: f64,
}

static CATALOG: [TrashTypeDefinition; 6] = [
    TrashTypeDefinition {
        label: "Plastic Bottle",
        environmental_impact: "Takes up to 450 years to break down and sheds microplastics into soil and water.",
        recycling_guidance: "Empty it, replace the cap and put it in the plastics bin.",
        match_keywords: &["bottle", "plastic", "pet"],
        confidence_threshold: 0.75,
        points: PointSchedule { find: 10, pick_up: 15, dispose: 25 },
        typical_weight_kg: 0.025,
    },
    TrashTypeDefinition {
        label: "Aluminum Can",
        environmental_impact: "Persists for 200 years; recycling saves 95% of the energy of new aluminium.",
        recycling_guidance: "Rinse if possible and place it with metal recyclables.",
        match_keywords: &["can", "aluminum", "tin", "soda"],
        confidence_threshold: 0.80,
        points: PointSchedule { find: 10, pick_up: 15, dispose: 25 },
        typical_weight_kg: 0.015,
    },
    TrashTypeDefinition {
        label: "Glass Bottle",
        environmental_impact: "Never biodegrades and breaks into sharp fragments that injure wildlife.",
        recycling_guidance: "Drop it in the glass container, sorted by colour where required.",
        match_keywords: &["glass", "bottle", "jar"],
        confidence_threshold: 0.70,
        points: PointSchedule { find: 15, pick_up: 20, dispose: 30 },
        typical_weight_kg: 0.350,
    },
    TrashTypeDefinition {
        label: "Paper Cup",
        environmental_impact: "Plastic lining keeps it from composting and it lingers for decades.",
        recycling_guidance: "Remove the lid; most cups belong in general waste unless collected separately.",
        match_keywords: &["cup", "paper", "coffee"],
        confidence_threshold: 0.65,
        points: PointSchedule { find: 5, pick_up: 10, dispose: 15 },
        typical_weight_kg: 0.010,
    },
    TrashTypeDefinition {
        label: "Food Wrapper",
        environmental_impact: "Multi-layer films fragment quickly and are often eaten by animals.",
        recycling_guidance: "Put it in general waste unless a soft-plastics collection is available.",
        match_keywords: &["wrapper", "packet", "chips", "candy"],
        confidence_threshold: 0.60,
        points: PointSchedule { find: 5, pick_up: 10, dispose: 15 },
        typical_weight_kg: 0.005,
    },
    TrashTypeDefinition {
        label: "Cigarette Butt",
        environmental_impact: "Leaches nicotine and heavy metals; a single butt can contaminate litres of water.",
        recycling_guidance: "Make sure it is extinguished and put it in general waste.",
        match_keywords: &["cigarette", "butt", "filter"],
        confidence_threshold: 0.55,
        points: PointSchedule { find: 5, pick_up: 5, dispose: 10 },
        typical_weight_kg: 0.001,
    },
];

/// All catalog entries, in display order.
pub fn catalog() -> &'static [TrashTypeDefinition] {
    &CATALOG
}

/// Look up an entry by label, ignoring case and surrounding whitespace.
pub fn find_trash_type(label: &str) -> Option<&'static TrashTypeDefinition> {
    let label = label.trim();
    CATALOG.iter().find(|t| t.label.eq_ignore_ascii_case(label))
}
