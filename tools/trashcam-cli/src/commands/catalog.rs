//! Print the trash catalog.

use trashcam_detection::catalog;

pub fn run(json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(catalog())?);
        return Ok(());
    }

    println!("Trash Catalog");
    println!("{}", "=".repeat(50));
    for t in catalog() {
        println!("{}", t.label);
        println!(
            "  Points: find {} / pick up {} / dispose {} (total {})",
            t.points.find,
            t.points.pick_up,
            t.points.dispose,
            t.points.total()
        );
        println!("  Min confidence: {:.0}%", t.confidence_threshold * 100.0);
        println!("  Typical weight: {} g", t.typical_weight_kg * 1000.0);
        println!("  Impact: {}", t.environmental_impact);
        println!("  Recycling: {}", t.recycling_guidance);
        println!();
    }
    Ok(())
}
