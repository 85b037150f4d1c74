//! Show or persist the effective configuration.

use trashcam_common::config::{config_file_path, AppConfig};

pub fn run(config: &AppConfig, write: bool) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);

    if write {
        let path = config.save()?;
        println!();
        println!("Configuration written to: {}", path.display());
    } else {
        println!();
        println!("Config file: {}", config_file_path().display());
    }
    Ok(())
}
