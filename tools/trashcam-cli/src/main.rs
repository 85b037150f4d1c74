//! Trashcam CLI: run a simulated cleanup and inspect configuration.
//!
//! Usage:
//!   trashcam demo [OPTIONS]    Run the three-step cleanup on simulated devices
//!   trashcam catalog           List the recognised trash types
//!   trashcam config            Show the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use trashcam_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "trashcam",
    about = "Record a litter cleanup, detect the trash and earn points",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read configuration from this file instead of the standard location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full cleanup against the simulated camera and an in-memory store
    Demo {
        /// User id to submit as
        #[arg(long, default_value = "demo-user")]
        user: String,

        /// Submit without a signed-in user
        #[arg(long, conflicts_with = "user")]
        anonymous: bool,

        /// Always detect this trash type (e.g. "Aluminum Can")
        #[arg(long)]
        trash_type: Option<String>,

        /// Seed for the simulated detector
        #[arg(long)]
        seed: Option<u64>,

        /// Deny camera permission
        #[arg(long)]
        deny_camera: bool,

        /// Deny microphone permission; recording continues without audio
        #[arg(long)]
        deny_microphone: bool,

        /// Fail the first points update to exercise the retry path
        #[arg(long)]
        flaky_store: bool,

        /// Latitude of the cleanup
        #[arg(long, default_value = "0.0", allow_negative_numbers = true)]
        lat: f64,

        /// Longitude of the cleanup
        #[arg(long, default_value = "0.0", allow_negative_numbers = true)]
        lon: f64,

        /// Print session events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// List the trash catalog
    Catalog {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the standard location
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?,
        None => AppConfig::load(),
    };

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    trashcam_common::logging::try_init_logging(&logging)?;

    match cli.command {
        Commands::Demo {
            user,
            anonymous,
            trash_type,
            seed,
            deny_camera,
            deny_microphone,
            flaky_store,
            lat,
            lon,
            json,
        } => {
            commands::demo::run(
                &config,
                commands::demo::DemoOptions {
                    user: (!anonymous).then_some(user),
                    trash_type,
                    seed,
                    deny_camera,
                    deny_microphone,
                    flaky_store,
                    lat,
                    lon,
                    json,
                },
            )
            .await
        }
        Commands::Catalog { json } => commands::catalog::run(json),
        Commands::Config { write } => commands::config::run(&config, write),
    }
}
