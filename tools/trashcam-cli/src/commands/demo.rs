//! Run one cleanup end to end on simulated devices.
//!
//! The driver plays the user: it records each step until detection
//! finishes, stops, and advances. The disposal clip is stopped as soon as
//! detection starts holding, so the automatic confirmation releases it.

use std::sync::Arc;

use trashcam_common::config::AppConfig;
use trashcam_detection::{
    catalog, find_trash_type, DetectionStrategy, ScriptedDetectionStrategy,
    SimulatedDetectionStrategy,
};
use trashcam_model::{GeoPoint, UserId};
use trashcam_platform_core::{Permission, SimulatedMediaDevices, SimulatedOptions};
use trashcam_workflow::{
    CleanupSession, InMemoryCleanupStore, SessionCommand, SessionEvent, SessionHandle,
    SessionOutcome, SessionSettings,
};

/// Re-recordings allowed when a clip ends before detection finishes.
const MAX_RETAKES: u32 = 3;

pub struct DemoOptions {
    pub user: Option<String>,
    pub trash_type: Option<String>,
    pub seed: Option<u64>,
    pub deny_camera: bool,
    pub deny_microphone: bool,
    pub flaky_store: bool,
    pub lat: f64,
    pub lon: f64,
    pub json: bool,
}

pub async fn run(config: &AppConfig, options: DemoOptions) -> anyhow::Result<()> {
    let strategy = build_strategy(&options)?;

    let devices = SimulatedMediaDevices::new(SimulatedOptions {
        camera: permission(!options.deny_camera),
        microphone: permission(!options.deny_microphone),
        ..SimulatedOptions::default()
    });
    let store = Arc::new(InMemoryCleanupStore::new());
    if options.flaky_store {
        store.fail_next_point_updates(1);
    }

    let mut settings = SessionSettings::from_config(config)
        .with_location(GeoPoint::new(options.lat, options.lon));
    if let Some(user) = &options.user {
        settings = settings.with_user(UserId::new(user.as_str()));
    }

    if !options.json {
        println!("Starting cleanup demo");
        println!("  User: {}", options.user.as_deref().unwrap_or("(not signed in)"));
        println!("  Detector: {}", strategy.name());
        println!("  Location: {:.5}, {:.5}", options.lat, options.lon);
        println!();
    }

    let (mut session, mut events) =
        CleanupSession::new(Arc::new(devices.clone()), store.clone(), strategy, settings);
    let steps = session.workflow().steps().to_vec();

    if let Err(e) = session.open().await {
        while let Ok(event) = events.try_recv() {
            report(&event, options.json)?;
        }
        return Err(e.into());
    }

    let (handle, commands) = SessionHandle::channel();
    let task = tokio::spawn(session.run(commands));
    handle.send(SessionCommand::StartRecording);

    let auto_confirm = config.detection.disposal_fallback_secs.is_some();
    let mut detected_step = None;
    let mut retakes = 0u32;
    let mut retried_submit = false;
    while let Some(event) = events.recv().await {
        report(&event, options.json)?;
        match &event {
            SessionEvent::RecordingStarted { step, .. } if !options.json => {
                if let Some(s) = steps.get(*step) {
                    println!("  {}", s.instruction);
                }
            }
            SessionEvent::TrashDetected { step, .. } => {
                detected_step = Some(*step);
                handle.send(SessionCommand::StopRecording);
            }
            SessionEvent::DisposalHolding { .. } => {
                handle.send(SessionCommand::StopRecording);
                if !auto_confirm {
                    handle.send(SessionCommand::ConfirmDisposal);
                }
            }
            SessionEvent::RecordingFinished { step, .. } if detected_step == Some(*step) => {
                handle.send(SessionCommand::Advance);
            }
            SessionEvent::DetectionDiscarded { .. } => {
                retakes += 1;
                let next = if retakes > MAX_RETAKES {
                    SessionCommand::Close
                } else {
                    SessionCommand::StartRecording
                };
                handle.send(next);
            }
            SessionEvent::DisposalVerified { .. } => {
                handle.send(SessionCommand::Advance);
            }
            SessionEvent::StepAdvanced { .. } => {
                detected_step = None;
                handle.send(SessionCommand::StartRecording);
            }
            SessionEvent::Notice {
                retryable: true, ..
            } if options.flaky_store && !retried_submit => {
                retried_submit = true;
                handle.send(SessionCommand::Submit);
            }
            SessionEvent::Notice { .. } | SessionEvent::AdvanceRejected { .. } => {
                handle.send(SessionCommand::Close);
            }
            _ => {}
        }
    }

    let outcome = task.await?;
    tracing::debug!(live_tracks = devices.live_track_count(), "Demo finished");
    match outcome {
        SessionOutcome::Submitted(receipt) => {
            if !options.json {
                println!();
                println!("Cleanup saved: {}", receipt.record.id);
                println!("  Trash type: {}", receipt.record.trash_type);
                println!("  Points earned: {}", receipt.record.total_points);
                println!("  Running total: {}", receipt.new_total);
                println!("  Records stored: {}", store.cleanup_count());
            }
            Ok(())
        }
        SessionOutcome::Exited => anyhow::bail!("Cleanup abandoned"),
        SessionOutcome::Closed => anyhow::bail!("Cleanup was not submitted"),
    }
}

fn build_strategy(options: &DemoOptions) -> anyhow::Result<Box<dyn DetectionStrategy>> {
    if let Some(label) = &options.trash_type {
        let Some(trash_type) = find_trash_type(label) else {
            let known: Vec<&str> = catalog().iter().map(|t| t.label).collect();
            anyhow::bail!("Unknown trash type '{label}'. Known types: {}", known.join(", "));
        };
        return Ok(Box::new(ScriptedDetectionStrategy::new(trash_type)));
    }
    Ok(match options.seed {
        Some(seed) => Box::new(SimulatedDetectionStrategy::seeded(seed)),
        None => Box::new(SimulatedDetectionStrategy::new()),
    })
}

fn permission(granted: bool) -> Permission {
    if granted {
        Permission::Granted
    } else {
        Permission::Denied
    }
}

fn report(event: &SessionEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    match event {
        SessionEvent::CameraReady { facing } => println!("[OK] Camera ready ({facing})"),
        SessionEvent::CameraUnavailable { message } => println!("[ERR] {message}"),
        SessionEvent::RecordingStarted { step, audio } => println!(
            "Step {}: recording{}",
            step + 1,
            if *audio { "" } else { " (no audio)" }
        ),
        SessionEvent::DetectionProgress { progress, message } => {
            println!("  {progress:>3}% {message}")
        }
        SessionEvent::BoxesProposed { boxes } => {
            println!("  Found {} candidate object(s)", boxes.len())
        }
        SessionEvent::TrashDetected { outcome, .. } => {
            println!(
                "  Detected: {} ({:.0}% confidence)",
                outcome.label(),
                outcome.confidence * 100.0
            );
            println!("  {}", outcome.impact_text);
            println!("  {}", outcome.recycling_text);
        }
        SessionEvent::RecordingFinished {
            duration_secs,
            size_bytes,
            ..
        } => println!("  Clip saved: {duration_secs}s, {size_bytes} bytes"),
        SessionEvent::DetectionDiscarded { .. } => {
            println!("  Detection did not finish; recording again")
        }
        SessionEvent::DisposalHolding { .. } => println!("  Waiting for disposal confirmation"),
        SessionEvent::DisposalVerified { .. } => println!("  Disposal verified"),
        SessionEvent::StepAdvanced {
            award,
            cumulative_points,
            ..
        } => println!("  +{award} points (total {cumulative_points})"),
        SessionEvent::ReadyToSubmit { cumulative_points } => {
            println!("Submitting cleanup worth {cumulative_points} points")
        }
        SessionEvent::AdvanceRejected { reason } => println!("[WARN] Cannot continue: {reason}"),
        SessionEvent::SteppedBack {
            index,
            cumulative_points,
            ..
        } => println!("Back to step {} (total {cumulative_points})", index + 1),
        SessionEvent::Notice { message, retryable } => println!(
            "[WARN] {message}{}",
            if *retryable { " (retryable)" } else { "" }
        ),
        SessionEvent::Exited => println!("Cleanup abandoned"),
        SessionEvent::RecordingProgress { .. }
        | SessionEvent::PlaybackToggled { .. }
        | SessionEvent::Submitted { .. } => {}
    }
    Ok(())
}
