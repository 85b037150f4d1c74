//! End-to-end session tests on the simulated platform with paused time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use trashcam_detection::{find_trash_type, ScriptedDetectionStrategy};
use trashcam_model::{StopReason, UserId};
use trashcam_platform_core::{FacingMode, Permission, SimulatedMediaDevices, SimulatedOptions};
use trashcam_workflow::{
    AdvanceBlocker, CleanupSession, CleanupStore, InMemoryCleanupStore, SessionCommand,
    SessionEvent, SessionHandle, SessionOutcome, SessionSettings,
};

struct Harness {
    handle: SessionHandle,
    events: UnboundedReceiver<SessionEvent>,
    task: JoinHandle<SessionOutcome>,
    devices: SimulatedMediaDevices,
    store: Arc<InMemoryCleanupStore>,
}

fn build_session(
    label: &str,
    settings: SessionSettings,
    store: Arc<InMemoryCleanupStore>,
    options: SimulatedOptions,
) -> (
    CleanupSession,
    UnboundedReceiver<SessionEvent>,
    SimulatedMediaDevices,
) {
    trashcam_common::logging::init_test_logging();
    let devices = SimulatedMediaDevices::new(options);
    let strategy = ScriptedDetectionStrategy::new(find_trash_type(label).unwrap());
    let (session, events) = CleanupSession::new(
        Arc::new(devices.clone()),
        store,
        Box::new(strategy),
        settings,
    );
    (session, events, devices)
}

async fn launch(label: &str, settings: SessionSettings, store: Arc<InMemoryCleanupStore>) -> Harness {
    let (mut session, mut events, devices) =
        build_session(label, settings, store.clone(), SimulatedOptions::default());
    session.open().await.unwrap();
    assert!(matches!(
        events.recv().await,
        Some(SessionEvent::CameraReady { .. })
    ));
    let (handle, commands) = SessionHandle::channel();
    let task = tokio::spawn(session.run(commands));
    Harness {
        handle,
        events,
        task,
        devices,
        store,
    }
}

fn settings() -> SessionSettings {
    SessionSettings::default().with_user(UserId::new("tester"))
}

async fn expect(
    events: &mut UnboundedReceiver<SessionEvent>,
    wanted: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(120), async {
        loop {
            let event = events.recv().await.expect("event stream ended");
            if wanted(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

async fn drain(events: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut rest = Vec::new();
    while let Some(event) = events.recv().await {
        rest.push(event);
    }
    rest
}

async fn finish_finding_step(h: &mut Harness) {
    h.handle.send(SessionCommand::StartRecording);
    expect(&mut h.events, |e| matches!(e, SessionEvent::TrashDetected { .. })).await;
    h.handle.send(SessionCommand::StopRecording);
    expect(&mut h.events, |e| matches!(e, SessionEvent::RecordingFinished { .. })).await;
    h.handle.send(SessionCommand::Advance);
    expect(&mut h.events, |e| matches!(e, SessionEvent::StepAdvanced { .. })).await;
}

async fn record_disposal(h: &mut Harness) {
    h.handle.send(SessionCommand::StartRecording);
    expect(&mut h.events, |e| matches!(e, SessionEvent::DisposalHolding { .. })).await;
    h.handle.send(SessionCommand::StopRecording);
    expect(&mut h.events, |e| matches!(e, SessionEvent::DisposalVerified { .. })).await;
}

#[tokio::test(start_paused = true)]
async fn test_scripted_aluminum_can_run_scores_fifty() {
    let store = Arc::new(InMemoryCleanupStore::new());
    let mut h = launch("Aluminum Can", settings(), store).await;

    finish_finding_step(&mut h).await;
    finish_finding_step(&mut h).await;
    record_disposal(&mut h).await;

    h.handle.send(SessionCommand::Advance);
    let event = expect(&mut h.events, |e| matches!(e, SessionEvent::Submitted { .. })).await;
    let SessionEvent::Submitted { receipt } = event else {
        unreachable!()
    };
    assert_eq!(receipt.record.total_points, 50);
    assert_eq!(receipt.record.trash_type, "Aluminum Can");
    assert_eq!(receipt.new_total, 50);

    let outcome = h.task.await.unwrap();
    assert!(matches!(outcome, SessionOutcome::Submitted(_)));
    assert_eq!(h.store.cleanup_count(), 1);
    assert_eq!(h.devices.live_track_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_steps_commit_awards_as_they_advance() {
    let store = Arc::new(InMemoryCleanupStore::new());
    let mut h = launch("Glass Bottle", settings(), store).await;

    h.handle.send(SessionCommand::StartRecording);
    expect(&mut h.events, |e| matches!(e, SessionEvent::TrashDetected { .. })).await;
    h.handle.send(SessionCommand::StopRecording);
    h.handle.send(SessionCommand::Advance);
    let event = expect(&mut h.events, |e| matches!(e, SessionEvent::StepAdvanced { .. })).await;
    assert_eq!(
        event,
        SessionEvent::StepAdvanced {
            index: 1,
            award: 15,
            cumulative_points: 15
        }
    );

    h.handle.send(SessionCommand::Close);
    assert_eq!(h.task.await.unwrap(), SessionOutcome::Closed);
    assert_eq!(h.devices.live_track_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_recording_auto_stops_once_at_ceiling() {
    let store = Arc::new(InMemoryCleanupStore::new());
    let mut h = launch("Paper Cup", settings(), store).await;
    let started = Instant::now();

    h.handle.send(SessionCommand::StartRecording);
    let event = expect(&mut h.events, |e| matches!(e, SessionEvent::RecordingFinished { .. })).await;
    let SessionEvent::RecordingFinished {
        duration_secs,
        reason,
        ..
    } = event
    else {
        unreachable!()
    };
    assert_eq!(duration_secs, 10);
    assert_eq!(reason, StopReason::DurationCeiling);
    assert!(started.elapsed() >= Duration::from_secs(10));

    // A late user stop is a no-op.
    h.handle.send(SessionCommand::StopRecording);
    h.handle.send(SessionCommand::Close);
    let rest = drain(&mut h.events).await;
    assert!(!rest
        .iter()
        .any(|e| matches!(e, SessionEvent::RecordingFinished { .. })));
    assert_eq!(h.task.await.unwrap(), SessionOutcome::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_while_recording_is_ignored() {
    let store = Arc::new(InMemoryCleanupStore::new());
    let mut h = launch("Paper Cup", settings(), store).await;

    h.handle.send(SessionCommand::StartRecording);
    h.handle.send(SessionCommand::StartRecording);
    h.handle.send(SessionCommand::StopRecording);
    h.handle.send(SessionCommand::Close);
    let events = drain(&mut h.events).await;

    let starts = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::RecordingStarted { .. }))
        .count();
    let finishes = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::RecordingFinished { .. }))
        .count();
    assert_eq!(starts, 1);
    assert_eq!(finishes, 1);
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::Notice { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_advance_is_rejected_until_detection_finishes() {
    let store = Arc::new(InMemoryCleanupStore::new());
    let mut h = launch("Food Wrapper", settings(), store).await;

    h.handle.send(SessionCommand::Advance);
    let event = expect(&mut h.events, |e| matches!(e, SessionEvent::AdvanceRejected { .. })).await;
    assert_eq!(
        event,
        SessionEvent::AdvanceRejected {
            reason: AdvanceBlocker::MissingArtifact
        }
    );

    h.handle.send(SessionCommand::StartRecording);
    h.handle.send(SessionCommand::Advance);
    let event = expect(&mut h.events, |e| matches!(e, SessionEvent::AdvanceRejected { .. })).await;
    assert_eq!(
        event,
        SessionEvent::AdvanceRejected {
            reason: AdvanceBlocker::RecordingInProgress
        }
    );

    // Stopping before the cycle completes discards it.
    h.handle.send(SessionCommand::StopRecording);
    expect(&mut h.events, |e| matches!(e, SessionEvent::DetectionDiscarded { step: 0 })).await;
    h.handle.send(SessionCommand::Advance);
    let event = expect(&mut h.events, |e| matches!(e, SessionEvent::AdvanceRejected { .. })).await;
    assert_eq!(
        event,
        SessionEvent::AdvanceRejected {
            reason: AdvanceBlocker::AwaitingDetection
        }
    );

    h.handle.send(SessionCommand::Close);
    h.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_retreat_from_first_step_exits_and_releases_camera() {
    let store = Arc::new(InMemoryCleanupStore::new());
    let mut h = launch("Plastic Bottle", settings(), store).await;

    h.handle.send(SessionCommand::StartRecording);
    expect(&mut h.events, |e| matches!(e, SessionEvent::TrashDetected { .. })).await;
    h.handle.send(SessionCommand::Retreat);
    expect(&mut h.events, |e| matches!(e, SessionEvent::Exited)).await;

    assert_eq!(h.task.await.unwrap(), SessionOutcome::Exited);
    assert_eq!(h.devices.live_track_count(), 0);
    assert_eq!(h.store.cleanup_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retreat_removes_exactly_the_committed_award() {
    let store = Arc::new(InMemoryCleanupStore::new());
    let mut h = launch("Cigarette Butt", settings(), store).await;

    finish_finding_step(&mut h).await;
    finish_finding_step(&mut h).await;

    h.handle.send(SessionCommand::Retreat);
    let event = expect(&mut h.events, |e| matches!(e, SessionEvent::SteppedBack { .. })).await;
    assert_eq!(
        event,
        SessionEvent::SteppedBack {
            index: 1,
            points_removed: 5,
            cumulative_points: 5
        }
    );

    h.handle.send(SessionCommand::Close);
    h.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_early_confirmation_verifies_without_fallback() {
    let store = Arc::new(InMemoryCleanupStore::new());
    let mut h = launch("Aluminum Can", settings().with_disposal_fallback(None), store).await;

    finish_finding_step(&mut h).await;
    finish_finding_step(&mut h).await;

    h.handle.send(SessionCommand::StartRecording);
    h.handle.send(SessionCommand::ConfirmDisposal);
    expect(&mut h.events, |e| matches!(e, SessionEvent::DisposalVerified { step: 2 })).await;
    h.handle.send(SessionCommand::StopRecording);
    h.handle.send(SessionCommand::Advance);
    expect(&mut h.events, |e| matches!(e, SessionEvent::Submitted { .. })).await;
    assert!(matches!(h.task.await.unwrap(), SessionOutcome::Submitted(_)));
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_before_disposal_recording_is_kept() {
    let store = Arc::new(InMemoryCleanupStore::new());
    let mut h = launch("Aluminum Can", settings().with_disposal_fallback(None), store).await;

    finish_finding_step(&mut h).await;
    finish_finding_step(&mut h).await;

    h.handle.send(SessionCommand::ConfirmDisposal);
    h.handle.send(SessionCommand::StartRecording);
    h.handle.send(SessionCommand::StopRecording);
    let seen = tokio::time::timeout(Duration::from_secs(30), async {
        let mut seen = Vec::new();
        loop {
            let event = h.events.recv().await.expect("event stream ended");
            let verified = matches!(event, SessionEvent::DisposalVerified { step: 2 });
            seen.push(event);
            if verified {
                return seen;
            }
        }
    })
    .await
    .expect("disposal never verified");
    assert!(!seen
        .iter()
        .any(|e| matches!(e, SessionEvent::DisposalHolding { .. })));

    h.handle.send(SessionCommand::Advance);
    expect(&mut h.events, |e| matches!(e, SessionEvent::Submitted { .. })).await;
    assert!(matches!(h.task.await.unwrap(), SessionOutcome::Submitted(_)));
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_is_dropped_when_leaving_the_step() {
    let store = Arc::new(InMemoryCleanupStore::new());
    let mut h = launch("Aluminum Can", settings().with_disposal_fallback(None), store).await;

    finish_finding_step(&mut h).await;
    finish_finding_step(&mut h).await;

    h.handle.send(SessionCommand::ConfirmDisposal);
    h.handle.send(SessionCommand::Retreat);
    expect(&mut h.events, |e| matches!(e, SessionEvent::SteppedBack { index: 1, .. })).await;
    h.handle.send(SessionCommand::Advance);
    expect(&mut h.events, |e| matches!(e, SessionEvent::StepAdvanced { index: 2, .. })).await;

    h.handle.send(SessionCommand::StartRecording);
    let event = expect(&mut h.events, |e| {
        matches!(
            e,
            SessionEvent::DisposalHolding { .. } | SessionEvent::DisposalVerified { .. }
        )
    })
    .await;
    assert!(matches!(event, SessionEvent::DisposalHolding { progress: 95 }));

    h.handle.send(SessionCommand::Close);
    assert_eq!(h.task.await.unwrap(), SessionOutcome::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_disposal_fallback_waits_two_seconds() {
    let store = Arc::new(InMemoryCleanupStore::new());
    let mut h = launch("Aluminum Can", settings(), store).await;

    finish_finding_step(&mut h).await;
    finish_finding_step(&mut h).await;

    h.handle.send(SessionCommand::StartRecording);
    expect(&mut h.events, |e| matches!(e, SessionEvent::DisposalHolding { .. })).await;
    h.handle.send(SessionCommand::StopRecording);
    expect(&mut h.events, |e| matches!(e, SessionEvent::RecordingFinished { step: 2, .. })).await;
    let finished = Instant::now();
    expect(&mut h.events, |e| matches!(e, SessionEvent::DisposalVerified { step: 2 })).await;
    let waited = finished.elapsed();

    // Confirmation lands at 2 s; the held cycle then needs three 50 ms ticks.
    assert!(waited >= Duration::from_secs(2), "verified after {waited:?}");
    assert!(waited < Duration::from_millis(2200), "verified after {waited:?}");

    h.handle.send(SessionCommand::Close);
    h.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_points_failure_keeps_session_and_retry_does_not_duplicate() {
    let user = UserId::new("tester");
    let store = Arc::new(InMemoryCleanupStore::new());
    store.fail_next_point_updates(1);
    let mut h = launch("Aluminum Can", settings(), store).await;

    finish_finding_step(&mut h).await;
    finish_finding_step(&mut h).await;
    record_disposal(&mut h).await;

    h.handle.send(SessionCommand::Advance);
    let event = expect(&mut h.events, |e| matches!(e, SessionEvent::Notice { .. })).await;
    assert!(matches!(
        event,
        SessionEvent::Notice {
            retryable: true,
            ..
        }
    ));
    assert_eq!(h.store.cleanup_count(), 1);

    h.handle.send(SessionCommand::Submit);
    let event = expect(&mut h.events, |e| matches!(e, SessionEvent::Submitted { .. })).await;
    let SessionEvent::Submitted { receipt } = event else {
        unreachable!()
    };
    assert_eq!(receipt.new_total, 50);
    assert_eq!(h.store.cleanup_count(), 1);
    assert_eq!(h.store.profile(&user).await.unwrap().total_points, 50);
    assert!(matches!(h.task.await.unwrap(), SessionOutcome::Submitted(_)));
}

#[tokio::test(start_paused = true)]
async fn test_missing_identity_keeps_session() {
    let store = Arc::new(InMemoryCleanupStore::new());
    let mut h = launch("Paper Cup", SessionSettings::default(), store).await;

    finish_finding_step(&mut h).await;
    finish_finding_step(&mut h).await;
    record_disposal(&mut h).await;

    h.handle.send(SessionCommand::Advance);
    let event = expect(&mut h.events, |e| matches!(e, SessionEvent::Notice { .. })).await;
    assert_eq!(
        event,
        SessionEvent::Notice {
            message: "Not signed in".to_string(),
            retryable: false
        }
    );
    assert_eq!(h.store.cleanup_count(), 0);

    h.handle.send(SessionCommand::Close);
    assert_eq!(h.task.await.unwrap(), SessionOutcome::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_camera_switch_is_blocked_while_recording() {
    let store = Arc::new(InMemoryCleanupStore::new());
    let mut h = launch("Paper Cup", settings(), store).await;

    h.handle.send(SessionCommand::StartRecording);
    h.handle.send(SessionCommand::SwitchCamera);
    expect(&mut h.events, |e| matches!(e, SessionEvent::Notice { .. })).await;

    h.handle.send(SessionCommand::StopRecording);
    h.handle.send(SessionCommand::SwitchCamera);
    let event = expect(&mut h.events, |e| matches!(e, SessionEvent::CameraReady { .. })).await;
    assert_eq!(
        event,
        SessionEvent::CameraReady {
            facing: FacingMode::User
        }
    );

    h.handle.send(SessionCommand::Close);
    h.task.await.unwrap();
    assert_eq!(h.devices.live_track_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_denied_camera_leaves_session_inert() {
    let store = Arc::new(InMemoryCleanupStore::new());
    let options = SimulatedOptions {
        camera: Permission::Denied,
        ..SimulatedOptions::default()
    };
    let (mut session, mut events, devices) =
        build_session("Paper Cup", settings(), store, options);

    let err = session.open().await.unwrap_err();
    assert!(matches!(
        err,
        trashcam_common::error::TrashcamError::CameraUnavailable { .. }
    ));
    assert!(matches!(
        events.recv().await,
        Some(SessionEvent::CameraUnavailable { .. })
    ));
    assert!(!session.capture().is_ready());
    assert!(!session.timers_armed());

    session.handle(SessionCommand::StartRecording).await;
    assert!(matches!(
        events.recv().await,
        Some(SessionEvent::Notice { .. })
    ));
    assert!(!session.recorder().is_recording());
    assert!(!session.timers_armed());

    // Granting permission and retrying recovers.
    devices.update(|o| o.camera = Permission::Granted);
    session.handle(SessionCommand::AcquireCamera).await;
    assert!(session.capture().is_ready());
    session.shutdown();
    assert_eq!(devices.live_track_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_playback_toggles_after_recording() {
    let store = Arc::new(InMemoryCleanupStore::new());
    let (mut session, mut events, _devices) =
        build_session("Paper Cup", settings(), store, SimulatedOptions::default());
    session.open().await.unwrap();

    session.handle(SessionCommand::TogglePlayback).await;
    session.handle(SessionCommand::StartRecording).await;
    session.handle(SessionCommand::StopRecording).await;
    assert!(session.workflow().current_result().artifact.is_some());
    assert!(!session.timers_armed());

    session.handle(SessionCommand::TogglePlayback).await;
    session.shutdown();

    let mut toggles = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::PlaybackToggled { playing } = event {
            toggles.push(playing);
        }
    }
    assert_eq!(toggles, vec![false]);
}

#[tokio::test]
async fn test_events_serialize_with_tag() {
    let json = serde_json::to_value(SessionEvent::AdvanceRejected {
        reason: AdvanceBlocker::AwaitingVerification,
    })
    .unwrap();
    assert_eq!(json["event"], "advance_rejected");
    assert_eq!(json["reason"], "awaiting_verification");
}
