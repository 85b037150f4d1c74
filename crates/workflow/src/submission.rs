//! Submission and scoring.
//!
//! A completed session becomes one `cleanups` row plus one increment of
//! the user's running total. Both writes carry the session's submission id,
//! so retrying after a partial failure neither duplicates the row nor
//! double counts the points.

use std::sync::Arc;

use serde::Serialize;
use trashcam_common::error::{TrashcamError, TrashcamResult};
use trashcam_model::{CleanupRecord, GeoPoint, NewCleanup, UserId};

use crate::orchestrator::WorkflowSession;
use crate::store::{CleanupStore, StoreError};

/// What a successful submission produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub record: CleanupRecord,
    /// The user's running total after this cleanup.
    pub new_total: u64,
}

#[derive(Clone)]
pub struct Submitter {
    store: Arc<dyn CleanupStore>,
}

impl Submitter {
    pub fn new(store: Arc<dyn CleanupStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CleanupStore> {
        &self.store
    }

    /// Persist a completed session.
    ///
    /// The session is cleared only on success. Any failure leaves it intact
    /// so the caller can retry with the same submission id.
    pub async fn submit(
        &self,
        session: &mut WorkflowSession,
        user: Option<&UserId>,
        location: GeoPoint,
    ) -> TrashcamResult<SubmissionReceipt> {
        let Some(user) = user else {
            tracing::warn!("Submission refused: no authenticated user");
            return Err(TrashcamError::NotAuthenticated);
        };
        if !session.is_complete() {
            return Err(TrashcamError::invalid_transition(
                "cannot submit before every step is complete",
            ));
        }

        let new = NewCleanup {
            submission_id: session.submission_id(),
            user_id: user.clone(),
            location,
            total_points: session.cumulative_points(),
            estimated_weight_kg: session.estimated_weight_kg(),
            trash_type: session.trash_type_label().unwrap_or_default().to_string(),
        };
        let submission_id = new.submission_id;
        let delta = new.total_points;

        tracing::info!(
            %submission_id,
            user = %user,
            total_points = delta,
            trash_type = %new.trash_type,
            "Submitting cleanup"
        );

        let record = self.store.insert_cleanup(new).await.map_err(|e| {
            tracing::error!(%submission_id, error = %e, "Cleanup insert failed");
            store_failure(e, false)
        })?;

        let new_total = self
            .store
            .add_points(user, delta, submission_id)
            .await
            .map_err(|e| {
                tracing::error!(
                    %submission_id,
                    record_id = %record.id,
                    error = %e,
                    "Points update failed after insert"
                );
                store_failure(e, true)
            })?;

        session.clear();
        tracing::info!(record_id = %record.id, new_total, "Cleanup submitted");
        Ok(SubmissionReceipt { record, new_total })
    }
}

/// Map a backend failure onto the user-visible taxonomy. Only transport
/// failures are worth an unchanged retry.
fn store_failure(error: StoreError, record_written: bool) -> TrashcamError {
    match error {
        StoreError::Unauthorized(_) => TrashcamError::NotAuthenticated,
        StoreError::Rejected(message) => TrashcamError::persistence(message),
        network @ StoreError::Network(_) => {
            TrashcamError::submission(network.to_string(), record_written)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::AdvanceOutcome;
    use crate::store::InMemoryCleanupStore;
    use trashcam_detection::{find_trash_type, DetectionOutcome};
    use trashcam_model::{Artifact, StopReason};

    fn completed_session(label: &str) -> WorkflowSession {
        let trash_type = find_trash_type(label).unwrap();
        let mut session = WorkflowSession::default();
        for _ in 0..2 {
            session.record_artifact(clip());
            session.record_outcome(DetectionOutcome::new(trash_type, 0.9));
            session.advance();
        }
        session.record_artifact(clip());
        session.record_verified();
        assert!(matches!(session.advance(), AdvanceOutcome::ReadyToSubmit { .. }));
        session
    }

    fn clip() -> Artifact {
        Artifact::assemble(
            vec![vec![0u8; 16]],
            "video/webm;codecs=vp8",
            4,
            false,
            StopReason::User,
            "2026-01-01T00:00:00Z",
        )
    }

    #[tokio::test]
    async fn test_submits_one_record_and_clears_session() {
        let user = UserId::new("u1");
        let store = Arc::new(InMemoryCleanupStore::new().with_profile(user.clone(), 7));
        let submitter = Submitter::new(store.clone());
        let mut session = completed_session("Plastic Bottle");

        let receipt = submitter
            .submit(&mut session, Some(&user), GeoPoint::new(1.0, 2.0))
            .await
            .unwrap();

        assert_eq!(receipt.record.total_points, 50);
        assert_eq!(receipt.record.trash_type, "Plastic Bottle");
        assert!(!receipt.record.verified);
        assert_eq!(receipt.new_total, 57);
        assert_eq!(store.cleanup_count(), 1);
        assert_eq!(session.cumulative_points(), 0);
        assert!(!session.is_complete());
    }

    #[tokio::test]
    async fn test_missing_identity_is_not_authenticated() {
        let store = Arc::new(InMemoryCleanupStore::new());
        let submitter = Submitter::new(store.clone());
        let mut session = completed_session("Paper Cup");

        let err = submitter
            .submit(&mut session, None, GeoPoint::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TrashcamError::NotAuthenticated));
        assert_eq!(store.cleanup_count(), 0);
        assert!(session.is_complete());
    }

    #[tokio::test]
    async fn test_incomplete_session_is_rejected() {
        let submitter = Submitter::new(Arc::new(InMemoryCleanupStore::new()));
        let mut session = WorkflowSession::default();
        let err = submitter
            .submit(&mut session, Some(&UserId::new("u1")), GeoPoint::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TrashcamError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_insert_failure_keeps_session() {
        let user = UserId::new("u1");
        let store = Arc::new(InMemoryCleanupStore::new());
        store.fail_next_inserts(1);
        let submitter = Submitter::new(store.clone());
        let mut session = completed_session("Paper Cup");
        let id = session.submission_id();

        let err = submitter
            .submit(&mut session, Some(&user), GeoPoint::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TrashcamError::SubmissionFailed {
                record_written: false,
                ..
            }
        ));
        assert!(session.is_complete());
        assert_eq!(session.submission_id(), id);
        assert_eq!(store.cleanup_count(), 0);

        submitter
            .submit(&mut session, Some(&user), GeoPoint::default())
            .await
            .unwrap();
        assert_eq!(store.cleanup_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_after_points_failure_does_not_duplicate() {
        let user = UserId::new("u1");
        let store = Arc::new(InMemoryCleanupStore::new());
        store.fail_next_point_updates(1);
        let submitter = Submitter::new(store.clone());
        let mut session = completed_session("Aluminum Can");

        let err = submitter
            .submit(&mut session, Some(&user), GeoPoint::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TrashcamError::SubmissionFailed {
                record_written: true,
                ..
            }
        ));
        assert!(err.is_retryable());
        assert_eq!(store.cleanup_count(), 1);
        assert_eq!(session.cumulative_points(), 50);

        let receipt = submitter
            .submit(&mut session, Some(&user), GeoPoint::default())
            .await
            .unwrap();
        assert_eq!(store.cleanup_count(), 1);
        assert_eq!(receipt.new_total, 50);
        assert_eq!(store.profile(&user).await.unwrap().total_points, 50);
    }

    #[tokio::test]
    async fn test_backend_auth_failure_is_not_authenticated() {
        let user = UserId::new("u1");
        let store = Arc::new(InMemoryCleanupStore::new());
        store.fail_next_insert_with(StoreError::Unauthorized("jwt expired".to_string()));
        let submitter = Submitter::new(store.clone());
        let mut session = completed_session("Paper Cup");

        let err = submitter
            .submit(&mut session, Some(&user), GeoPoint::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TrashcamError::NotAuthenticated));
        assert!(!err.is_retryable());
        assert!(session.is_complete());
        assert_eq!(store.cleanup_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_write_is_a_persistence_error() {
        let user = UserId::new("u1");
        let store = Arc::new(InMemoryCleanupStore::new());
        store.fail_next_insert_with(StoreError::Rejected(
            "total_points violates check constraint".to_string(),
        ));
        let submitter = Submitter::new(store.clone());
        let mut session = completed_session("Glass Bottle");

        let err = submitter
            .submit(&mut session, Some(&user), GeoPoint::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TrashcamError::Persistence { .. }));
        assert_eq!(
            err.to_string(),
            "Persistence error: total_points violates check constraint"
        );
        assert!(!err.is_retryable());
        assert!(session.is_complete());
    }
}
