//! Storage collaborator.
//!
//! The hosted backend exposes two tables: `cleanups` and `profiles`. Both
//! writes are keyed by the client-generated submission id so a retried
//! submission neither duplicates the row nor double counts the points.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use trashcam_model::{CleanupRecord, NewCleanup, Profile, UserId};
use uuid::Uuid;

/// Errors returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("rejected by backend: {0}")]
    Rejected(String),
}

#[async_trait::async_trait]
pub trait CleanupStore: Send + Sync {
    /// Insert into `cleanups`. Inserting an existing `submission_id`
    /// returns the stored row unchanged.
    async fn insert_cleanup(&self, new: NewCleanup) -> Result<CleanupRecord, StoreError>;

    /// Atomically add `delta` to the user's `total_points` and return the
    /// new total. Applying the same `submission_id` twice is a no-op.
    async fn add_points(
        &self,
        user: &UserId,
        delta: u32,
        submission_id: Uuid,
    ) -> Result<u64, StoreError>;

    /// Read a profile; unknown users have zero points.
    async fn profile(&self, user: &UserId) -> Result<Profile, StoreError>;
}

#[derive(Debug, Default)]
struct Tables {
    cleanups: Vec<CleanupRecord>,
    totals: HashMap<UserId, u64>,
    applied: HashSet<Uuid>,
}

#[derive(Debug, Default)]
struct Faults {
    inserts: VecDeque<StoreError>,
    point_updates: VecDeque<StoreError>,
}

/// Process-local store with injectable failures.
#[derive(Debug, Default)]
pub struct InMemoryCleanupStore {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
}

impl InMemoryCleanupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a user with an existing balance.
    pub fn with_profile(self, user: UserId, total_points: u64) -> Self {
        self.lock_tables().totals.insert(user, total_points);
        self
    }

    /// Fail the next `n` inserts with a network error.
    pub fn fail_next_inserts(&self, n: u32) {
        for _ in 0..n {
            self.fail_next_insert_with(StoreError::Network(
                "insert into cleanups timed out".to_string(),
            ));
        }
    }

    /// Fail the next `n` point updates with a network error.
    pub fn fail_next_point_updates(&self, n: u32) {
        for _ in 0..n {
            self.fail_next_point_update_with(StoreError::Network(
                "update of profiles timed out".to_string(),
            ));
        }
    }

    /// Queue a specific error for an upcoming insert.
    pub fn fail_next_insert_with(&self, error: StoreError) {
        self.lock_faults().inserts.push_back(error);
    }

    /// Queue a specific error for an upcoming point update.
    pub fn fail_next_point_update_with(&self, error: StoreError) {
        self.lock_faults().point_updates.push_back(error);
    }

    pub fn cleanups(&self) -> Vec<CleanupRecord> {
        self.lock_tables().cleanups.clone()
    }

    pub fn cleanup_count(&self) -> usize {
        self.lock_tables().cleanups.len()
    }

    fn lock_tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl CleanupStore for InMemoryCleanupStore {
    async fn insert_cleanup(&self, new: NewCleanup) -> Result<CleanupRecord, StoreError> {
        if let Some(error) = self.lock_faults().inserts.pop_front() {
            return Err(error);
        }
        let mut tables = self.lock_tables();
        if let Some(existing) = tables
            .cleanups
            .iter()
            .find(|r| r.submission_id == new.submission_id)
        {
            tracing::debug!(submission_id = %new.submission_id, "Duplicate cleanup insert ignored");
            return Ok(existing.clone());
        }
        let record = CleanupRecord::from_new(new);
        tables.cleanups.push(record.clone());
        tracing::debug!(record_id = %record.id, user = %record.user_id, "Cleanup inserted");
        Ok(record)
    }

    async fn add_points(
        &self,
        user: &UserId,
        delta: u32,
        submission_id: Uuid,
    ) -> Result<u64, StoreError> {
        if let Some(error) = self.lock_faults().point_updates.pop_front() {
            return Err(error);
        }
        let mut tables = self.lock_tables();
        let first_time = tables.applied.insert(submission_id);
        let total = tables.totals.entry(user.clone()).or_insert(0);
        if first_time {
            *total += u64::from(delta);
        }
        Ok(*total)
    }

    async fn profile(&self, user: &UserId) -> Result<Profile, StoreError> {
        let tables = self.lock_tables();
        Ok(Profile {
            id: user.clone(),
            total_points: tables.totals.get(user).copied().unwrap_or(0),
        })
    }
}
