//! Persisted records.
//!
//! These mirror the hosted backend's `cleanups` and `profiles` tables.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// WGS84 coordinate of the cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat: lat.clamp(-90.0, 90.0),
            lon: lon.clamp(-180.0, 180.0),
        }
    }
}

/// A cleanup row as sent to the store. The store assigns `id` and
/// `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCleanup {
    /// Client-generated key; resubmitting the same key is a no-op.
    pub submission_id: Uuid,
    pub user_id: UserId,
    pub location: GeoPoint,
    pub total_points: u32,
    pub estimated_weight_kg: f64,
    /// Label of the classified trash type.
    pub trash_type: String,
}

/// A persisted cleanup row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupRecord {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub user_id: UserId,
    pub location: GeoPoint,
    pub total_points: u32,

    /// Set later by moderation; always false on insert.
    #[serde(default)]
    pub verified: bool,

    pub estimated_weight_kg: f64,
    pub trash_type: String,

    /// Insert timestamp (RFC 3339).
    pub created_at: String,
}

impl CleanupRecord {
    /// Materialize a row from an insert request.
    pub fn from_new(new: NewCleanup) -> Self {
        Self {
            id: Uuid::new_v4(),
            submission_id: new.submission_id,
            user_id: new.user_id,
            location: new.location,
            total_points: new.total_points,
            verified: false,
            estimated_weight_kg: new.estimated_weight_kg,
            trash_type: new.trash_type,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// The `profiles` row relevant to scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub total_points: u64,
}
