//! `ProfileStore` trait: the async persistence contract used by the dialog
//! and the search engine.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::model::Profile;

/// Durable storage for user profiles and the ledger of delivered partners.
///
/// The ledger is global: a partner recorded for one user is excluded from
/// every user's search.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Profiles ────────────────────────────────────────────────────

    /// Load the profile of a VK user, if one was stored.
    async fn get_profile(&self, user_id: i64) -> Result<Option<Profile>, DatabaseError>;

    /// Insert or update the profile keyed by its VK user id.
    ///
    /// Returns the stored profile with `db_id` populated.
    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, DatabaseError>;

    /// Delete a profile. Returns whether a row was removed.
    async fn delete_profile(&self, user_id: i64) -> Result<bool, DatabaseError>;

    // ── Partner ledger ──────────────────────────────────────────────

    /// Whether a partner has already been delivered to anyone.
    async fn ledger_contains(&self, partner_id: i64) -> Result<bool, DatabaseError>;

    /// Record a delivered partner. Returns `false` when it was already present.
    async fn ledger_add(&self, partner_id: i64) -> Result<bool, DatabaseError>;

    /// Forget every delivered partner. Returns the number of rows removed.
    async fn ledger_clear_all(&self) -> Result<usize, DatabaseError>;
}
