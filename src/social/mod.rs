//! Social graph service: profile lookup, city resolution, partner search
//! and photo listing.

pub mod vk;

pub use vk::VkSocialGraph;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::model::{Candidate, Photo, RemoteProfile, Sex};

/// VK relation status "actively searching".
pub const RELATION_ACTIVELY_SEARCHING: u8 = 6;

/// Filter of one partner search, fixed when the search starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    pub sex: Sex,
    pub age_from: i32,
    pub age_to: i32,
    pub city_id: i64,
    pub has_photo: bool,
    pub relation: Option<u8>,
}

/// The external social graph the bot reads from.
///
/// Every method may fail; callers decide how a failure degrades.
#[async_trait]
pub trait SocialGraph: Send + Sync {
    /// Look up the public profile attributes of a user.
    async fn resolve_profile(&self, user_id: i64) -> Result<RemoteProfile, ApiError>;

    /// Find the id of the best city match for a free-text name.
    async fn resolve_city_by_name(&self, name: &str) -> Result<Option<i64>, ApiError>;

    /// Display title of a city id.
    async fn resolve_city_title(&self, city_id: i64) -> Result<Option<String>, ApiError>;

    /// One page of candidates matching `filter`, in the service's order.
    async fn search_candidates(
        &self,
        filter: &SearchFilter,
        count: u32,
        offset: u32,
    ) -> Result<Vec<Candidate>, ApiError>;

    /// Photos of a user, in the order the service returns them.
    async fn list_photos(&self, owner_id: i64, limit: u32) -> Result<Vec<Photo>, ApiError>;
}
