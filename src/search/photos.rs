//! Photo ranking by popularity.

use crate::model::Photo;
use crate::social::SocialGraph;

/// The photos chosen to present a candidate, most liked first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoSelection {
    photos: Vec<Photo>,
}

impl PhotoSelection {
    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    /// Comma-separated attachment references for `messages.send`.
    pub fn attachment(&self) -> String {
        self.photos
            .iter()
            .map(Photo::attachment)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Sort by like count, descending, and keep the first `top`.
///
/// The sort is stable, so equally liked photos keep their arrival order.
pub fn rank_photos(mut photos: Vec<Photo>, top: usize) -> Vec<Photo> {
    photos.sort_by(|a, b| b.likes.cmp(&a.likes));
    photos.truncate(top);
    photos
}

/// Fetch and rank a candidate's photos.
///
/// Returns `None` when the candidate has no usable photos, including when
/// the listing call fails.
pub async fn select_photos(
    graph: &dyn SocialGraph,
    owner_id: i64,
    fetch_limit: u32,
    top: usize,
) -> Option<PhotoSelection> {
    let photos = match graph.list_photos(owner_id, fetch_limit).await {
        Ok(photos) => photos,
        Err(e) => {
            tracing::warn!(candidate_id = owner_id, "Photo listing failed: {e}");
            return None;
        }
    };

    let photos = rank_photos(photos, top);
    if photos.is_empty() {
        return None;
    }
    Some(PhotoSelection { photos })
}
