//! The partner search engine.
//!
//! A search is an explicit [`SearchCursor`] owned by the caller. Each call to
//! [`SearchEngine::next_match`] walks the cursor's held-back page, fetching the
//! next page when it runs dry, until one candidate passes both checks:
//!
//! 1. not yet in the global partner ledger;
//! 2. at least one photo (ranked by likes, top three kept).
//!
//! Delivered candidates are recorded with [`SearchEngine::mark_delivered`].

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::error::DatabaseError;
use crate::model::{Candidate, Profile};
use crate::search::cursor::{SearchCursor, filter_for};
use crate::search::photos::{PhotoSelection, select_photos};
use crate::social::SocialGraph;
use crate::store::ProfileStore;

/// A candidate ready to be presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub candidate: Candidate,
    pub photos: PhotoSelection,
}

pub struct SearchEngine {
    graph: Arc<dyn SocialGraph>,
    store: Arc<dyn ProfileStore>,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(
        graph: Arc<dyn SocialGraph>,
        store: Arc<dyn ProfileStore>,
        config: SearchConfig,
    ) -> Self {
        Self {
            graph,
            store,
            config,
        }
    }

    /// Open a cursor for a complete profile; `None` if it cannot be searched.
    pub fn start(&self, profile: &Profile) -> Option<SearchCursor> {
        let filter = filter_for(profile, &self.config)?;
        debug!(user_id = profile.user_id, ?filter, "Search started");
        Some(SearchCursor::new(filter, self.config.page_size))
    }

    /// Advance the cursor to the next qualifying candidate.
    ///
    /// Returns `None` once the service yields an empty page.
    pub async fn next_match(&self, cursor: &mut SearchCursor) -> Option<Match> {
        loop {
            while let Some(candidate) = cursor.pop_pending() {
                if let Some(found) = self.qualify(candidate).await {
                    return Some(found);
                }
            }

            if cursor.is_exhausted() {
                return None;
            }

            let offset = cursor.claim_page();
            let page = match self
                .graph
                .search_candidates(cursor.filter(), cursor.page_size(), offset)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(offset, "Candidate search failed: {e}");
                    Vec::new()
                }
            };
            debug!(offset, found = page.len(), "Fetched candidate page");
            cursor.fill(page);
        }
    }

    /// Record a candidate as delivered so no search offers it again.
    pub async fn mark_delivered(&self, candidate_id: i64) -> Result<(), DatabaseError> {
        if !self.store.ledger_add(candidate_id).await? {
            debug!(candidate_id, "Candidate was already in the ledger");
        }
        Ok(())
    }

    async fn qualify(&self, candidate: Candidate) -> Option<Match> {
        match self.store.ledger_contains(candidate.id).await {
            Ok(false) => {}
            Ok(true) => {
                debug!(candidate_id = candidate.id, "Skipping already delivered candidate");
                return None;
            }
            Err(e) => {
                warn!(candidate_id = candidate.id, "Ledger lookup failed, skipping: {e}");
                return None;
            }
        }

        let Some(photos) = select_photos(
            self.graph.as_ref(),
            candidate.id,
            self.config.photo_fetch_limit,
            self.config.top_photos,
        )
        .await
        else {
            debug!(candidate_id = candidate.id, "Skipping candidate without photos");
            return None;
        };

        Some(Match { candidate, photos })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::ApiError;
    use crate::model::{Photo, RemoteProfile, Sex};
    use crate::social::SearchFilter;
    use crate::store::LibSqlBackend;

    /// Social graph serving a fixed candidate list in pages.
    #[derive(Default)]
    struct FakeGraph {
        candidates: Vec<Candidate>,
        photos: HashMap<i64, Vec<u32>>,
        failing_photos: Vec<i64>,
        requested_offsets: Mutex<Vec<u32>>,
    }

    impl FakeGraph {
        fn with_candidates(ids: &[i64]) -> Self {
            let candidates = ids
                .iter()
                .map(|&id| Candidate {
                    id,
                    first_name: format!("First{id}"),
                    last_name: format!("Last{id}"),
                })
                .collect();
            let photos = ids.iter().map(|&id| (id, vec![1])).collect();
            Self {
                candidates,
                photos,
                ..Default::default()
            }
        }

        fn offsets(&self) -> Vec<u32> {
            self.requested_offsets.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SocialGraph for FakeGraph {
        async fn resolve_profile(&self, _user_id: i64) -> Result<RemoteProfile, ApiError> {
            Ok(RemoteProfile::default())
        }

        async fn resolve_city_by_name(&self, _name: &str) -> Result<Option<i64>, ApiError> {
            Ok(None)
        }

        async fn resolve_city_title(&self, _city_id: i64) -> Result<Option<String>, ApiError> {
            Ok(None)
        }

        async fn search_candidates(
            &self,
            _filter: &SearchFilter,
            count: u32,
            offset: u32,
        ) -> Result<Vec<Candidate>, ApiError> {
            self.requested_offsets.lock().unwrap().push(offset);
            Ok(self
                .candidates
                .iter()
                .skip(offset as usize)
                .take(count as usize)
                .cloned()
                .collect())
        }

        async fn list_photos(&self, owner_id: i64, _limit: u32) -> Result<Vec<Photo>, ApiError> {
            if self.failing_photos.contains(&owner_id) {
                return Err(ApiError::Remote {
                    method: "photos.getAll".into(),
                    code: 30,
                    message: "This profile is private".into(),
                });
            }
            Ok(self
                .photos
                .get(&owner_id)
                .map(|likes| {
                    likes
                        .iter()
                        .enumerate()
                        .map(|(i, &likes)| Photo {
                            id: i as i64 + 1,
                            owner_id,
                            likes,
                        })
                        .collect()
                })
                .unwrap_or_default())
        }
    }

    fn searcher() -> Profile {
        Profile {
            city_id: Some(1),
            city_title: Some("Москва".into()),
            age: Some(30),
            sex: Sex::Male,
            ..Profile::new(1)
        }
    }

    async fn engine_with(graph: FakeGraph) -> (SearchEngine, Arc<FakeGraph>, Arc<LibSqlBackend>) {
        let graph = Arc::new(graph);
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let engine = SearchEngine::new(graph.clone(), store.clone(), SearchConfig::default());
        (engine, graph, store)
    }

    async fn drain(engine: &SearchEngine, cursor: &mut SearchCursor) -> Vec<i64> {
        let mut ids = Vec::new();
        while let Some(m) = engine.next_match(cursor).await {
            engine.mark_delivered(m.candidate.id).await.unwrap();
            ids.push(m.candidate.id);
        }
        ids
    }

    #[tokio::test]
    async fn yields_candidates_in_page_order_across_pages() {
        let (engine, graph, _) = engine_with(FakeGraph::with_candidates(&[1, 2, 3, 4, 5, 6, 7])).await;
        let mut cursor = engine.start(&searcher()).unwrap();

        let ids = drain(&engine, &mut cursor).await;
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(graph.offsets(), vec![0, 5, 10]);
    }

    #[tokio::test]
    async fn holds_remaining_page_between_pulls() {
        let (engine, graph, _) = engine_with(FakeGraph::with_candidates(&[1, 2, 3])).await;
        let mut cursor = engine.start(&searcher()).unwrap();

        let first = engine.next_match(&mut cursor).await.unwrap();
        let second = engine.next_match(&mut cursor).await.unwrap();
        assert_eq!(first.candidate.id, 1);
        assert_eq!(second.candidate.id, 2);
        assert_eq!(graph.offsets(), vec![0]);
    }

    #[tokio::test]
    async fn offsets_are_never_requested_twice() {
        let (engine, graph, _) = engine_with(FakeGraph::with_candidates(&[1, 2])).await;
        let mut cursor = engine.start(&searcher()).unwrap();

        drain(&engine, &mut cursor).await;
        assert!(engine.next_match(&mut cursor).await.is_none());
        assert!(engine.next_match(&mut cursor).await.is_none());
        assert_eq!(graph.offsets(), vec![0, 5]);
    }

    #[tokio::test]
    async fn skips_ledger_entries_for_every_requester() {
        let (engine, _, store) = engine_with(FakeGraph::with_candidates(&[1, 2, 3])).await;
        store.ledger_add(2).await.unwrap();

        let mut first = engine.start(&searcher()).unwrap();
        assert_eq!(drain(&engine, &mut first).await, vec![1, 3]);

        let other = Profile {
            user_id: 2,
            ..searcher()
        };
        let mut second = engine.start(&other).unwrap();
        assert!(engine.next_match(&mut second).await.is_none());
    }

    #[tokio::test]
    async fn skips_candidates_without_photos() {
        let mut graph = FakeGraph::with_candidates(&[1, 2, 3]);
        graph.photos.insert(1, vec![]);
        graph.failing_photos.push(2);
        let (engine, _, _) = engine_with(graph).await;
        let mut cursor = engine.start(&searcher()).unwrap();

        assert_eq!(drain(&engine, &mut cursor).await, vec![3]);
    }

    #[tokio::test]
    async fn match_carries_top_three_photos() {
        let mut graph = FakeGraph::with_candidates(&[1]);
        graph.photos.insert(1, vec![3, 9, 1, 7]);
        let (engine, _, _) = engine_with(graph).await;
        let mut cursor = engine.start(&searcher()).unwrap();

        let m = engine.next_match(&mut cursor).await.unwrap();
        let likes: Vec<u32> = m.photos.photos().iter().map(|p| p.likes).collect();
        assert_eq!(likes, vec![9, 7, 3]);
        assert_eq!(m.photos.attachment(), "photo1_2,photo1_4,photo1_1");
    }

    #[tokio::test]
    async fn empty_first_page_is_exhaustion() {
        let (engine, _, _) = engine_with(FakeGraph::default()).await;
        let mut cursor = engine.start(&searcher()).unwrap();
        assert!(engine.next_match(&mut cursor).await.is_none());
        assert!(cursor.is_exhausted());
    }

    #[tokio::test]
    async fn mark_delivered_is_idempotent() {
        let (engine, _, store) = engine_with(FakeGraph::default()).await;
        engine.mark_delivered(5).await.unwrap();
        engine.mark_delivered(5).await.unwrap();
        assert!(store.ledger_contains(5).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_sex_is_not_searched() {
        let (engine, _, _) = engine_with(FakeGraph::default()).await;
        let profile = Profile {
            sex: Sex::Unknown,
            ..searcher()
        };
        assert!(engine.start(&profile).is_none());
    }
}
