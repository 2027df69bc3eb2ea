//! Per-user search cursor: page offset, filter snapshot and held-back page.

use std::collections::VecDeque;

use crate::config::SearchConfig;
use crate::model::{Candidate, Profile};
use crate::social::{RELATION_ACTIVELY_SEARCHING, SearchFilter};

/// Build the search filter for a complete profile.
///
/// Returns `None` when city, age or a concrete sex is missing.
pub fn filter_for(profile: &Profile, config: &SearchConfig) -> Option<SearchFilter> {
    let sex = profile.sex.opposite()?;
    let age = profile.age?;
    let city_id = profile.city_id?;

    Some(SearchFilter {
        sex,
        age_from: age - config.age_spread,
        age_to: age + config.age_spread,
        city_id,
        has_photo: true,
        relation: Some(RELATION_ACTIVELY_SEARCHING),
    })
}

/// Resumable position of one user's search.
#[derive(Debug, Clone)]
pub struct SearchCursor {
    filter: SearchFilter,
    page_size: u32,
    next_offset: u32,
    pending: VecDeque<Candidate>,
    exhausted: bool,
}

impl SearchCursor {
    pub fn new(filter: SearchFilter, page_size: u32) -> Self {
        Self {
            filter,
            page_size,
            next_offset: 0,
            pending: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn filter(&self) -> &SearchFilter {
        &self.filter
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Offset of the next page to request.
    pub fn next_offset(&self) -> u32 {
        self.next_offset
    }

    /// Whether an empty page has been seen.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Next held-back candidate of the current page.
    pub(crate) fn pop_pending(&mut self) -> Option<Candidate> {
        self.pending.pop_front()
    }

    /// Claim the next page offset; the cursor never hands out an offset twice.
    pub(crate) fn claim_page(&mut self) -> u32 {
        let offset = self.next_offset;
        self.next_offset += self.page_size;
        offset
    }

    /// Store a fetched page. An empty page ends the search.
    pub(crate) fn fill(&mut self, page: Vec<Candidate>) {
        if page.is_empty() {
            self.exhausted = true;
        }
        self.pending.extend(page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Sex;

    fn complete_profile() -> Profile {
        Profile {
            city_id: Some(1),
            city_title: Some("Москва".into()),
            age: Some(30),
            sex: Sex::Male,
            ..Profile::new(7)
        }
    }

    #[test]
    fn filter_searches_opposite_sex_within_one_year() {
        let filter = filter_for(&complete_profile(), &SearchConfig::default()).unwrap();
        assert_eq!(filter.sex, Sex::Female);
        assert_eq!(filter.age_from, 29);
        assert_eq!(filter.age_to, 31);
        assert_eq!(filter.city_id, 1);
        assert!(filter.has_photo);
    }

    #[test]
    fn filter_uses_plain_integer_window() {
        let profile = Profile {
            age: Some(0),
            ..complete_profile()
        };
        let filter = filter_for(&profile, &SearchConfig::default()).unwrap();
        assert_eq!(filter.age_from, -1);
        assert_eq!(filter.age_to, 1);
    }

    #[test]
    fn no_filter_for_unknown_sex() {
        let profile = Profile {
            sex: Sex::Unknown,
            ..complete_profile()
        };
        assert!(filter_for(&profile, &SearchConfig::default()).is_none());
    }

    #[test]
    fn no_filter_without_city_or_age() {
        let no_city = Profile {
            city_id: None,
            ..complete_profile()
        };
        let no_age = Profile {
            age: None,
            ..complete_profile()
        };
        assert!(filter_for(&no_city, &SearchConfig::default()).is_none());
        assert!(filter_for(&no_age, &SearchConfig::default()).is_none());
    }

    #[test]
    fn claimed_offsets_increase_by_page_size() {
        let filter = filter_for(&complete_profile(), &SearchConfig::default()).unwrap();
        let mut cursor = SearchCursor::new(filter, 5);
        assert_eq!(cursor.claim_page(), 0);
        assert_eq!(cursor.claim_page(), 5);
        assert_eq!(cursor.claim_page(), 10);
        assert_eq!(cursor.next_offset(), 15);
    }

    #[test]
    fn empty_page_exhausts() {
        let filter = filter_for(&complete_profile(), &SearchConfig::default()).unwrap();
        let mut cursor = SearchCursor::new(filter, 5);
        cursor.fill(vec![]);
        assert!(cursor.is_exhausted());
        assert!(cursor.pop_pending().is_none());
    }
}
