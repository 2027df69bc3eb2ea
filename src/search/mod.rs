//! Partner search: paginated, deduplicated, photo-qualified candidate
//! discovery driven by an explicit per-user cursor.

pub mod cursor;
pub mod engine;
pub mod photos;

pub use cursor::SearchCursor;
pub use engine::{Match, SearchEngine};
pub use photos::{PhotoSelection, rank_photos};
