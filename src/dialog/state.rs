//! Dialog states and the per-user session table.

use std::collections::HashMap;

use crate::search::SearchCursor;

/// Where a user is in the conversation.
///
/// Progresses Begin → Start → City → Age → Sex → Search, with the profile
/// fields already known skipped. A cleared session is equivalent to `Begin`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DialogState {
    #[default]
    Begin,
    Start,
    City,
    Age,
    Sex,
    Search,
}

impl std::fmt::Display for DialogState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Begin => "begin",
            Self::Start => "start",
            Self::City => "city",
            Self::Age => "age",
            Self::Sex => "sex",
            Self::Search => "search",
        };
        write!(f, "{s}")
    }
}

/// In-memory session data of every user: dialog state and search cursor.
///
/// Owned by the control loop and lost on restart.
#[derive(Debug, Default)]
pub struct Sessions {
    states: HashMap<i64, DialogState>,
    cursors: HashMap<i64, SearchCursor>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state; `Begin` when the user has no session.
    pub fn state(&self, user_id: i64) -> DialogState {
        self.states.get(&user_id).copied().unwrap_or_default()
    }

    pub fn set_state(&mut self, user_id: i64, state: DialogState) {
        self.states.insert(user_id, state);
    }

    /// Forget the user's state and search cursor.
    pub fn clear(&mut self, user_id: i64) {
        self.states.remove(&user_id);
        self.cursors.remove(&user_id);
    }

    /// Install a search cursor, replacing any previous one.
    pub fn set_cursor(&mut self, user_id: i64, cursor: SearchCursor) {
        self.cursors.insert(user_id, cursor);
    }

    pub fn cursor_mut(&mut self, user_id: i64) -> Option<&mut SearchCursor> {
        self.cursors.get_mut(&user_id)
    }

    pub fn has_cursor(&self, user_id: i64) -> bool {
        self.cursors.contains_key(&user_id)
    }

    /// Whether the user has any session data at all.
    pub fn is_active(&self, user_id: i64) -> bool {
        self.states.contains_key(&user_id) || self.cursors.contains_key(&user_id)
    }
}
