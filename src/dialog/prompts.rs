//! Bot texts, command vocabulary and reply keyboards.

use crate::channels::{Button, ButtonColor, Keyboard};
use crate::model::{Candidate, Profile, Sex};

pub const YES_LABEL: &str = "Да";
pub const NO_LABEL: &str = "Нет";
pub const SKIP_LABEL: &str = "Пропустить";
pub const RESET_LABEL: &str = "Очистить и начать заново";

pub const GREETING: &str = "Привет! Я бот, который поможет тебе найти пару. Начнем?";
pub const SESSION_CLEARED: &str = "Сессия очищена";
pub const CANCELLED: &str = "Отмена поиска";
pub const FAREWELL: &str = "Пока!";
pub const NOT_UNDERSTOOD: &str = "Не понял тебя. Нажми 'Да' или 'Нет'";

pub const ASK_CITY: &str = "Какой город тебя интересует?";
pub const ASK_AGE: &str = "Какой возраст тебя интересует?";
pub const ASK_SEX: &str = "Укажи свой пол: м или ж";

pub const CITY_NOT_FOUND: &str = "Не удалось найти город. Попробуйте еще раз...";
pub const BAD_AGE: &str = "Некорректный формат возраста. Попробуйте еще раз...";
pub const BAD_SEX: &str = "Некорректный пол. Попробуйте еще раз...";

pub const SEARCH_ANNOUNCED: &str = "Начинаю поиск. Это может занять некоторое время...";
pub const SEARCH_NOT_STARTED: &str = "Поиск не был запущен. Попробуйте еще раз...";
pub const SEARCH_FINISHED: &str = "Поиск завершен. Попробуйте еще раз...";
pub const SOMETHING_WENT_WRONG: &str = "Что-то пошло не так. Попробуйте еще раз позже...";

/// Commands honoured in every state.
///
/// Matched by prefix against the button labels, case-sensitively, so that
/// a typed lowercase "нет" still reaches the state handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Wipe the profile and the partner ledger, start over.
    Reset,
    /// Abort whatever the user is doing.
    Cancel,
}

impl Command {
    pub fn parse(text: &str) -> Option<Self> {
        if text.starts_with("Очистить") {
            Some(Self::Reset)
        } else if text.starts_with(NO_LABEL) {
            Some(Self::Cancel)
        } else {
            None
        }
    }
}

/// A state handler's reading of free text, case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    Skip,
    Sex(Sex),
    /// Anything else, trimmed.
    Text(String),
}

impl Answer {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        match trimmed.to_lowercase().as_str() {
            "да" => Self::Yes,
            "нет" => Self::No,
            "пропустить" => Self::Skip,
            "м" => Self::Sex(Sex::Male),
            "ж" => Self::Sex(Sex::Female),
            _ => Self::Text(trimmed.to_string()),
        }
    }
}

// ── Composite texts ─────────────────────────────────────────────────

pub fn reset_notice() -> String {
    format!("{SESSION_CLEARED}\n\n{GREETING}")
}

pub fn search_summary(profile: &Profile) -> String {
    format!("Поиск пары для тебя:\n{profile}\n\nНажми 'Да' чтобы начать поиск")
}

pub fn candidate_card(candidate: &Candidate) -> String {
    format!(
        "Новая пара для тебя:\n{} {}\nПрофиль: {}\n\nПродолжить поиск?",
        candidate.first_name,
        candidate.last_name,
        candidate.profile_url()
    )
}

// ── Keyboards ───────────────────────────────────────────────────────

/// Да / Нет / reset.
pub fn main_keyboard() -> Keyboard {
    Keyboard::column(vec![
        Button::text(YES_LABEL, ButtonColor::Positive),
        Button::text(NO_LABEL, ButtonColor::Negative),
        Button::text(RESET_LABEL, ButtonColor::Primary),
    ])
}

/// Skip / reset, shown under city and age questions.
pub fn question_keyboard() -> Keyboard {
    Keyboard::column(vec![
        Button::text(SKIP_LABEL, ButtonColor::Secondary),
        Button::text(RESET_LABEL, ButtonColor::Primary),
    ])
}

pub fn sex_keyboard() -> Keyboard {
    Keyboard {
        one_time: false,
        buttons: vec![
            vec![
                Button::text("м", ButtonColor::Secondary),
                Button::text("ж", ButtonColor::Secondary),
            ],
            vec![Button::text(SKIP_LABEL, ButtonColor::Secondary)],
            vec![Button::text(RESET_LABEL, ButtonColor::Primary)],
        ],
    }
}
