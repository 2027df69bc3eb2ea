//! Profiles, candidates and photos.

use serde::{Deserialize, Serialize};

/// Sex as VK encodes it: 0 unknown, 1 female, 2 male.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Sex {
    #[default]
    Unknown,
    Female,
    Male,
}

impl Sex {
    /// The sex searched for on behalf of someone of this sex.
    ///
    /// `Unknown` has no opposite and is never searched.
    pub fn opposite(self) -> Option<Sex> {
        match self {
            Self::Female => Some(Self::Male),
            Self::Male => Some(Self::Female),
            Self::Unknown => None,
        }
    }

    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::Female => 1,
            Self::Male => 2,
        }
    }
}

impl From<i64> for Sex {
    fn from(code: i64) -> Self {
        match code {
            1 => Self::Female,
            2 => Self::Male,
            _ => Self::Unknown,
        }
    }
}

impl From<Sex> for i64 {
    fn from(sex: Sex) -> Self {
        sex.code()
    }
}

impl std::fmt::Display for Sex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "не указан"),
            Self::Female => write!(f, "ж"),
            Self::Male => write!(f, "м"),
        }
    }
}

/// Matching-relevant attributes of one bot user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    /// Row id in the store, `None` until first persisted.
    pub db_id: Option<i64>,
    /// VK user id.
    pub user_id: i64,
    pub city_id: Option<i64>,
    pub city_title: Option<String>,
    pub age: Option<i32>,
    pub sex: Sex,
}

impl Profile {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    /// First field still needed before a search can start, in asking order.
    pub fn first_missing(&self) -> Option<ProfileField> {
        if self.city_id.is_none() {
            Some(ProfileField::City)
        } else if self.age.is_none() {
            Some(ProfileField::Age)
        } else if !self.sex.is_known() {
            Some(ProfileField::Sex)
        } else {
            None
        }
    }

    pub fn is_complete(&self) -> bool {
        self.first_missing().is_none()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let city = self.city_title.as_deref().unwrap_or("не указан");
        let age = self
            .age
            .map(|a| a.to_string())
            .unwrap_or_else(|| "не указан".to_string());
        write!(
            f,
            "id: {}, город: {}, возраст: {}, пол: {}",
            self.user_id, city, age, self.sex
        )
    }
}

/// Profile fields collected by the dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    City,
    Age,
    Sex,
}

/// Profile attributes as the social graph reports them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteProfile {
    pub city_id: Option<i64>,
    pub city_title: Option<String>,
    /// `D.M.YYYY`, `D.M`, or absent, depending on the user's privacy settings.
    pub birth_date: Option<String>,
    pub sex: Sex,
}

impl RemoteProfile {
    /// Turn the remote data into a fresh profile for `user_id`.
    pub fn into_profile(self, user_id: i64, current_year: i32) -> Profile {
        Profile {
            db_id: None,
            user_id,
            city_id: self.city_id,
            city_title: self.city_title,
            age: self
                .birth_date
                .as_deref()
                .and_then(|b| age_from_birth_date(b, current_year)),
            sex: self.sex,
        }
    }
}

/// Age in whole years from a `D.M.YYYY` birth date.
///
/// Only the year is used. Dates missing the day, month or year yield `None`.
pub fn age_from_birth_date(birth_date: &str, current_year: i32) -> Option<i32> {
    let parts: Vec<&str> = birth_date.trim().split('.').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.trim().is_empty()) {
        return None;
    }
    let year: i32 = parts[2].trim().parse().ok()?;
    Some(current_year - year)
}

/// A prospective partner returned by the search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

impl Candidate {
    pub fn profile_url(&self) -> String {
        format!("https://vk.com/id{}", self.id)
    }
}

impl std::fmt::Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "id: {}, Имя: {}, Фамилия: {}",
            self.id, self.first_name, self.last_name
        )
    }
}

/// One photo of a candidate with its popularity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub id: i64,
    pub owner_id: i64,
    pub likes: u32,
}

impl Photo {
    /// Attachment reference understood by `messages.send`.
    pub fn attachment(&self) -> String {
        format!("photo{}_{}", self.owner_id, self.id)
    }
}
