//! `SocialGraph` over the VK method API, authenticated with a user token.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ApiError;
use crate::model::{Candidate, Photo, RemoteProfile, Sex};
use crate::social::{SearchFilter, SocialGraph};
use crate::vk::VkApi;

/// VK-backed social graph.
pub struct VkSocialGraph {
    api: VkApi,
}

impl VkSocialGraph {
    pub fn new(api: VkApi) -> Self {
        Self { api }
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct VkCity {
    id: i64,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VkUser {
    #[serde(default)]
    city: Option<VkCity>,
    #[serde(default)]
    bdate: Option<String>,
    #[serde(default)]
    sex: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct VkList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct VkSearchItem {
    id: i64,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

#[derive(Debug, Deserialize)]
struct VkLikes {
    #[serde(default)]
    count: u32,
}

#[derive(Debug, Deserialize)]
struct VkPhoto {
    id: i64,
    owner_id: i64,
    #[serde(default)]
    likes: Option<VkLikes>,
}

/// Query parameters of `users.search` for a filter page.
fn search_params(filter: &SearchFilter, count: u32, offset: u32) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("sex", filter.sex.code().to_string()),
        ("age_from", filter.age_from.to_string()),
        ("age_to", filter.age_to.to_string()),
        ("city", filter.city_id.to_string()),
        ("has_photo", u8::from(filter.has_photo).to_string()),
        ("count", count.to_string()),
        ("offset", offset.to_string()),
        ("fields", "first_name,last_name,city,bdate".to_string()),
    ];
    if let Some(relation) = filter.relation {
        params.push(("status", relation.to_string()));
    }
    params
}

#[async_trait]
impl SocialGraph for VkSocialGraph {
    async fn resolve_profile(&self, user_id: i64) -> Result<RemoteProfile, ApiError> {
        let users: Vec<VkUser> = self
            .api
            .call(
                "users.get",
                &[
                    ("user_ids", user_id.to_string()),
                    ("fields", "city,sex,bdate".to_string()),
                ],
            )
            .await?;

        let user = users
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::InvalidResponse {
                method: "users.get".to_string(),
                reason: format!("no user returned for {user_id}"),
            })?;

        let (city_id, city_title) = match user.city {
            Some(city) => (Some(city.id), city.title),
            None => (None, None),
        };

        Ok(RemoteProfile {
            city_id,
            city_title,
            birth_date: user.bdate,
            sex: user.sex.map(Sex::from).unwrap_or_default(),
        })
    }

    async fn resolve_city_by_name(&self, name: &str) -> Result<Option<i64>, ApiError> {
        let cities: VkList<VkCity> = self
            .api
            .call(
                "database.getCities",
                &[("q", name.trim().to_string()), ("count", "1".to_string())],
            )
            .await?;
        Ok(cities.items.first().map(|c| c.id))
    }

    async fn resolve_city_title(&self, city_id: i64) -> Result<Option<String>, ApiError> {
        let cities: Vec<VkCity> = self
            .api
            .call("database.getCitiesById", &[("city_ids", city_id.to_string())])
            .await?;
        Ok(cities.into_iter().next().and_then(|c| c.title))
    }

    async fn search_candidates(
        &self,
        filter: &SearchFilter,
        count: u32,
        offset: u32,
    ) -> Result<Vec<Candidate>, ApiError> {
        let page: VkList<VkSearchItem> = self
            .api
            .call("users.search", &search_params(filter, count, offset))
            .await?;

        Ok(page
            .items
            .into_iter()
            .map(|item| Candidate {
                id: item.id,
                first_name: item.first_name,
                last_name: item.last_name,
            })
            .collect())
    }

    async fn list_photos(&self, owner_id: i64, limit: u32) -> Result<Vec<Photo>, ApiError> {
        let photos: VkList<VkPhoto> = self
            .api
            .call(
                "photos.getAll",
                &[
                    ("owner_id", owner_id.to_string()),
                    ("extended", "1".to_string()),
                    ("count", limit.to_string()),
                    ("skip_hidden", "1".to_string()),
                ],
            )
            .await?;

        Ok(photos
            .items
            .into_iter()
            .map(|p| Photo {
                id: p.id,
                owner_id: p.owner_id,
                likes: p.likes.map(|l| l.count).unwrap_or(0),
            })
            .collect())
    }
}
