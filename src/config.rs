//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default VK API version.
pub const DEFAULT_API_VERSION: &str = "5.131";

/// Which messaging gateway the bot listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// VK community messages via Bots Long Poll.
    Vk,
    /// stdin/stdout, for local runs.
    Cli,
}

impl std::str::FromStr for ChannelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vk" => Ok(Self::Vk),
            "cli" => Ok(Self::Cli),
            other => Err(ConfigError::InvalidValue {
                key: "VKINDER_CHANNEL".to_string(),
                message: format!("expected `vk` or `cli`, got `{other}`"),
            }),
        }
    }
}

/// Community credentials for the VK messaging gateway.
#[derive(Debug, Clone)]
pub struct GroupConfig {
    pub token: SecretString,
    pub group_id: u64,
    /// How long a single long-poll request waits for events.
    pub longpoll_wait: Duration,
}

/// Process-wide bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// User token used for profile lookup, search and photos.
    pub user_token: SecretString,
    /// Present when `channel` is [`ChannelKind::Vk`].
    pub group: Option<GroupConfig>,
    pub api_version: String,
    pub db_path: PathBuf,
    pub channel: ChannelKind,
    /// VK user the CLI channel speaks as.
    pub cli_user_id: i64,
    pub search: SearchConfig,
}

impl BotConfig {
    /// Build the configuration from `VKINDER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let user_token = required_env("VKINDER_USER_TOKEN")?;

        let channel: ChannelKind = std::env::var("VKINDER_CHANNEL")
            .unwrap_or_else(|_| "vk".to_string())
            .parse()?;

        let group = match channel {
            ChannelKind::Cli => None,
            ChannelKind::Vk => {
                let token = required_env("VKINDER_GROUP_TOKEN")?;
                let raw_id = required_env("VKINDER_GROUP_ID")?;
                let group_id = raw_id
                    .trim()
                    .parse()
                    .map_err(|e| ConfigError::InvalidValue {
                        key: "VKINDER_GROUP_ID".to_string(),
                        message: format!("{e}"),
                    })?;
                let wait_secs: u64 = std::env::var("VKINDER_LONGPOLL_WAIT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(25);
                Some(GroupConfig {
                    token: SecretString::from(token),
                    group_id,
                    longpoll_wait: Duration::from_secs(wait_secs),
                })
            }
        };

        let api_version = std::env::var("VKINDER_API_VERSION")
            .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string());

        let db_path = std::env::var("VKINDER_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/vkinder.db"));

        let cli_user_id = std::env::var("VKINDER_CLI_USER_ID")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(crate::channels::cli::LOCAL_USER_ID);

        Ok(Self {
            user_token: SecretString::from(user_token),
            group,
            api_version,
            db_path,
            channel,
            cli_user_id,
            search: SearchConfig::default(),
        })
    }
}

fn required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Tunables of the partner search.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Candidates requested per `users.search` page.
    pub page_size: u32,
    /// The age window is `age - age_spread ..= age + age_spread`.
    pub age_spread: i32,
    /// Photos attached to each presented candidate.
    pub top_photos: usize,
    /// Upper bound of photos fetched per candidate before ranking.
    pub photo_fetch_limit: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: 5,
            age_spread: 1,
            top_photos: 3,
            photo_fetch_limit: 30,
        }
    }
}
