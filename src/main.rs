use std::sync::Arc;

use anyhow::Context;

use vkinder::bot::Bot;
use vkinder::channels::{Channel, CliChannel, VkChannel};
use vkinder::config::{BotConfig, ChannelKind};
use vkinder::dialog::Dialog;
use vkinder::social::{SocialGraph, VkSocialGraph};
use vkinder::store::{LibSqlBackend, ProfileStore};
use vkinder::vk::VkApi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().context("invalid configuration")?;

    eprintln!("💞 vkinder v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Channel: {:?}", config.channel);
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   VK API: {}\n", config.api_version);

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn ProfileStore> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("failed to open database at {}", config.db_path.display()))?,
    );

    // ── Social graph (user token) ────────────────────────────────────────
    let graph: Arc<dyn SocialGraph> = Arc::new(VkSocialGraph::new(VkApi::new(
        config.user_token.clone(),
        config.api_version.clone(),
    )));

    // ── Messaging channel ────────────────────────────────────────────────
    let channel: Arc<dyn Channel> = match (config.channel, &config.group) {
        (ChannelKind::Cli, _) => {
            eprintln!("   Type a message and press Enter. Ctrl+D to exit.\n");
            Arc::new(CliChannel::new().with_user_id(config.cli_user_id))
        }
        (ChannelKind::Vk, Some(group)) => Arc::new(VkChannel::new(
            VkApi::new(group.token.clone(), config.api_version.clone()),
            group.group_id,
            group.longpoll_wait,
        )),
        (ChannelKind::Vk, None) => anyhow::bail!("VK channel selected without community credentials"),
    };

    let dialog = Dialog::new(store, graph, channel.clone(), config.search.clone());
    Bot::new(channel, dialog).run().await?;

    Ok(())
}
