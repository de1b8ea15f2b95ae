//! Warden - Telegram group moderation bot.
//!
//! ## Architecture
//!
//! - `warden` (library) - Moderation engine, group config store, configuration
//! - `bot` - Telegram dispatcher, commands and the platform adapter
//! - `permissions` - Admin checking with caching

mod bot;
mod permissions;

use std::sync::Arc;

use anyhow::Context;
use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use warden::database::{Database, GroupStore, MemoryGroupStore, MongoGroupStore};
use warden::moderation::BanLexicon;
use warden::{Config, GroupConfigRepository, ModerationEngine};

use bot::telegram::TelegramPlatform;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warden=info,teloxide=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Warden...");

    let config = Config::from_env().context("invalid configuration")?;
    info!("Configuration loaded successfully");

    let store: Arc<dyn GroupStore> = match &config.mongodb_uri {
        Some(uri) => {
            info!("Connecting to MongoDB...");
            let db = Database::connect(uri, &config.mongodb_database).await?;
            info!("Database connected");
            Arc::new(MongoGroupStore::new(db))
        }
        None => {
            warn!("MONGODB_URI is not set, group settings will not survive a restart");
            Arc::new(MemoryGroupStore::new())
        }
    };

    let configs = Arc::new(GroupConfigRepository::load(store, config.group_defaults.clone()).await?);

    let lexicon = match &config.ban_lexicon_path {
        Some(path) => BanLexicon::load(path)?,
        None => BanLexicon::default(),
    };

    // Throttle respects Telegram's global and per-chat rate limits
    let bot = Bot::new(&config.bot_token).throttle(Limits::default());
    info!("Bot initialized with rate limiting (Throttle)");

    let me = bot.get_me().await?;
    let bot_username = config
        .bot_username
        .clone()
        .unwrap_or_else(|| me.username().to_string());
    info!("Using bot username: @{}", bot_username);

    if config.owner_ids.is_empty() {
        info!("No owner IDs configured (OWNER_IDS is empty)");
    } else {
        info!("Bot owners: {:?}", config.owner_ids);
    }

    let platform = Arc::new(TelegramPlatform::new(bot.clone()));
    let engine = Arc::new(
        ModerationEngine::new(configs, platform.clone())
            .with_lexicon(lexicon)
            .with_owners(config.owner_ids.clone()),
    );

    let dispatcher = bot::build_dispatcher(bot, engine.clone(), platform);
    bot::run(dispatcher, &engine).await;

    info!("Warden stopped");
    Ok(())
}
