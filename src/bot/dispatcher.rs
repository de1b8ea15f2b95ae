//! Update dispatcher setup.
//!
//! Routes group messages to commands first and to the moderation engine
//! otherwise; member updates and join requests go straight to the engine.

use std::sync::Arc;

use teloxide::adaptors::Throttle;
use teloxide::dispatching::{DefaultKey, UpdateHandler};
use teloxide::prelude::*;

use warden::ModerationEngine;

use super::telegram::TelegramPlatform;
use super::{commands, events};
use crate::permissions::Permissions;

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ModerationEngine>,

    /// The engine's platform, kept concrete to feed its name cache.
    pub platform: Arc<TelegramPlatform>,

    /// Permission checker with admin caching.
    pub permissions: Permissions,
}

impl AppState {
    pub fn new(
        bot: ThrottledBot,
        engine: Arc<ModerationEngine>,
        platform: Arc<TelegramPlatform>,
    ) -> Self {
        let permissions = Permissions::with_owners(bot, engine.owners().to_vec());
        Self {
            engine,
            platform,
            permissions,
        }
    }
}

/// Build the dispatcher with all handlers.
pub fn build_dispatcher(
    bot: ThrottledBot,
    engine: Arc<ModerationEngine>,
    platform: Arc<TelegramPlatform>,
) -> Dispatcher<ThrottledBot, anyhow::Error, DefaultKey> {
    let state = AppState::new(bot.clone(), engine, platform);

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
}

/// Build the handler schema.
fn schema() -> UpdateHandler<anyhow::Error> {
    use teloxide::dispatching::UpdateFilterExt;

    let message_handler = Update::filter_message()
        .branch(commands::command_handler())
        .branch(events::message_handler());

    let member_handler = Update::filter_chat_member().branch(events::member_handler());

    let join_request_handler =
        Update::filter_chat_join_request().branch(events::join_request_handler());

    dptree::entry()
        .branch(message_handler)
        .branch(member_handler)
        .branch(join_request_handler)
}
