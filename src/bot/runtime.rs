//! Bot runtime.

use teloxide::dispatching::DefaultKey;
use teloxide::prelude::*;
use tracing::info;

use warden::ModerationEngine;

use super::dispatcher::ThrottledBot;

/// Poll for updates until Ctrl-C, then stop the engine.
///
/// The engine is shut down only after the dispatcher has returned, so no
/// handler can still be using it.
pub async fn run(
    mut dispatcher: Dispatcher<ThrottledBot, anyhow::Error, DefaultKey>,
    engine: &ModerationEngine,
) {
    info!("Starting bot in polling mode...");
    dispatcher.dispatch().await;

    info!("Dispatcher stopped, shutting down the moderation engine...");
    engine.shutdown().await;
}
