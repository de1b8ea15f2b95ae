//! Bot module - Telegram glue around the moderation engine.

pub mod commands;
pub mod dispatcher;
mod events;
mod runtime;
pub mod telegram;

pub use dispatcher::build_dispatcher;
pub use runtime::run;
