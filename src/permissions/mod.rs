//! Admin checks for moderation commands.
//!
//! Lookups hit the Telegram API once per (chat, user) and are cached
//! briefly. Bot owners bypass every check.

mod checker;

pub use checker::Permissions;
