//! Warden - group moderation engine.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration and the group settings template
//! - `database` - Group config store (MongoDB or in-memory backend)
//! - `moderation` - Flood detection, banned words, join admission and vote mutes
//! - `cache` - TTL caches with Moka for platform lookups
//! - `utils` - Argument parsers
//!
//! The Telegram glue lives in the binary; the engine only sees the
//! [`moderation::Platform`] trait.

pub mod cache;
pub mod config;
pub mod database;
pub mod moderation;
pub mod utils;

pub use config::Config;
pub use database::{GroupConfig, GroupConfigRepository};
pub use moderation::ModerationEngine;
