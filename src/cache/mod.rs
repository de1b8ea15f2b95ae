//! Short-lived caches for platform lookups, built on Moka.
//!
//! Moderation state itself never lives here; these caches only spare
//! repeated API round-trips (display names, admin status).

mod config;
mod typed;

pub use config::CacheConfig;
pub use typed::TypedCache;
