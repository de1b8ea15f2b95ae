//! Permission checker with caching.

use teloxide::prelude::*;
use teloxide::types::{ChatId, ChatMemberKind, UserId};
use tracing::debug;

use warden::cache::{CacheConfig, TypedCache};

use crate::bot::dispatcher::ThrottledBot;

/// Cache key for admin lookups: (chat_id, user_id).
type AdminCacheKey = (i64, u64);

/// Permission checker with caching support.
#[derive(Clone)]
pub struct Permissions {
    bot: ThrottledBot,
    cache: TypedCache<AdminCacheKey, bool>,
    owner_ids: Vec<u64>,
}

impl Permissions {
    pub fn with_owners(bot: ThrottledBot, owner_ids: Vec<u64>) -> Self {
        Self {
            bot,
            cache: TypedCache::new("admin_status", CacheConfig::admin_status()),
            owner_ids,
        }
    }

    #[inline]
    pub fn is_bot_owner(&self, user_id: UserId) -> bool {
        self.owner_ids.contains(&user_id.0)
    }

    /// Check if a user is a chat administrator or owner.
    /// Bot owners always return true.
    pub async fn is_admin(&self, chat_id: ChatId, user_id: UserId) -> anyhow::Result<bool> {
        if self.is_bot_owner(user_id) {
            return Ok(true);
        }

        let cache_key = (chat_id.0, user_id.0);
        if let Some(cached) = self.cache.get(&cache_key) {
            debug!("Admin cache hit for user {} in chat {}", user_id, chat_id);
            return Ok(cached);
        }

        let member = self.bot.get_chat_member(chat_id, user_id).await?;
        let is_admin = matches!(
            member.kind,
            ChatMemberKind::Owner(_) | ChatMemberKind::Administrator(_)
        );
        self.cache.insert(cache_key, is_admin);
        Ok(is_admin)
    }

    /// Drop a cached status, e.g. after a member update.
    pub fn forget(&self, chat_id: ChatId, user_id: UserId) {
        self.cache.invalidate(&(chat_id.0, user_id.0));
    }
}
