//! Telegram implementation of the moderation platform.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use teloxide::RequestError;
use teloxide::prelude::*;
use teloxide::types::{ChatPermissions, MessageId as TgMessageId};
use tracing::debug;

use warden::cache::{CacheConfig, TypedCache};
use warden::moderation::{GroupId, JoinRequest, MessageId, Platform, PlatformError, UserId};

use super::dispatcher::ThrottledBot;

/// Telegram treats restrictions shorter than this as permanent.
const MIN_RESTRICTION: Duration = Duration::from_secs(30);

/// Restrictions longer than this are permanent on Telegram.
const MAX_RESTRICTION: Duration = Duration::from_secs(366 * 86400 - 60);

pub struct TelegramPlatform {
    bot: ThrottledBot,
    names: TypedCache<(GroupId, UserId), String>,
}

impl TelegramPlatform {
    pub fn new(bot: ThrottledBot) -> Self {
        Self {
            bot,
            names: TypedCache::new("display_names", CacheConfig::display_names()),
        }
    }

    /// Remember a name seen on an incoming update.
    pub fn remember_name(&self, group_id: GroupId, user_id: UserId, name: String) {
        self.names.insert((group_id, user_id), name);
    }
}

fn platform_error(e: RequestError) -> PlatformError {
    match e {
        RequestError::Api(api) => PlatformError::Forbidden(api.to_string()),
        other => PlatformError::Request(other.to_string()),
    }
}

fn user(user_id: UserId) -> teloxide::types::UserId {
    teloxide::types::UserId(user_id)
}

#[async_trait]
impl Platform for TelegramPlatform {
    async fn mute(
        &self,
        group_id: GroupId,
        user_id: UserId,
        duration: Duration,
    ) -> Result<(), PlatformError> {
        let duration = duration.clamp(MIN_RESTRICTION, MAX_RESTRICTION);
        let delta = TimeDelta::from_std(duration)
            .map_err(|e| PlatformError::Request(e.to_string()))?;

        self.bot
            .restrict_chat_member(ChatId(group_id), user(user_id), ChatPermissions::empty())
            .until_date(Utc::now() + delta)
            .await
            .map_err(platform_error)?;
        Ok(())
    }

    async fn delete_message(
        &self,
        group_id: GroupId,
        message_id: MessageId,
    ) -> Result<(), PlatformError> {
        self.bot
            .delete_message(ChatId(group_id), TgMessageId(message_id))
            .await
            .map_err(platform_error)?;
        Ok(())
    }

    async fn send_message(&self, group_id: GroupId, text: &str) -> Result<(), PlatformError> {
        self.bot
            .send_message(ChatId(group_id), text)
            .await
            .map_err(platform_error)?;
        Ok(())
    }

    async fn send_private(&self, user_id: UserId, text: &str) -> Result<(), PlatformError> {
        self.bot
            .send_message(ChatId::from(user(user_id)), text)
            .await
            .map_err(platform_error)?;
        Ok(())
    }

    async fn respond_to_join_request(
        &self,
        request: &JoinRequest,
        approve: bool,
        reason: &str,
    ) -> Result<(), PlatformError> {
        let chat_id = ChatId(request.group_id);
        if approve {
            self.bot
                .approve_chat_join_request(chat_id, user(request.user_id))
                .await
                .map_err(platform_error)?;
        } else {
            // Telegram declines silently; the reason only reaches the log.
            debug!("Declining {} in {}: {}", request.user_id, request.group_id, reason);
            self.bot
                .decline_chat_join_request(chat_id, user(request.user_id))
                .await
                .map_err(platform_error)?;
        }
        Ok(())
    }

    async fn display_name(&self, group_id: GroupId, user_id: UserId) -> String {
        if let Some(name) = self.names.get(&(group_id, user_id)) {
            return name;
        }

        match self.bot.get_chat_member(ChatId(group_id), user(user_id)).await {
            Ok(member) => {
                let name = member.user.full_name();
                self.names.insert((group_id, user_id), name.clone());
                name
            }
            Err(e) => {
                debug!("Could not resolve name of {} in {}: {}", user_id, group_id, e);
                user_id.to_string()
            }
        }
    }
}
