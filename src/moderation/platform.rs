//! The messaging platform as seen by the moderation core.
//!
//! Inbound events are plain data; outbound actions go through [`Platform`].
//! Every action is best-effort: callers log failures and never roll back the
//! decision that triggered them.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Stable id of a moderated group.
pub type GroupId = i64;

/// Stable id of a user.
pub type UserId = u64;

/// Platform message id.
pub type MessageId = i32;

/// A chat message posted in a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub group_id: GroupId,
    pub sender_id: UserId,
    /// The bot's own user id.
    pub self_id: UserId,
    pub message_id: MessageId,
    pub text: String,
    /// Users referenced by the message (mentions or the replied-to author).
    pub mentions: Vec<UserId>,
}

impl ChatMessage {
    pub fn is_from_self(&self) -> bool {
        self.sender_id == self.self_id
    }
}

/// A request to join a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub group_id: GroupId,
    pub user_id: UserId,
    /// Application text, if the applicant gave one.
    pub comment: Option<String>,
    /// Opaque handle the platform needs to answer this request.
    pub flag: String,
    /// Account level, when the platform exposes one.
    pub level: Option<u64>,
}

/// A member arrived in or left a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberEvent {
    pub group_id: GroupId,
    pub user_id: UserId,
}

/// Failure of an outbound platform action.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("missing permission: {0}")]
    Forbidden(String),

    #[error("platform request failed: {0}")]
    Request(String),
}

/// Actions the moderation core can take on the platform.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Prevent a user from posting for `duration`.
    async fn mute(
        &self,
        group_id: GroupId,
        user_id: UserId,
        duration: Duration,
    ) -> Result<(), PlatformError>;

    async fn delete_message(
        &self,
        group_id: GroupId,
        message_id: MessageId,
    ) -> Result<(), PlatformError>;

    /// Post a plain-text message to a group.
    async fn send_message(&self, group_id: GroupId, text: &str) -> Result<(), PlatformError>;

    /// Send a plain-text message to a user directly.
    async fn send_private(&self, user_id: UserId, text: &str) -> Result<(), PlatformError>;

    /// Approve or reject a pending join request.
    async fn respond_to_join_request(
        &self,
        request: &JoinRequest,
        approve: bool,
        reason: &str,
    ) -> Result<(), PlatformError>;

    /// Best-known display name of a user; never fails.
    async fn display_name(&self, group_id: GroupId, user_id: UserId) -> String;
}
