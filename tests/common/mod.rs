//! Shared fixtures for the scenario tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use warden::database::{GroupConfig, GroupConfigRepository, MemoryGroupStore};
use warden::moderation::{
    ChatMessage, GroupId, JoinRequest, MessageId, ModerationEngine, Platform, PlatformError,
    UserId,
};

pub const GROUP: GroupId = -100;
pub const BOT: UserId = 1;

/// An outbound action seen by the fake platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Mute { group: GroupId, user: UserId, secs: u64 },
    Delete { group: GroupId, message: MessageId },
    Say { group: GroupId, text: String },
    Whisper { user: UserId, text: String },
    Answer { group: GroupId, user: UserId, approve: bool },
}

/// Platform double that records every action.
#[derive(Default)]
pub struct RecordingPlatform {
    actions: Mutex<Vec<Action>>,
    deny_mutes: AtomicBool,
}

impl RecordingPlatform {
    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().clone()
    }

    pub fn clear(&self) {
        self.actions.lock().clear();
    }

    pub fn mutes(&self) -> Vec<(UserId, u64)> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                Action::Mute { user, secs, .. } => Some((user, secs)),
                _ => None,
            })
            .collect()
    }

    pub fn said(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                Action::Say { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Make every mute fail as if the bot lacked the permission.
    pub fn deny_mutes(&self) {
        self.deny_mutes.store(true, Ordering::SeqCst);
    }

    fn push(&self, action: Action) {
        self.actions.lock().push(action);
    }
}

#[async_trait]
impl Platform for RecordingPlatform {
    async fn mute(
        &self,
        group_id: GroupId,
        user_id: UserId,
        duration: Duration,
    ) -> Result<(), PlatformError> {
        if self.deny_mutes.load(Ordering::SeqCst) {
            return Err(PlatformError::Forbidden("not enough rights".into()));
        }
        self.push(Action::Mute {
            group: group_id,
            user: user_id,
            secs: duration.as_secs(),
        });
        Ok(())
    }

    async fn delete_message(
        &self,
        group_id: GroupId,
        message_id: MessageId,
    ) -> Result<(), PlatformError> {
        self.push(Action::Delete {
            group: group_id,
            message: message_id,
        });
        Ok(())
    }

    async fn send_message(&self, group_id: GroupId, text: &str) -> Result<(), PlatformError> {
        self.push(Action::Say {
            group: group_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_private(&self, user_id: UserId, text: &str) -> Result<(), PlatformError> {
        self.push(Action::Whisper {
            user: user_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn respond_to_join_request(
        &self,
        request: &JoinRequest,
        approve: bool,
        _reason: &str,
    ) -> Result<(), PlatformError> {
        self.push(Action::Answer {
            group: request.group_id,
            user: request.user_id,
            approve,
        });
        Ok(())
    }

    async fn display_name(&self, _group_id: GroupId, user_id: UserId) -> String {
        format!("user{}", user_id)
    }
}

pub struct Harness {
    pub platform: Arc<RecordingPlatform>,
    pub store: Arc<MemoryGroupStore>,
    pub engine: ModerationEngine,
}

/// Engine over an empty in-memory store, with `template` as group defaults.
pub async fn harness(template: GroupConfig) -> Harness {
    harness_with_store(template, Arc::new(MemoryGroupStore::new())).await
}

pub async fn harness_with_store(template: GroupConfig, store: Arc<MemoryGroupStore>) -> Harness {
    let platform = Arc::new(RecordingPlatform::default());
    let configs = GroupConfigRepository::load(store.clone(), template)
        .await
        .expect("load config store");
    let engine = ModerationEngine::new(Arc::new(configs), platform.clone());
    Harness {
        platform,
        store,
        engine,
    }
}

pub fn message(sender: UserId, id: MessageId, text: &str) -> ChatMessage {
    ChatMessage {
        group_id: GROUP,
        sender_id: sender,
        self_id: BOT,
        message_id: id,
        text: text.to_string(),
        mentions: Vec::new(),
    }
}

pub fn join_request(user: UserId, comment: Option<&str>) -> JoinRequest {
    JoinRequest {
        group_id: GROUP,
        user_id: user,
        comment: comment.map(str::to_string),
        flag: format!("flag-{}", user),
        level: None,
    }
}
