//! Non-command updates: group messages, member changes and join requests.

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{ChatJoinRequest, ChatMemberKind, ChatMemberUpdated, Me, MessageEntityKind};
use tracing::{debug, error};

use warden::moderation::{ChatMessage, JoinRequest, MemberEvent, MessageVerdict};

use super::dispatcher::AppState;

/// Handler for group messages that are not commands.
pub fn message_handler() -> UpdateHandler<anyhow::Error> {
    dptree::filter(|msg: Message| msg.chat.is_group() || msg.chat.is_supergroup())
        .endpoint(moderate_message)
}

/// Handler for chat member updates.
pub fn member_handler() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(dptree::filter(is_arrival).endpoint(member_joined))
        .branch(dptree::filter(is_voluntary_leave).endpoint(member_left))
}

/// Handler for chat join requests.
pub fn join_request_handler() -> UpdateHandler<anyhow::Error> {
    dptree::endpoint(join_requested)
}

/// Build the engine's view of a Telegram message.
fn chat_message(msg: &Message, me: &Me) -> Option<ChatMessage> {
    let sender = msg.from.as_ref()?;
    let text = msg.text().or_else(|| msg.caption()).unwrap_or_default();

    let mut mentions: Vec<u64> = msg
        .entities()
        .or_else(|| msg.caption_entities())
        .unwrap_or_default()
        .iter()
        .filter_map(|e| match &e.kind {
            MessageEntityKind::TextMention { user } => Some(user.id.0),
            _ => None,
        })
        .collect();
    if let Some(author) = msg.reply_to_message().and_then(|r| r.from.as_ref()) {
        mentions.insert(0, author.id.0);
    }

    Some(ChatMessage {
        group_id: msg.chat.id.0,
        sender_id: sender.id.0,
        self_id: me.id.0,
        message_id: msg.id.0,
        text: text.to_string(),
        mentions,
    })
}

async fn moderate_message(msg: Message, me: Me, state: AppState) -> anyhow::Result<()> {
    let Some(message) = chat_message(&msg, &me) else {
        return Ok(());
    };
    if let Some(user) = msg.from.as_ref() {
        state
            .platform
            .remember_name(message.group_id, user.id.0, user.full_name());
    }

    match state.engine.on_message(&message).await {
        Ok(MessageVerdict::Clean) => {}
        Ok(verdict) => debug!("Message {} in {}: {:?}", message.message_id, message.group_id, verdict),
        Err(e) => error!("Failed to moderate message in {}: {}", message.group_id, e),
    }
    Ok(())
}

/// A user who was not in the chat before is now.
fn is_arrival(update: ChatMemberUpdated) -> bool {
    !update.old_chat_member.is_present()
        && update.new_chat_member.is_present()
        && !update.new_chat_member.user.is_bot
}

/// A member left on their own, as opposed to being removed.
///
/// Telegram reports an admin removal as `Left` too; only the member
/// themselves can be the actor of a voluntary leave.
fn is_voluntary_leave(update: ChatMemberUpdated) -> bool {
    update.old_chat_member.is_present()
        && matches!(update.new_chat_member.kind, ChatMemberKind::Left)
        && update.from.id == update.old_chat_member.user.id
        && !update.old_chat_member.user.is_bot
}

async fn member_joined(update: ChatMemberUpdated, state: AppState) -> anyhow::Result<()> {
    let user = &update.new_chat_member.user;
    let event = MemberEvent {
        group_id: update.chat.id.0,
        user_id: user.id.0,
    };
    debug!("Member {} joined {}", event.user_id, event.group_id);

    state.permissions.forget(update.chat.id, user.id);
    state
        .platform
        .remember_name(event.group_id, event.user_id, user.full_name());
    state.engine.on_member_joined(event).await?;
    Ok(())
}

async fn member_left(update: ChatMemberUpdated, state: AppState) -> anyhow::Result<()> {
    let user = &update.old_chat_member.user;
    let event = MemberEvent {
        group_id: update.chat.id.0,
        user_id: user.id.0,
    };
    debug!("Member {} left {}", event.user_id, event.group_id);

    state.permissions.forget(update.chat.id, user.id);
    state
        .platform
        .remember_name(event.group_id, event.user_id, user.full_name());
    state.engine.on_member_left(event).await?;
    Ok(())
}

async fn join_requested(request: ChatJoinRequest, state: AppState) -> anyhow::Result<()> {
    let group_id = request.chat.id.0;
    let user_id = request.from.id.0;
    state
        .platform
        .remember_name(group_id, user_id, request.from.full_name());

    let flag = request
        .invite_link
        .as_ref()
        .map(|link| link.name.clone().unwrap_or_else(|| link.invite_link.clone()))
        .unwrap_or_default();

    let join = JoinRequest {
        group_id,
        user_id,
        comment: request.bio.clone(),
        flag,
        level: None,
    };

    if let Some(decision) = state.engine.on_join_request(&join).await? {
        debug!(
            "Join request of {} in {}: {} ({})",
            user_id, group_id, decision.verdict, decision.reason
        );
    }
    Ok(())
}
