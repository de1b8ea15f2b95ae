//! Moderation commands.

use std::time::Duration;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{MessageEntityKind, ReplyParameters, UserId};
use teloxide::utils::command::BotCommands;
use tracing::{error, info};

use warden::database::{ConfigError, ConfigField, SettingValue};
use warden::moderation::{BallotOutcome, EngineError};
use warden::utils::{ListEdit, format_duration, parse_duration, parse_list_edit};

use super::dispatcher::{AppState, ThrottledBot};

/// All bot commands.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Show this help")]
    Help,

    #[command(description = "Start a vote to mute the replied-to user, e.g. /votemute 10m")]
    Votemute(String),

    #[command(description = "Vote for the running mute")]
    Agree,

    #[command(description = "Vote against the running mute")]
    Disagree,

    #[command(description = "Show or change settings: /config [field [value]]")]
    Config(String),

    #[command(description = "Show or edit the join blacklist: /blacklist [ids | +id -id]")]
    Blacklist(String),

    #[command(description = "Reset this group's settings to the defaults")]
    Resetconfig,
}

pub fn command_handler() -> UpdateHandler<anyhow::Error> {
    use dptree::case;

    teloxide::filter_command::<Command, _>()
        .filter(|msg: Message| msg.chat.is_group() || msg.chat.is_supergroup())
        .branch(case![Command::Help].endpoint(help_command))
        .branch(case![Command::Votemute(args)].endpoint(votemute_command))
        .branch(case![Command::Agree].endpoint(agree_command))
        .branch(case![Command::Disagree].endpoint(disagree_command))
        .branch(case![Command::Config(args)].endpoint(config_command))
        .branch(case![Command::Blacklist(args)].endpoint(blacklist_command))
        .branch(case![Command::Resetconfig].endpoint(resetconfig_command))
}

async fn reply(bot: &ThrottledBot, msg: &Message, text: impl Into<String>) -> anyhow::Result<()> {
    bot.send_message(msg.chat.id, text)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;
    Ok(())
}

/// Reply with a refusal unless the sender administers the chat.
async fn require_admin(bot: &ThrottledBot, msg: &Message, state: &AppState) -> anyhow::Result<bool> {
    let user_id = msg.from.as_ref().map(|u| u.id).unwrap_or(UserId(0));
    if state.permissions.is_admin(msg.chat.id, user_id).await.unwrap_or(false) {
        return Ok(true);
    }
    reply(bot, msg, "Only group admins can do that.").await?;
    Ok(false)
}

async fn help_command(bot: ThrottledBot, msg: Message) -> anyhow::Result<()> {
    reply(&bot, &msg, Command::descriptions().to_string()).await
}

/// The user a moderation command is aimed at: the replied-to author or the
/// first text mention.
fn command_target(msg: &Message) -> Option<UserId> {
    if let Some(user) = msg.reply_to_message().and_then(|r| r.from.as_ref()) {
        return Some(user.id);
    }
    msg.entities()?.iter().find_map(|e| match &e.kind {
        MessageEntityKind::TextMention { user } => Some(user.id),
        _ => None,
    })
}

async fn votemute_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    if !require_admin(&bot, &msg, &state).await? {
        return Ok(());
    }

    let Some(target) = command_target(&msg) else {
        return reply(&bot, &msg, "Reply to the user you want to vote on.").await;
    };

    match state
        .engine
        .start_vote(msg.chat.id.0, target.0, vote_duration(&args))
        .await
    {
        Ok(_) => Ok(()),
        Err(EngineError::Vote(e)) => reply(&bot, &msg, e.to_string()).await,
        Err(EngineError::Store(e)) => {
            error!("Failed to start vote in {}: {}", msg.chat.id, e);
            reply(&bot, &msg, "Could not start the vote, try again later.").await
        }
    }
}

/// Explicit mute duration of a `/votemute`. `None` (missing or zero) draws
/// from the group's random range.
fn vote_duration(args: &str) -> Option<Duration> {
    args.split_whitespace()
        .find_map(parse_duration)
        .filter(|d| !d.is_zero())
}

async fn ballot(bot: ThrottledBot, msg: Message, state: AppState, agree: bool) -> anyhow::Result<()> {
    let Some(voter) = msg.from.as_ref() else {
        return Ok(());
    };

    match state.engine.cast_ballot(msg.chat.id.0, voter.id.0, agree).await {
        Ok(BallotOutcome::Pending(_)) | Ok(BallotOutcome::Settled(_)) => Ok(()),
        Err(e) => reply(&bot, &msg, e.to_string()).await,
    }
}

async fn agree_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    ballot(bot, msg, state, true).await
}

async fn disagree_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    ballot(bot, msg, state, false).await
}

async fn config_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    if !require_admin(&bot, &msg, &state).await? {
        return Ok(());
    }

    let group_id = msg.chat.id.0;
    let configs = state.engine.config();
    let args = args.trim();

    if args.is_empty() {
        let lines: Vec<String> = configs
            .all(group_id)
            .await?
            .into_iter()
            .map(|(field, value)| describe(field, &value))
            .collect();
        return reply(&bot, &msg, lines.join("\n")).await;
    }

    let (name, rest) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
    let field: ConfigField = match name.parse() {
        Ok(field) => field,
        Err(e) => return reply(&bot, &msg, format!("{}", e)).await,
    };

    let text = match change_setting(&state, group_id, field, rest.trim()).await {
        Ok(value) => describe(field, &value),
        Err(ConfigError::Store(e)) => {
            error!("Failed to update {} in {}: {}", field, group_id, e);
            "Could not save the setting, try again later.".to_string()
        }
        Err(e) => e.to_string(),
    };
    reply(&bot, &msg, text).await
}

/// Apply `raw` to a setting (or just read it when empty) and return the
/// resulting value.
async fn change_setting(
    state: &AppState,
    group_id: i64,
    field: ConfigField,
    raw: &str,
) -> Result<SettingValue, ConfigError> {
    let configs = state.engine.config();
    if raw.is_empty() {
        return Ok(configs.get_field(group_id, field).await?);
    }

    if field.kind().is_list() {
        match parse_list_edit(raw.split_whitespace()) {
            ListEdit::Replace(_) => {
                configs
                    .set_field(group_id, field, SettingValue::parse(field, raw)?)
                    .await?
            }
            ListEdit::Edit { add, remove } => {
                configs.edit_list(group_id, field, &add, &remove).await?
            }
        }
    } else {
        configs
            .set_field(group_id, field, SettingValue::parse(field, raw)?)
            .await?;
    }

    info!("Setting {} changed in group {}", field, group_id);
    Ok(configs.get_field(group_id, field).await?)
}

fn describe(field: ConfigField, value: &SettingValue) -> String {
    match value {
        SettingValue::Int(secs) if *secs > 0 && field.key().ends_with("_secs") => {
            format!("{}: {} ({})", field, value, format_duration(*secs))
        }
        _ => format!("{}: {}", field, value),
    }
}

async fn blacklist_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    if !require_admin(&bot, &msg, &state).await? {
        return Ok(());
    }

    let group_id = msg.chat.id.0;
    let text = match change_setting(&state, group_id, ConfigField::BlockIds, args.trim()).await {
        Ok(SettingValue::List(ids)) if ids.is_empty() => "The join blacklist is empty.".to_string(),
        Ok(value) => format!("Join blacklist: {}", value),
        Err(ConfigError::Store(e)) => {
            error!("Failed to update blacklist in {}: {}", group_id, e);
            "Could not save the blacklist, try again later.".to_string()
        }
        Err(e) => e.to_string(),
    };
    reply(&bot, &msg, text).await
}

async fn resetconfig_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    if !require_admin(&bot, &msg, &state).await? {
        return Ok(());
    }

    state.engine.config().reset(msg.chat.id.0).await?;
    reply(&bot, &msg, "Settings reset to the defaults.").await
}
