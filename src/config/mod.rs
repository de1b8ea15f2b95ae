//! Configuration module.
//!
//! Loads configuration from environment variables (and `.env`), including
//! the default settings template every new group starts from.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, anyhow, bail};

use crate::database::GroupConfig;
use crate::utils::parse_toggle;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,

    /// Bot username (without @). Fetched via getMe if not set.
    pub bot_username: Option<String>,

    /// Owner user IDs (comma-separated). They bypass admin checks and
    /// receive private join audits.
    pub owner_ids: Vec<u64>,

    // MongoDB; without a URI settings are kept in memory only.
    pub mongodb_uri: Option<String>,
    pub mongodb_database: String,

    /// JSON file with the built-in banned-word lexicon.
    pub ban_lexicon_path: Option<PathBuf>,

    /// Settings template for groups without a stored record.
    pub group_defaults: GroupConfig,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = var("BOT_TOKEN").context("BOT_TOKEN must be set")?;

        let owner_ids = match var("OWNER_IDS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<u64>())
                .collect::<Result<Vec<_>, _>>()
                .context("OWNER_IDS must be a comma-separated list of user ids")?,
            None => Vec::new(),
        };

        // Strip @ if present
        let bot_username = var("BOT_USERNAME")
            .map(|s| s.trim_start_matches('@').to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            bot_token,
            bot_username,
            owner_ids,
            mongodb_uri: var("MONGODB_URI"),
            mongodb_database: var("MONGODB_DATABASE").unwrap_or_else(|| "warden".to_string()),
            ban_lexicon_path: var("BAN_LEXICON_PATH").map(PathBuf::from),
            group_defaults: group_defaults(&var)?,
        })
    }
}

/// Build the group template from compiled defaults and `DEFAULT_*` overrides.
fn group_defaults<F>(var: &F) -> anyhow::Result<GroupConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = GroupConfig::default();

    override_toggle(var, "DEFAULT_JOIN_REVIEW", &mut config.join_review)?;
    override_toggle(var, "DEFAULT_NO_MATCH_REJECT", &mut config.no_match_reject)?;
    override_toggle(var, "DEFAULT_LEAVE_NOTIFY", &mut config.leave_notify)?;
    override_toggle(var, "DEFAULT_LEAVE_BLOCK", &mut config.leave_block)?;
    override_number(var, "DEFAULT_MIN_LEVEL", &mut config.min_level)?;
    override_number(var, "DEFAULT_MAX_ATTEMPTS", &mut config.max_attempts)?;
    override_number(var, "DEFAULT_JOIN_MUTE_SECS", &mut config.join_mute_secs)?;
    override_number(var, "DEFAULT_FLOOD_MUTE_SECS", &mut config.flood_mute_secs)?;
    override_number(var, "DEFAULT_WORD_MUTE_SECS", &mut config.word_mute_secs)?;
    override_number(var, "DEFAULT_VOTE_THRESHOLD", &mut config.vote_threshold)?;
    override_number(var, "DEFAULT_VOTE_TTL_SECS", &mut config.vote_ttl_secs)?;

    if let Some(template) = var("DEFAULT_WELCOME_TEMPLATE") {
        config.welcome_template = template;
    }
    if let Some(range) = var("DEFAULT_VOTE_MUTE_RANGE") {
        let (min, max) = parse_mute_range(&range)
            .with_context(|| format!("invalid DEFAULT_VOTE_MUTE_RANGE {:?}", range))?;
        config.vote_mute_min_secs = min;
        config.vote_mute_max_secs = max;
    }

    Ok(config)
}

fn override_toggle<F>(var: &F, key: &str, slot: &mut bool) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = var(key) {
        *slot = parse_toggle(&raw).ok_or_else(|| anyhow!("{} must be on or off, got {:?}", key, raw))?;
    }
    Ok(())
}

fn override_number<F, T>(var: &F, key: &str, slot: &mut T) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(raw) = var(key) {
        *slot = raw
            .parse()
            .with_context(|| format!("{} must be a non-negative integer, got {:?}", key, raw))?;
    }
    Ok(())
}

/// Parse a `"min~max"` range of seconds.
pub fn parse_mute_range(input: &str) -> anyhow::Result<(u64, u64)> {
    let (min, max) = input
        .split_once('~')
        .ok_or_else(|| anyhow!("expected min~max"))?;
    let min: u64 = min.trim().parse().context("invalid minimum")?;
    let max: u64 = max.trim().parse().context("invalid maximum")?;
    if min > max {
        bail!("minimum {} is above maximum {}", min, max);
    }
    Ok((min, max))
}
