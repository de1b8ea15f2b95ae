//! Per-group moderation settings.
//!
//! The struct is the schema: its serde names are the persisted keys and the
//! names accepted by the field-level API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::database::ConfigError;

/// Complete settings of one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Master switch for join request automation.
    pub join_review: bool,
    pub accept_words: Vec<String>,
    pub reject_words: Vec<String>,
    /// Blacklist applicants whose comment hits a reject keyword.
    pub reject_word_blacklist: bool,
    /// Reject instead of deferring when no rule matched.
    pub no_match_reject: bool,
    /// Minimum applicant level (0 = off).
    pub min_level: u64,
    /// Join attempts before auto-blacklisting (0 = off).
    pub max_attempts: u64,
    /// Join blacklist.
    pub block_ids: Vec<u64>,
    /// Send join notices privately to bot owners instead of the group.
    pub admin_audit: bool,
    pub leave_notify: bool,
    pub leave_block: bool,
    /// Welcome text with `{nickname}` and `{id}` placeholders (empty = off).
    pub welcome_template: String,
    /// Mute applied to every new member (0 = off).
    pub join_mute_secs: u64,
    pub ban_words: Vec<String>,
    /// Also scan the built-in lexicon.
    pub builtin_ban: bool,
    pub word_mute_secs: u64,
    /// Flood mute duration (0 = flood detection off).
    pub flood_mute_secs: u64,
    pub vote_threshold: u64,
    pub vote_ttl_secs: u64,
    pub vote_mute_min_secs: u64,
    pub vote_mute_max_secs: u64,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            join_review: false,
            accept_words: Vec::new(),
            reject_words: Vec::new(),
            reject_word_blacklist: true,
            no_match_reject: false,
            min_level: 0,
            max_attempts: 0,
            block_ids: Vec::new(),
            admin_audit: false,
            leave_notify: true,
            leave_block: false,
            welcome_template: String::new(),
            join_mute_secs: 0,
            ban_words: Vec::new(),
            builtin_ban: false,
            word_mute_secs: 0,
            flood_mute_secs: 0,
            vote_threshold: 3,
            vote_ttl_secs: 120,
            vote_mute_min_secs: 60,
            vote_mute_max_secs: 600,
        }
    }
}

impl GroupConfig {
    /// Check if a user is on the join blacklist.
    pub fn is_blocked(&self, user_id: u64) -> bool {
        self.block_ids.contains(&user_id)
    }

    /// Serialize into the JSON object used for persistence.
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // A struct with named fields always serializes to an object.
            _ => Map::new(),
        }
    }

    /// Read one setting.
    pub fn value(&self, field: ConfigField) -> SettingValue {
        use ConfigField::*;
        use SettingValue as V;

        match field {
            JoinReview => V::Bool(self.join_review),
            AcceptWords => V::List(self.accept_words.clone()),
            RejectWords => V::List(self.reject_words.clone()),
            RejectWordBlacklist => V::Bool(self.reject_word_blacklist),
            NoMatchReject => V::Bool(self.no_match_reject),
            MinLevel => V::Int(self.min_level),
            MaxAttempts => V::Int(self.max_attempts),
            BlockIds => V::List(self.block_ids.iter().map(u64::to_string).collect()),
            AdminAudit => V::Bool(self.admin_audit),
            LeaveNotify => V::Bool(self.leave_notify),
            LeaveBlock => V::Bool(self.leave_block),
            WelcomeTemplate => V::Text(self.welcome_template.clone()),
            JoinMuteSecs => V::Int(self.join_mute_secs),
            BanWords => V::List(self.ban_words.clone()),
            BuiltinBan => V::Bool(self.builtin_ban),
            WordMuteSecs => V::Int(self.word_mute_secs),
            FloodMuteSecs => V::Int(self.flood_mute_secs),
            VoteThreshold => V::Int(self.vote_threshold),
            VoteTtlSecs => V::Int(self.vote_ttl_secs),
            VoteMuteMinSecs => V::Int(self.vote_mute_min_secs),
            VoteMuteMaxSecs => V::Int(self.vote_mute_max_secs),
        }
    }

    /// Overwrite one setting. Nothing is changed if the value does not fit.
    pub fn assign(&mut self, field: ConfigField, value: SettingValue) -> Result<(), ConfigError> {
        use ConfigField::*;

        let invalid = || ConfigError::InvalidValue {
            field: field.key(),
            expected: field.kind().expected(),
        };
        if !value.fits(field.kind()) {
            return Err(invalid());
        }

        match (field, value) {
            (BlockIds, SettingValue::List(items)) => {
                self.block_ids = items
                    .iter()
                    .map(|s| s.parse::<u64>())
                    .collect::<Result<_, _>>()
                    .map_err(|_| invalid())?;
            }
            (AcceptWords, SettingValue::List(items)) => self.accept_words = items,
            (RejectWords, SettingValue::List(items)) => self.reject_words = items,
            (BanWords, SettingValue::List(items)) => self.ban_words = items,
            (WelcomeTemplate, SettingValue::Text(text)) => self.welcome_template = text,
            (field, SettingValue::Bool(b)) => *self.bool_mut(field).ok_or_else(invalid)? = b,
            (field, SettingValue::Int(n)) => *self.int_mut(field).ok_or_else(invalid)? = n,
            _ => return Err(invalid()),
        }
        Ok(())
    }

    /// Add an element to a list setting. Returns `false` if already present.
    pub fn list_add(&mut self, field: ConfigField, item: &str) -> Result<bool, ConfigError> {
        let item = item.trim();
        if field.kind() == FieldKind::Ids {
            let id = parse_id(field, item)?;
            if self.block_ids.contains(&id) {
                return Ok(false);
            }
            self.block_ids.push(id);
            return Ok(true);
        }

        let list = self.words_mut(field).ok_or(ConfigError::NotAList(field.key()))?;
        if item.is_empty() || list.iter().any(|w| w == item) {
            return Ok(false);
        }
        list.push(item.to_string());
        Ok(true)
    }

    /// Remove an element from a list setting. Returns `false` if absent.
    pub fn list_remove(&mut self, field: ConfigField, item: &str) -> Result<bool, ConfigError> {
        let item = item.trim();
        if field.kind() == FieldKind::Ids {
            let id = parse_id(field, item)?;
            let before = self.block_ids.len();
            self.block_ids.retain(|&b| b != id);
            return Ok(self.block_ids.len() != before);
        }

        let list = self.words_mut(field).ok_or(ConfigError::NotAList(field.key()))?;
        let before = list.len();
        list.retain(|w| w != item);
        Ok(list.len() != before)
    }

    fn words_mut(&mut self, field: ConfigField) -> Option<&mut Vec<String>> {
        match field {
            ConfigField::AcceptWords => Some(&mut self.accept_words),
            ConfigField::RejectWords => Some(&mut self.reject_words),
            ConfigField::BanWords => Some(&mut self.ban_words),
            _ => None,
        }
    }

    fn bool_mut(&mut self, field: ConfigField) -> Option<&mut bool> {
        use ConfigField::*;
        match field {
            JoinReview => Some(&mut self.join_review),
            RejectWordBlacklist => Some(&mut self.reject_word_blacklist),
            NoMatchReject => Some(&mut self.no_match_reject),
            AdminAudit => Some(&mut self.admin_audit),
            LeaveNotify => Some(&mut self.leave_notify),
            LeaveBlock => Some(&mut self.leave_block),
            BuiltinBan => Some(&mut self.builtin_ban),
            _ => None,
        }
    }

    fn int_mut(&mut self, field: ConfigField) -> Option<&mut u64> {
        use ConfigField::*;
        match field {
            MinLevel => Some(&mut self.min_level),
            MaxAttempts => Some(&mut self.max_attempts),
            JoinMuteSecs => Some(&mut self.join_mute_secs),
            WordMuteSecs => Some(&mut self.word_mute_secs),
            FloodMuteSecs => Some(&mut self.flood_mute_secs),
            VoteThreshold => Some(&mut self.vote_threshold),
            VoteTtlSecs => Some(&mut self.vote_ttl_secs),
            VoteMuteMinSecs => Some(&mut self.vote_mute_min_secs),
            VoteMuteMaxSecs => Some(&mut self.vote_mute_max_secs),
            _ => None,
        }
    }
}

fn parse_id(field: ConfigField, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        field: field.key(),
        expected: FieldKind::Ids.expected(),
    })
}

/// Value shape of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Int,
    Text,
    Words,
    Ids,
}

impl FieldKind {
    /// Human-readable input format, used in error replies.
    pub fn expected(self) -> &'static str {
        match self {
            Self::Bool => "on/off",
            Self::Int => "a non-negative integer",
            Self::Text => "any text",
            Self::Words => "a space separated word list",
            Self::Ids => "a space separated list of numeric user ids",
        }
    }

    pub fn is_list(self) -> bool {
        matches!(self, Self::Words | Self::Ids)
    }
}

macro_rules! config_fields {
    ($($variant:ident => $key:literal : $kind:ident),+ $(,)?) => {
        /// Name of a single setting in [`GroupConfig`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ConfigField {
            $($variant),+
        }

        impl ConfigField {
            pub const ALL: &'static [ConfigField] = &[$(ConfigField::$variant),+];

            /// Persisted key.
            pub fn key(self) -> &'static str {
                match self {
                    $(Self::$variant => $key),+
                }
            }

            pub fn kind(self) -> FieldKind {
                match self {
                    $(Self::$variant => FieldKind::$kind),+
                }
            }
        }
    };
}

config_fields! {
    JoinReview => "join_review": Bool,
    AcceptWords => "accept_words": Words,
    RejectWords => "reject_words": Words,
    RejectWordBlacklist => "reject_word_blacklist": Bool,
    NoMatchReject => "no_match_reject": Bool,
    MinLevel => "min_level": Int,
    MaxAttempts => "max_attempts": Int,
    BlockIds => "block_ids": Ids,
    AdminAudit => "admin_audit": Bool,
    LeaveNotify => "leave_notify": Bool,
    LeaveBlock => "leave_block": Bool,
    WelcomeTemplate => "welcome_template": Text,
    JoinMuteSecs => "join_mute_secs": Int,
    BanWords => "ban_words": Words,
    BuiltinBan => "builtin_ban": Bool,
    WordMuteSecs => "word_mute_secs": Int,
    FloodMuteSecs => "flood_mute_secs": Int,
    VoteThreshold => "vote_threshold": Int,
    VoteTtlSecs => "vote_ttl_secs": Int,
    VoteMuteMinSecs => "vote_mute_min_secs": Int,
    VoteMuteMaxSecs => "vote_mute_max_secs": Int,
}

impl FromStr for ConfigField {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.key() == wanted)
            .ok_or_else(|| ConfigError::UnknownField(s.trim().to_string()))
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A setting value as seen through the field-level API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Bool(bool),
    Int(u64),
    Text(String),
    List(Vec<String>),
}

impl SettingValue {
    /// Parse user input for a field of the given kind.
    ///
    /// List kinds take whitespace separated tokens; ids must be numeric.
    pub fn parse(field: ConfigField, raw: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            field: field.key(),
            expected: field.kind().expected(),
        };
        let raw = raw.trim();

        match field.kind() {
            FieldKind::Bool => crate::utils::parse_toggle(raw)
                .map(SettingValue::Bool)
                .ok_or_else(invalid),
            FieldKind::Int => raw.parse::<u64>().map(SettingValue::Int).map_err(|_| invalid()),
            FieldKind::Text => Ok(SettingValue::Text(raw.to_string())),
            FieldKind::Words => Ok(SettingValue::List(
                raw.split_whitespace().map(str::to_string).collect(),
            )),
            FieldKind::Ids => {
                let ids = raw
                    .split_whitespace()
                    .map(|tok| tok.parse::<u64>().map(|_| tok.to_string()))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| invalid())?;
                Ok(SettingValue::List(ids))
            }
        }
    }

    /// Whether this value fits a field of the given kind.
    pub fn fits(&self, kind: FieldKind) -> bool {
        matches!(
            (self, kind),
            (Self::Bool(_), FieldKind::Bool)
                | (Self::Int(_), FieldKind::Int)
                | (Self::Text(_), FieldKind::Text)
                | (Self::List(_), FieldKind::Words | FieldKind::Ids)
        )
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("on"),
            Self::Bool(false) => f.write_str("off"),
            Self::Int(n) => write!(f, "{}", n),
            Self::Text(s) if s.is_empty() => f.write_str("(empty)"),
            Self::Text(s) => f.write_str(s),
            Self::List(items) if items.is_empty() => f.write_str("[]"),
            Self::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

/// Whether two JSON values have the same shape for migration purposes.
fn same_shape(stored: &Value, template: &Value) -> bool {
    match (stored, template) {
        (Value::Bool(_), Value::Bool(_)) => true,
        (Value::Number(a), Value::Number(_)) => a.is_u64(),
        (Value::String(_), Value::String(_)) => true,
        (Value::Array(_), Value::Array(_)) => true,
        _ => false,
    }
}

/// Coerce the items of a stored list to the element type of its field.
///
/// Ids stored as strings become numbers and words stored as numbers become
/// strings; anything else is dropped. Returns the items and whether any
/// of them changed.
fn migrate_list(key: &str, items: &[Value]) -> (Vec<Value>, bool) {
    let kind = key.parse::<ConfigField>().ok().map(ConfigField::kind);
    let migrated: Vec<Value> = items
        .iter()
        .filter_map(|item| match (kind, item) {
            (Some(FieldKind::Ids), Value::Number(n)) if n.is_u64() => Some(item.clone()),
            (Some(FieldKind::Ids), Value::String(s)) => s.trim().parse::<u64>().ok().map(Value::from),
            (Some(FieldKind::Words), Value::String(_)) => Some(item.clone()),
            (Some(FieldKind::Words), Value::Number(n)) => Some(Value::String(n.to_string())),
            _ => None,
        })
        .collect();
    let changed = migrated.as_slice() != items;
    (migrated, changed)
}

/// Bring a stored settings object up to the shape of `template`.
///
/// Missing keys are filled from the template, keys of the wrong shape are
/// replaced by the template value, list items are coerced to their field's
/// element type and unknown keys are dropped. Returns the
/// reconciled object and whether anything changed.
pub fn reconcile(
    mut stored: Map<String, Value>,
    template: &Map<String, Value>,
) -> (Map<String, Value>, bool) {
    let mut changed = false;

    stored.retain(|key, _| {
        let known = template.contains_key(key);
        if !known {
            tracing::debug!("Dropping obsolete setting '{}'", key);
            changed = true;
        }
        known
    });

    for (key, default) in template {
        match stored.get(key) {
            Some(Value::Array(items)) if default.is_array() => {
                let (items, migrated) = migrate_list(key, items);
                if migrated {
                    tracing::warn!("Setting '{}' had list items of an outdated type, migrating", key);
                    stored.insert(key.clone(), Value::Array(items));
                    changed = true;
                }
            }
            Some(value) if same_shape(value, default) => {}
            Some(_) => {
                tracing::warn!("Setting '{}' has an outdated type, resetting to default", key);
                stored.insert(key.clone(), default.clone());
                changed = true;
            }
            None => {
                stored.insert(key.clone(), default.clone());
                changed = true;
            }
        }
    }

    (stored, changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_field_key_is_serialized() {
        let map = GroupConfig::default().to_map();
        for field in ConfigField::ALL {
            assert!(map.contains_key(field.key()), "missing key {}", field.key());
        }
        assert_eq!(map.len(), ConfigField::ALL.len());
    }

    #[test]
    fn test_field_from_str() {
        assert_eq!("block_ids".parse::<ConfigField>().unwrap(), ConfigField::BlockIds);
        assert_eq!(" Vote_TTL_Secs ".parse::<ConfigField>().unwrap(), ConfigField::VoteTtlSecs);
        assert!(matches!(
            "nope".parse::<ConfigField>(),
            Err(ConfigError::UnknownField(_))
        ));
    }

    #[test]
    fn test_parse_setting_values() {
        assert_eq!(
            SettingValue::parse(ConfigField::JoinReview, "on").unwrap(),
            SettingValue::Bool(true)
        );
        assert_eq!(
            SettingValue::parse(ConfigField::MinLevel, "12").unwrap(),
            SettingValue::Int(12)
        );
        assert!(SettingValue::parse(ConfigField::MinLevel, "-1").is_err());
        assert!(SettingValue::parse(ConfigField::BlockIds, "12 abc").is_err());
        assert_eq!(
            SettingValue::parse(ConfigField::BanWords, "spam  scam").unwrap(),
            SettingValue::List(vec!["spam".into(), "scam".into()])
        );
    }

    #[test]
    fn test_reconcile_fills_and_drops() {
        let template = GroupConfig::default().to_map();
        let stored = json!({
            "join_review": true,
            "min_level": "high",
            "legacy_switch": 1
        });
        let Value::Object(stored) = stored else { unreachable!() };

        let (merged, changed) = reconcile(stored, &template);

        assert!(changed);
        assert_eq!(merged.len(), template.len());
        assert_eq!(merged["join_review"], json!(true));
        assert_eq!(merged["min_level"], template["min_level"]);
        assert!(!merged.contains_key("legacy_switch"));
    }

    #[test]
    fn test_reconcile_migrates_list_items() {
        let template = GroupConfig::default().to_map();
        let mut stored = template.clone();
        stored.insert("block_ids".into(), json!(["123", 456, "x"]));
        stored.insert("ban_words".into(), json!(["spam", 42]));

        let (merged, changed) = reconcile(stored, &template);

        assert!(changed);
        let config: GroupConfig = serde_json::from_value(Value::Object(merged)).unwrap();
        assert_eq!(config.block_ids, vec![123, 456]);
        assert_eq!(config.ban_words, vec!["spam".to_string(), "42".to_string()]);
    }

    #[test]
    fn test_assign_then_value() {
        let mut config = GroupConfig::default();
        config.assign(ConfigField::MinLevel, SettingValue::Int(8)).unwrap();
        config
            .assign(ConfigField::BlockIds, SettingValue::List(vec!["42".into(), "7".into()]))
            .unwrap();

        assert_eq!(config.value(ConfigField::MinLevel), SettingValue::Int(8));
        assert_eq!(config.block_ids, vec![42, 7]);

        let err = config.assign(ConfigField::MinLevel, SettingValue::Bool(true));
        assert!(matches!(err, Err(ConfigError::InvalidValue { field: "min_level", .. })));
        assert_eq!(config.min_level, 8);
    }

    #[test]
    fn test_list_add_remove_are_set_like() {
        let mut config = GroupConfig::default();
        assert!(config.list_add(ConfigField::BanWords, "spam").unwrap());
        assert!(!config.list_add(ConfigField::BanWords, "spam").unwrap());
        assert!(config.list_add(ConfigField::BlockIds, "99").unwrap());
        assert!(!config.list_add(ConfigField::BlockIds, "99").unwrap());

        assert!(config.list_remove(ConfigField::BanWords, "spam").unwrap());
        assert!(!config.list_remove(ConfigField::BanWords, "spam").unwrap());
        assert!(config.list_add(ConfigField::BlockIds, "abc").is_err());
        assert!(matches!(
            config.list_add(ConfigField::MinLevel, "1"),
            Err(ConfigError::NotAList("min_level"))
        ));
        assert!(config.is_blocked(99));
    }

    #[test]
    fn test_reconcile_current_record_is_untouched() {
        let template = GroupConfig::default().to_map();
        let (_, changed) = reconcile(template.clone(), &template);
        assert!(!changed);
    }
}
