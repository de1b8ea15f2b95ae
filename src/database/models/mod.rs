//! Database models.

pub mod group_config;

pub use group_config::{ConfigField, FieldKind, GroupConfig, SettingValue};
