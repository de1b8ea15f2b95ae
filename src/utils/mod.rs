//! Utility functions.
//!
//! Helpers shared by the moderation core and the bot commands.

pub mod parser;

pub use parser::{ListEdit, format_duration, parse_duration, parse_list_edit, parse_toggle};
