//! Parsers for command arguments.

use std::time::Duration;

/// Parse an on/off switch.
pub fn parse_toggle(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "on" | "yes" | "true" | "1" | "enable" | "enabled" => Some(true),
        "off" | "no" | "false" | "0" | "disable" | "disabled" => Some(false),
        _ => None,
    }
}

/// Parse duration string (e.g., "90", "30s", "10m", "1h").
///
/// Supported units:
/// - s: seconds (also the default without a unit)
/// - m: minutes
/// - h: hours
/// - d: days
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(secs) = input.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let unit = input.chars().last()?;
    let amount: u64 = input[..input.len() - unit.len_utf8()].parse().ok()?;

    let seconds = match unit {
        's' => amount,
        'm' => amount.checked_mul(60)?,
        'h' => amount.checked_mul(3600)?,
        'd' => amount.checked_mul(86400)?,
        _ => return None,
    };

    Some(Duration::from_secs(seconds))
}

/// Format a duration in seconds for display.
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        let (mins, rest) = (secs / 60, secs % 60);
        if rest > 0 {
            format!("{}m {}s", mins, rest)
        } else {
            format!("{}m", mins)
        }
    } else {
        let (hours, mins) = (secs / 3600, (secs % 3600) / 60);
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}h", hours)
        }
    }
}

/// Requested change to a list setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEdit {
    /// Overwrite the whole list.
    Replace(Vec<String>),
    /// `+item` / `-item` edits; bare items are added.
    Edit { add: Vec<String>, remove: Vec<String> },
}

/// Interpret list arguments: plain items replace the list, while any
/// `+x` or `-x` token switches to incremental edits.
pub fn parse_list_edit<'a>(args: impl IntoIterator<Item = &'a str>) -> ListEdit {
    let args: Vec<&str> = args.into_iter().filter(|a| !a.is_empty()).collect();

    if !args.iter().any(|a| a.starts_with('+') || a.starts_with('-')) {
        return ListEdit::Replace(args.into_iter().map(String::from).collect());
    }

    let mut add = Vec::new();
    let mut remove = Vec::new();
    for arg in args {
        if let Some(item) = arg.strip_prefix('-') {
            if !item.is_empty() {
                remove.push(item.to_string());
            }
        } else {
            let item = arg.strip_prefix('+').unwrap_or(arg);
            if !item.is_empty() {
                add.push(item.to_string());
            }
        }
    }
    ListEdit::Edit { add, remove }
}
