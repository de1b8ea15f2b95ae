//! Banned-word scanning.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

use crate::database::GroupConfig;

/// Built-in banned-word lexicon, shared by every group that enables it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BanLexicon {
    words: Vec<String>,
}

impl BanLexicon {
    pub fn new(words: Vec<String>) -> Self {
        Self { words }
    }

    /// Load a lexicon file of the form `{"words": ["...", ...]}`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ban lexicon {}", path.display()))?;
        let lexicon: Self = serde_json::from_str(&raw)
            .with_context(|| format!("invalid ban lexicon {}", path.display()))?;
        info!("Loaded {} built-in banned words", lexicon.words.len());
        Ok(lexicon)
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }
}

/// First banned word contained in `text`.
///
/// The group's own list is checked before the built-in lexicon, which only
/// applies when the group enabled it. Matching is case-sensitive.
pub fn find_banned_word<'a>(
    text: &str,
    config: &'a GroupConfig,
    lexicon: &'a BanLexicon,
) -> Option<&'a str> {
    let builtin: &[String] = if config.builtin_ban { lexicon.words() } else { &[] };

    config
        .ban_words
        .iter()
        .chain(builtin)
        .map(String::as_str)
        .find(|word| !word.is_empty() && text.contains(word))
}
