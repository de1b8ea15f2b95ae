//! Join request screening.
//!
//! Rules are evaluated in a fixed order and the first match decides:
//! blacklist, level floor, reject keyword, accept keyword, attempt ceiling,
//! no-match policy. Screening itself is pure; the controller adds the
//! attempt counter and the blacklist side effects.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use super::{GroupId, UserId};
use crate::database::{GroupConfig, GroupConfigRepository, StoreError};

/// Marker after which the applicant's actual answer starts.
pub const ANSWER_MARKER: &str = "answer:";

/// Outcome of a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Admit,
    Reject,
    /// A human administrator has to decide.
    Defer,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Admit => "admit",
            Self::Reject => "reject",
            Self::Defer => "defer",
        })
    }
}

/// A screening decision with its user-facing reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub verdict: Verdict,
    pub reason: String,
    /// The applicant was added to the blacklist while deciding.
    pub blacklisted: bool,
}

impl Decision {
    fn new(verdict: Verdict, reason: impl Into<String>) -> Self {
        Self {
            verdict,
            reason: reason.into(),
            blacklisted: false,
        }
    }

    fn blacklisting(mut self) -> Self {
        self.blacklisted = true;
        self
    }
}

/// Result of the rules that do not depend on the attempt counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screening {
    Decided(Decision),
    /// No rule up to the accept keywords matched.
    Inconclusive,
}

/// The part of an application comment that is matched against keywords.
pub fn answer_text(comment: &str) -> String {
    let lower = comment.to_lowercase();
    match lower.find(ANSWER_MARKER) {
        Some(idx) => lower[idx + ANSWER_MARKER.len()..].trim().to_string(),
        None => lower,
    }
}

/// Apply rules 1-4 to an application.
pub fn screen(
    config: &GroupConfig,
    user_id: UserId,
    comment: Option<&str>,
    level: Option<u64>,
) -> Screening {
    if config.is_blocked(user_id) {
        return Screening::Decided(Decision::new(Verdict::Reject, "blacklisted user"));
    }

    if config.min_level > 0
        && let Some(level) = level
        && level < config.min_level
    {
        return Screening::Decided(Decision::new(
            Verdict::Reject,
            format!("level too low ({} < {})", level, config.min_level),
        ));
    }

    if let Some(comment) = comment.filter(|c| !c.trim().is_empty()) {
        let answer = answer_text(comment);
        let hits = |words: &[String]| {
            words
                .iter()
                .any(|w| !w.is_empty() && answer.contains(&w.to_lowercase()))
        };

        if hits(&config.reject_words) {
            let decision = if config.reject_word_blacklist {
                Decision::new(Verdict::Reject, "matched a reject keyword, user blacklisted")
                    .blacklisting()
            } else {
                Decision::new(Verdict::Reject, "matched a reject keyword")
            };
            return Screening::Decided(decision);
        }

        if hits(&config.accept_words) {
            return Screening::Decided(Decision::new(Verdict::Admit, "matched an accept keyword"));
        }
    }

    Screening::Inconclusive
}

/// Apply rules 5-6 given the attempt count after this application.
pub fn settle_inconclusive(config: &GroupConfig, attempts: Option<u64>) -> Decision {
    if let Some(attempts) = attempts
        && config.max_attempts > 0
        && attempts >= config.max_attempts
    {
        return Decision::new(
            Verdict::Reject,
            format!(
                "join attempts reached the limit ({}), user blacklisted",
                config.max_attempts
            ),
        )
        .blacklisting();
    }

    if config.no_match_reject {
        Decision::new(Verdict::Reject, "no keyword matched")
    } else {
        Decision::new(Verdict::Defer, "no keyword matched")
    }
}

/// Stateful admission controller. Attempt counters live in memory only.
#[derive(Clone, Default)]
pub struct AdmissionController {
    attempts: Arc<DashMap<(GroupId, UserId), u64>>,
}

impl AdmissionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide on a join request, applying blacklist side effects.
    pub async fn decide(
        &self,
        configs: &GroupConfigRepository,
        group_id: GroupId,
        user_id: UserId,
        comment: Option<&str>,
        level: Option<u64>,
    ) -> Result<Decision, StoreError> {
        let config = configs.get(group_id).await?;

        let decision = match screen(&config, user_id, comment, level) {
            Screening::Decided(decision) => decision,
            Screening::Inconclusive => {
                let attempts = (config.max_attempts > 0).then(|| self.bump(group_id, user_id));
                settle_inconclusive(&config, attempts)
            }
        };

        if decision.blacklisted {
            configs.block_user(group_id, user_id).await?;
            info!("User {} blacklisted in group {}: {}", user_id, group_id, decision.reason);
        }
        if decision.verdict == Verdict::Admit {
            self.attempts.remove(&(group_id, user_id));
        }

        debug!(
            "Join request of {} in group {}: {} ({})",
            user_id, group_id, decision.verdict, decision.reason
        );
        Ok(decision)
    }

    /// Count one more inconclusive application.
    fn bump(&self, group_id: GroupId, user_id: UserId) -> u64 {
        let mut count = self.attempts.entry((group_id, user_id)).or_insert(0);
        *count += 1;
        *count
    }

    /// Inconclusive applications recorded for a user.
    pub fn attempts(&self, group_id: GroupId, user_id: UserId) -> u64 {
        self.attempts
            .get(&(group_id, user_id))
            .map(|c| *c)
            .unwrap_or(0)
    }
}
