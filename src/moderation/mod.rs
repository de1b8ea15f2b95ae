//! Moderation engine.
//!
//! [`ModerationEngine`] owns every piece of runtime moderation state (flood
//! windows, join attempt counters, open votes) and routes inbound events to
//! the component that decides on them. Decisions are made first; platform
//! actions come after and are best-effort.

pub mod admission;
pub mod antiflood;
pub mod banwords;
pub mod platform;
pub mod vote;

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

pub use admission::{AdmissionController, Decision, Verdict};
pub use antiflood::FloodTracker;
pub use banwords::BanLexicon;
pub use platform::{
    ChatMessage, GroupId, JoinRequest, MemberEvent, MessageId, Platform, PlatformError, UserId,
};
pub use vote::{BallotOutcome, Tally, VoteCoordinator, VoteError, VoteOutcome, VoteRequest};

use crate::database::{GroupConfig, GroupConfigRepository, StoreError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Vote(#[from] VoteError),
}

/// What happened to an inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageVerdict {
    Clean,
    /// Deleted for containing this banned word.
    BannedWord(String),
    /// The sender was muted for flooding.
    Flooding,
}

pub struct ModerationEngine {
    configs: Arc<GroupConfigRepository>,
    platform: Arc<dyn Platform>,
    flood: FloodTracker,
    admission: AdmissionController,
    votes: VoteCoordinator,
    lexicon: BanLexicon,
    owners: Vec<UserId>,
}

impl ModerationEngine {
    pub fn new(configs: Arc<GroupConfigRepository>, platform: Arc<dyn Platform>) -> Self {
        Self {
            votes: VoteCoordinator::new(platform.clone()),
            configs,
            platform,
            flood: FloodTracker::new(),
            admission: AdmissionController::new(),
            lexicon: BanLexicon::default(),
            owners: Vec::new(),
        }
    }

    pub fn with_lexicon(mut self, lexicon: BanLexicon) -> Self {
        self.lexicon = lexicon;
        self
    }

    /// Bot owners receive join audits when a group enables `admin_audit`.
    pub fn with_owners(mut self, owners: Vec<UserId>) -> Self {
        self.owners = owners;
        self
    }

    /// The group config store.
    pub fn config(&self) -> &GroupConfigRepository {
        &self.configs
    }

    pub fn owners(&self) -> &[UserId] {
        &self.owners
    }

    pub fn votes(&self) -> &VoteCoordinator {
        &self.votes
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub async fn on_message(&self, message: &ChatMessage) -> Result<MessageVerdict, StoreError> {
        self.on_message_at(message, Instant::now()).await
    }

    /// Scan a group message for banned words, then check for flooding.
    pub async fn on_message_at(
        &self,
        message: &ChatMessage,
        now: Instant,
    ) -> Result<MessageVerdict, StoreError> {
        if message.is_from_self() {
            return Ok(MessageVerdict::Clean);
        }

        let group_id = message.group_id;
        let sender = message.sender_id;
        let config = self.configs.get(group_id).await?;

        if let Some(word) = banwords::find_banned_word(&message.text, &config, &self.lexicon) {
            let word = word.to_string();
            info!("Banned word from {} in group {}, deleting message", sender, group_id);

            if let Err(e) = self.platform.delete_message(group_id, message.message_id).await {
                warn!("Failed to delete message in group {}: {}", group_id, e);
            }
            if config.word_mute_secs > 0 {
                self.mute(group_id, sender, Duration::from_secs(config.word_mute_secs))
                    .await;
            }
            return Ok(MessageVerdict::BannedWord(word));
        }

        if config.flood_mute_secs == 0 {
            return Ok(MessageVerdict::Clean);
        }

        let mute_for = Duration::from_secs(config.flood_mute_secs);
        if !self.flood.record_and_check(group_id, sender, now, mute_for) {
            return Ok(MessageVerdict::Clean);
        }

        info!("Muting {} in group {} for flooding", sender, group_id);
        if self.mute(group_id, sender, mute_for).await {
            let name = self.platform.display_name(group_id, sender).await;
            self.announce(group_id, &format!("{} was muted for flooding.", name))
                .await;
        }
        Ok(MessageVerdict::Flooding)
    }

    /// Screen a join request and answer it when the outcome is automatic.
    ///
    /// Returns `None` when the group has join review turned off.
    pub async fn on_join_request(
        &self,
        request: &JoinRequest,
    ) -> Result<Option<Decision>, StoreError> {
        let group_id = request.group_id;
        let config = self.configs.get(group_id).await?;
        if !config.join_review {
            debug!("Join review is off in group {}, leaving request", group_id);
            return Ok(None);
        }

        let decision = self
            .admission
            .decide(
                &self.configs,
                group_id,
                request.user_id,
                request.comment.as_deref(),
                request.level,
            )
            .await?;

        let name = self.platform.display_name(group_id, request.user_id).await;
        self.audit(&config, group_id, &join_notice(request, &name))
            .await;

        let approve = match decision.verdict {
            Verdict::Defer => return Ok(Some(decision)),
            Verdict::Admit => true,
            Verdict::Reject => false,
        };

        match self
            .platform
            .respond_to_join_request(request, approve, &decision.reason)
            .await
        {
            Ok(()) => {
                let verb = if approve { "Auto-approved" } else { "Auto-rejected" };
                self.audit(&config, group_id, &format!("{}: {}", verb, decision.reason))
                    .await;
            }
            Err(e) => warn!(
                "Failed to answer join request of {} in group {}: {}",
                request.user_id, group_id, e
            ),
        }
        Ok(Some(decision))
    }

    /// Greet and optionally mute a member who just joined.
    pub async fn on_member_joined(&self, event: MemberEvent) -> Result<(), StoreError> {
        let config = self.configs.get(event.group_id).await?;

        if !config.welcome_template.is_empty() {
            let name = self.platform.display_name(event.group_id, event.user_id).await;
            let text = render_welcome(&config.welcome_template, &name, event.user_id);
            self.announce(event.group_id, &text).await;
        }
        if config.join_mute_secs > 0 {
            self.mute(
                event.group_id,
                event.user_id,
                Duration::from_secs(config.join_mute_secs),
            )
            .await;
        }
        Ok(())
    }

    /// Announce a voluntary leave and blacklist the leaver if configured.
    pub async fn on_member_left(&self, event: MemberEvent) -> Result<(), StoreError> {
        let config = self.configs.get(event.group_id).await?;
        if !config.leave_notify {
            return Ok(());
        }

        let name = self.platform.display_name(event.group_id, event.user_id).await;
        let mut text = format!("{} ({}) left the group", name, event.user_id);
        if config.leave_block {
            self.configs.block_user(event.group_id, event.user_id).await?;
            info!("Blacklisted {} in group {} after leaving", event.user_id, event.group_id);
            text.push_str(", blacklisted");
        }
        self.announce(event.group_id, &text).await;
        Ok(())
    }

    /// Open a vote to mute `target`. Without an explicit duration one is
    /// drawn from the group's configured range.
    pub async fn start_vote(
        &self,
        group_id: GroupId,
        target: UserId,
        duration: Option<Duration>,
    ) -> Result<VoteRequest, EngineError> {
        let config = self.configs.get(group_id).await?;
        let request = VoteRequest {
            target,
            threshold: config.vote_threshold.max(1),
            ttl: Duration::from_secs(config.vote_ttl_secs),
            duration: duration.unwrap_or_else(|| random_vote_duration(&config)),
        };
        self.votes.open(group_id, request)?;

        let name = self.platform.display_name(group_id, target).await;
        self.announce(
            group_id,
            &format!(
                "Vote to mute {} for {} seconds started. Reply /agree or /disagree, {} votes settle it, closes in {} seconds.",
                name,
                request.duration.as_secs(),
                request.threshold,
                request.ttl.as_secs()
            ),
        )
        .await;
        Ok(request)
    }

    /// Record a ballot and announce the tally or the result.
    pub async fn cast_ballot(
        &self,
        group_id: GroupId,
        voter: UserId,
        agree: bool,
    ) -> Result<BallotOutcome, VoteError> {
        let outcome = self.votes.cast(group_id, voter, agree)?;
        match outcome {
            BallotOutcome::Pending(tally) => {
                self.announce(
                    group_id,
                    &format!(
                        "Agree {}/{}, disagree {}/{}",
                        tally.agree, tally.threshold, tally.disagree, tally.threshold
                    ),
                )
                .await;
            }
            BallotOutcome::Settled(settled) => self.votes.enact(group_id, settled).await,
        }
        Ok(outcome)
    }

    /// Stop accepting votes, finish every pending settlement, then close
    /// the config store.
    pub async fn shutdown(&self) {
        self.votes.shutdown().await;
        self.configs.close().await;
        info!("Moderation engine stopped");
    }

    async fn mute(&self, group_id: GroupId, user_id: UserId, duration: Duration) -> bool {
        match self.platform.mute(group_id, user_id, duration).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to mute {} in group {}: {}", user_id, group_id, e);
                false
            }
        }
    }

    async fn announce(&self, group_id: GroupId, text: &str) {
        if let Err(e) = self.platform.send_message(group_id, text).await {
            warn!("Failed to send message to group {}: {}", group_id, e);
        }
    }

    /// Send a join notice to the owners or the group, per `admin_audit`.
    async fn audit(&self, config: &GroupConfig, group_id: GroupId, text: &str) {
        if !config.admin_audit {
            self.announce(group_id, text).await;
            return;
        }
        for owner in &self.owners {
            if let Err(e) = self.platform.send_private(*owner, text).await {
                warn!("Failed to send join audit to {}: {}", owner, e);
            }
        }
    }
}

fn join_notice(request: &JoinRequest, name: &str) -> String {
    let mut notice = format!(
        "Join request\nName: {}\nUser id: {}\nFlag: {}",
        name, request.user_id, request.flag
    );
    if let Some(level) = request.level {
        notice.push_str(&format!("\nLevel: {}", level));
    }
    if let Some(comment) = request.comment.as_deref().filter(|c| !c.is_empty()) {
        notice.push('\n');
        notice.push_str(comment);
    }
    notice
}

/// Fill the `{nickname}` and `{id}` placeholders of a welcome template.
pub fn render_welcome(template: &str, name: &str, user_id: UserId) -> String {
    template
        .replace("{nickname}", name)
        .replace("{id}", &user_id.to_string())
}

fn random_vote_duration(config: &GroupConfig) -> Duration {
    let (low, high) = if config.vote_mute_min_secs <= config.vote_mute_max_secs {
        (config.vote_mute_min_secs, config.vote_mute_max_secs)
    } else {
        (config.vote_mute_max_secs, config.vote_mute_min_secs)
    };
    Duration::from_secs(rand::random_range(low..=high))
}
