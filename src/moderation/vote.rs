//! Vote-mute coordination.
//!
//! At most one vote is open per group. A vote settles either early, when a
//! ballot brings one side to quorum, or when its timer fires. Both paths
//! remove the record under the table lock and only the path that still finds
//! it (with the same vote id) acts; the other one is a no-op.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::{GroupId, Platform, UserId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoteError {
    #[error("a vote is already in progress in this group")]
    AlreadyOpen,

    #[error("no active vote")]
    NoActiveVote,

    #[error("votes are closed, the bot is shutting down")]
    ShuttingDown,
}

/// An open vote.
#[derive(Debug, Clone)]
pub struct VoteRecord {
    pub id: u64,
    pub target: UserId,
    pub threshold: u64,
    pub duration: Duration,
    pub expires_at: Instant,
    ballots: HashMap<UserId, bool>,
}

impl VoteRecord {
    pub fn tally(&self) -> Tally {
        let agree = self.ballots.values().filter(|&&b| b).count() as u64;
        Tally {
            agree,
            disagree: self.ballots.len() as u64 - agree,
            threshold: self.threshold,
        }
    }
}

/// Ballot counts of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub agree: u64,
    pub disagree: u64,
    pub threshold: u64,
}

/// How a vote ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Passed {
        target: UserId,
        duration: Duration,
        tally: Tally,
    },
    Failed {
        target: UserId,
        tally: Tally,
    },
    /// Dropped on shutdown before it could settle.
    Cancelled { target: UserId },
}

/// Result of a single ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallotOutcome {
    Pending(Tally),
    Settled(VoteOutcome),
}

/// Parameters of a new vote.
#[derive(Debug, Clone, Copy)]
pub struct VoteRequest {
    pub target: UserId,
    pub threshold: u64,
    pub ttl: Duration,
    pub duration: Duration,
}

struct Inner {
    votes: Mutex<HashMap<GroupId, VoteRecord>>,
    next_id: AtomicU64,
    platform: Arc<dyn Platform>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

/// Owns every open vote and its settlement timer.
#[derive(Clone)]
pub struct VoteCoordinator {
    inner: Arc<Inner>,
}

impl VoteCoordinator {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self {
            inner: Arc::new(Inner {
                votes: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                platform,
                tracker: TaskTracker::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Open a vote and schedule its settlement. Returns the vote id.
    pub fn open(&self, group_id: GroupId, request: VoteRequest) -> Result<u64, VoteError> {
        if self.inner.cancel.is_cancelled() {
            return Err(VoteError::ShuttingDown);
        }

        let (id, threshold) = {
            let mut votes = self.inner.votes.lock();
            if votes.contains_key(&group_id) {
                return Err(VoteError::AlreadyOpen);
            }
            let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
            let threshold = request.threshold.max(1);
            votes.insert(
                group_id,
                VoteRecord {
                    id,
                    target: request.target,
                    threshold,
                    duration: request.duration,
                    expires_at: Instant::now() + request.ttl,
                    ballots: HashMap::new(),
                },
            );
            (id, threshold)
        };

        info!(
            "Vote {} opened in group {} against {} (threshold {}, ttl {:?})",
            id, group_id, request.target, threshold, request.ttl
        );
        self.schedule(group_id, id, request.ttl);
        Ok(id)
    }

    fn schedule(&self, group_id: GroupId, id: u64, ttl: Duration) {
        let coordinator = self.clone();
        self.inner.tracker.spawn(async move {
            let outcome = tokio::select! {
                _ = tokio::time::sleep(ttl) => coordinator.settle_expired(group_id, id),
                _ = coordinator.inner.cancel.cancelled() => coordinator.abandon(group_id, id),
            };
            match outcome {
                Some(outcome) => coordinator.enact(group_id, outcome).await,
                None => debug!("Vote {} in group {} was already settled", id, group_id),
            }
        });
    }

    /// Record a ballot, replacing the voter's earlier one, and settle the
    /// vote if either side reached quorum.
    pub fn cast(
        &self,
        group_id: GroupId,
        voter: UserId,
        agree: bool,
    ) -> Result<BallotOutcome, VoteError> {
        let mut votes = self.inner.votes.lock();
        let record = votes.get_mut(&group_id).ok_or(VoteError::NoActiveVote)?;
        record.ballots.insert(voter, agree);

        let tally = record.tally();
        let outcome = if tally.agree >= tally.threshold {
            VoteOutcome::Passed {
                target: record.target,
                duration: record.duration,
                tally,
            }
        } else if tally.disagree >= tally.threshold {
            VoteOutcome::Failed {
                target: record.target,
                tally,
            }
        } else {
            return Ok(BallotOutcome::Pending(tally));
        };

        votes.remove(&group_id);
        Ok(BallotOutcome::Settled(outcome))
    }

    /// Settle vote `id` by strict majority, if it is still open.
    pub fn settle_expired(&self, group_id: GroupId, id: u64) -> Option<VoteOutcome> {
        let record = self.take(group_id, id)?;
        let tally = record.tally();
        Some(if tally.agree > tally.disagree {
            VoteOutcome::Passed {
                target: record.target,
                duration: record.duration,
                tally,
            }
        } else {
            VoteOutcome::Failed {
                target: record.target,
                tally,
            }
        })
    }

    fn abandon(&self, group_id: GroupId, id: u64) -> Option<VoteOutcome> {
        self.take(group_id, id)
            .map(|record| VoteOutcome::Cancelled {
                target: record.target,
            })
    }

    /// Remove the record only if it is still vote `id`.
    fn take(&self, group_id: GroupId, id: u64) -> Option<VoteRecord> {
        let mut votes = self.inner.votes.lock();
        match votes.get(&group_id) {
            Some(record) if record.id == id => votes.remove(&group_id),
            _ => None,
        }
    }

    /// Snapshot of the open vote in a group.
    pub fn current(&self, group_id: GroupId) -> Option<VoteRecord> {
        self.inner.votes.lock().get(&group_id).cloned()
    }

    /// Carry out a settled vote on the platform and announce it.
    pub async fn enact(&self, group_id: GroupId, outcome: VoteOutcome) {
        let platform = &self.inner.platform;
        let text = match outcome {
            VoteOutcome::Passed {
                target,
                duration,
                tally,
            } => {
                let name = platform.display_name(group_id, target).await;
                match platform.mute(group_id, target, duration).await {
                    Ok(()) => {
                        info!("Vote passed in group {}, muted {}", group_id, target);
                        format!(
                            "Vote passed ({} agree, {} disagree), {} muted for {} seconds.",
                            tally.agree,
                            tally.disagree,
                            name,
                            duration.as_secs()
                        )
                    }
                    Err(e) => {
                        warn!("Vote passed in group {} but mute of {} failed: {}", group_id, target, e);
                        format!("Vote passed, but {} could not be muted.", name)
                    }
                }
            }
            VoteOutcome::Failed { target, tally } => {
                info!("Vote against {} failed in group {}", target, group_id);
                let name = platform.display_name(group_id, target).await;
                format!(
                    "Vote failed ({} agree, {} disagree), {} is not muted.",
                    tally.agree, tally.disagree, name
                )
            }
            VoteOutcome::Cancelled { target } => {
                info!("Vote against {} cancelled in group {}", target, group_id);
                let name = platform.display_name(group_id, target).await;
                format!("Vote against {} was cancelled.", name)
            }
        };

        if let Err(e) = platform.send_message(group_id, &text).await {
            warn!("Failed to announce vote result in group {}: {}", group_id, e);
        }
    }

    /// Cancel pending timers and wait for every settlement task to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        debug!("Vote coordinator stopped");
    }
}
