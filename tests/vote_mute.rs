mod common;

use std::time::Duration;

use common::{GROUP, harness};
use warden::database::GroupConfig;
use warden::moderation::{BallotOutcome, EngineError, VoteError, VoteOutcome};

const TARGET: u64 = 9;

fn vote_config() -> GroupConfig {
    GroupConfig {
        vote_threshold: 3,
        vote_ttl_secs: 120,
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_quorum_passes_early_and_closes_vote() {
    let h = harness(vote_config()).await;
    h.engine
        .start_vote(GROUP, TARGET, Some(Duration::from_secs(600)))
        .await
        .unwrap();

    h.engine.cast_ballot(GROUP, 10, true).await.unwrap();
    h.engine.cast_ballot(GROUP, 11, true).await.unwrap();
    let outcome = h.engine.cast_ballot(GROUP, 12, true).await.unwrap();

    assert!(matches!(
        outcome,
        BallotOutcome::Settled(VoteOutcome::Passed { target: TARGET, .. })
    ));
    assert_eq!(h.platform.mutes(), vec![(TARGET, 600)]);
    assert_eq!(
        h.engine.cast_ballot(GROUP, 13, false).await,
        Err(VoteError::NoActiveVote)
    );

    // The timer later finds nothing to settle.
    tokio::time::sleep(Duration::from_secs(121)).await;
    assert_eq!(h.platform.mutes().len(), 1);
    let said = h.platform.said();
    assert_eq!(said.iter().filter(|t| t.starts_with("Vote passed")).count(), 1);
    assert!(!said.iter().any(|t| t.starts_with("Vote failed")));
}

#[tokio::test(start_paused = true)]
async fn test_tie_at_expiry_fails() {
    let h = harness(vote_config()).await;
    h.engine.start_vote(GROUP, TARGET, None).await.unwrap();

    h.engine.cast_ballot(GROUP, 10, true).await.unwrap();
    h.engine.cast_ballot(GROUP, 11, true).await.unwrap();
    h.engine.cast_ballot(GROUP, 12, false).await.unwrap();
    h.engine.cast_ballot(GROUP, 13, false).await.unwrap();

    tokio::time::sleep(Duration::from_secs(121)).await;

    assert!(h.platform.mutes().is_empty());
    assert_eq!(
        h.platform.said().last().map(String::as_str),
        Some("Vote failed (2 agree, 2 disagree), user9 is not muted.")
    );
    assert!(h.engine.votes().current(GROUP).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_pending_ballots_report_tally() {
    let h = harness(vote_config()).await;
    h.engine.start_vote(GROUP, TARGET, None).await.unwrap();
    h.platform.clear();

    h.engine.cast_ballot(GROUP, 10, true).await.unwrap();
    h.engine.cast_ballot(GROUP, 11, false).await.unwrap();

    assert_eq!(
        h.platform.said(),
        vec![
            "Agree 1/3, disagree 0/3".to_string(),
            "Agree 1/3, disagree 1/3".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_one_vote_per_group() {
    let h = harness(vote_config()).await;
    h.engine.start_vote(GROUP, TARGET, None).await.unwrap();

    let second = h.engine.start_vote(GROUP, 8, None).await;

    assert!(matches!(second, Err(EngineError::Vote(VoteError::AlreadyOpen))));
    assert_eq!(h.engine.votes().current(GROUP).map(|v| v.target), Some(TARGET));
}

#[tokio::test(start_paused = true)]
async fn test_random_duration_comes_from_range() {
    let h = harness(GroupConfig {
        vote_mute_min_secs: 100,
        vote_mute_max_secs: 200,
        ..vote_config()
    })
    .await;

    let request = h.engine.start_vote(GROUP, TARGET, None).await.unwrap();

    assert!((100..=200).contains(&request.duration.as_secs()));
}

#[tokio::test(start_paused = true)]
async fn test_failed_mute_still_closes_vote() {
    let h = harness(vote_config()).await;
    h.platform.deny_mutes();
    h.engine.start_vote(GROUP, TARGET, None).await.unwrap();

    for voter in 10..13 {
        h.engine.cast_ballot(GROUP, voter, true).await.unwrap();
    }

    assert!(h.engine.votes().current(GROUP).is_none());
    assert_eq!(
        h.platform.said().last().map(String::as_str),
        Some("Vote passed, but user9 could not be muted.")
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_pending_votes() {
    let h = harness(vote_config()).await;
    h.engine.start_vote(GROUP, TARGET, None).await.unwrap();

    h.engine.shutdown().await;

    assert!(h.platform.mutes().is_empty());
    assert_eq!(
        h.platform.said().last().map(String::as_str),
        Some("Vote against user9 was cancelled.")
    );
    assert!(h.store.is_closed());
}
