mod common;

use common::{Action, GROUP, harness, join_request};
use warden::database::GroupConfig;
use warden::moderation::{MemberEvent, Verdict};

fn review_config() -> GroupConfig {
    GroupConfig {
        join_review: true,
        accept_words: vec!["rust".into()],
        reject_words: vec!["casino".into()],
        ..Default::default()
    }
}

fn answers(actions: &[Action]) -> Vec<(u64, bool)> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::Answer { user, approve, .. } => Some((*user, *approve)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_blacklist_wins_over_accept_keyword() {
    let h = harness(review_config()).await;
    h.engine.config().block_user(GROUP, 7).await.unwrap();

    let decision = h
        .engine
        .on_join_request(&join_request(7, Some("I write rust")))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(decision.verdict, Verdict::Reject);
    assert_eq!(decision.reason, "blacklisted user");
    assert_eq!(answers(&h.platform.actions()), vec![(7, false)]);
}

#[tokio::test]
async fn test_accept_keyword_admits_and_announces() {
    let h = harness(review_config()).await;

    let decision = h
        .engine
        .on_join_request(&join_request(7, Some("Q: why? Answer: RUST")))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(decision.verdict, Verdict::Admit);
    assert_eq!(answers(&h.platform.actions()), vec![(7, true)]);
    let said = h.platform.said();
    assert!(said[0].starts_with("Join request\nName: user7\nUser id: 7"));
    assert_eq!(said[1], "Auto-approved: matched an accept keyword");
}

#[tokio::test]
async fn test_attempt_ceiling_blacklists_on_third_try() {
    let h = harness(GroupConfig {
        max_attempts: 3,
        ..review_config()
    })
    .await;

    let mut verdicts = Vec::new();
    for _ in 0..3 {
        let decision = h
            .engine
            .on_join_request(&join_request(7, Some("hello")))
            .await
            .unwrap()
            .unwrap();
        verdicts.push(decision.verdict);
    }
    assert_eq!(verdicts, vec![Verdict::Defer, Verdict::Defer, Verdict::Reject]);
    assert!(h.engine.config().get(GROUP).await.unwrap().is_blocked(7));

    let fourth = h
        .engine
        .on_join_request(&join_request(7, Some("hello")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fourth.reason, "blacklisted user");
}

#[tokio::test]
async fn test_admit_clears_attempt_counter() {
    let h = harness(GroupConfig {
        max_attempts: 2,
        ..review_config()
    })
    .await;

    h.engine.on_join_request(&join_request(7, None)).await.unwrap();
    assert_eq!(h.engine.admission().attempts(GROUP, 7), 1);

    h.engine
        .on_join_request(&join_request(7, Some("rust")))
        .await
        .unwrap();
    assert_eq!(h.engine.admission().attempts(GROUP, 7), 0);

    let decision = h
        .engine
        .on_join_request(&join_request(7, None))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(decision.verdict, Verdict::Defer);
}

#[tokio::test]
async fn test_reject_keyword_blacklists() {
    let h = harness(review_config()).await;

    let decision = h
        .engine
        .on_join_request(&join_request(7, Some("Casino deals")))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(decision.verdict, Verdict::Reject);
    assert!(decision.blacklisted);
    assert!(h.engine.config().get(GROUP).await.unwrap().is_blocked(7));
}

#[tokio::test]
async fn test_deferred_request_only_sends_notice() {
    let h = harness(review_config()).await;

    let decision = h
        .engine
        .on_join_request(&join_request(7, None))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(decision.verdict, Verdict::Defer);
    assert!(answers(&h.platform.actions()).is_empty());
    assert_eq!(h.platform.said().len(), 1);
}

#[tokio::test]
async fn test_join_review_off_leaves_request_alone() {
    let h = harness(GroupConfig {
        join_review: false,
        ..review_config()
    })
    .await;

    let decision = h
        .engine
        .on_join_request(&join_request(7, Some("rust")))
        .await
        .unwrap();

    assert!(decision.is_none());
    assert!(h.platform.actions().is_empty());
}

#[tokio::test]
async fn test_admin_audit_goes_to_owners() {
    let h = harness(GroupConfig {
        admin_audit: true,
        ..review_config()
    })
    .await;
    let engine = h.engine.with_owners(vec![500, 501]);

    engine
        .on_join_request(&join_request(7, Some("rust")))
        .await
        .unwrap();

    let whispers: Vec<u64> = h
        .platform
        .actions()
        .iter()
        .filter_map(|a| match a {
            Action::Whisper { user, .. } => Some(*user),
            _ => None,
        })
        .collect();
    assert_eq!(whispers, vec![500, 501, 500, 501]);
    assert!(h.platform.said().is_empty());
}

#[tokio::test]
async fn test_leaver_is_rejected_on_rejoin() {
    let h = harness(GroupConfig {
        leave_block: true,
        ..review_config()
    })
    .await;

    h.engine
        .on_member_left(MemberEvent {
            group_id: GROUP,
            user_id: 7,
        })
        .await
        .unwrap();
    assert_eq!(h.platform.said(), vec!["user7 (7) left the group, blacklisted".to_string()]);

    let decision = h
        .engine
        .on_join_request(&join_request(7, Some("rust rust rust")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(decision.verdict, Verdict::Reject);
    assert_eq!(decision.reason, "blacklisted user");
}

#[tokio::test]
async fn test_leave_block_needs_leave_notify() {
    let h = harness(GroupConfig {
        leave_notify: false,
        leave_block: true,
        ..review_config()
    })
    .await;

    h.engine
        .on_member_left(MemberEvent {
            group_id: GROUP,
            user_id: 7,
        })
        .await
        .unwrap();

    assert!(h.platform.actions().is_empty());
    assert!(!h.engine.config().get(GROUP).await.unwrap().is_blocked(7));
}

#[tokio::test]
async fn test_arrival_gets_welcome_and_mute() {
    let h = harness(GroupConfig {
        welcome_template: "Welcome {nickname}!".into(),
        join_mute_secs: 120,
        ..Default::default()
    })
    .await;

    h.engine
        .on_member_joined(MemberEvent {
            group_id: GROUP,
            user_id: 7,
        })
        .await
        .unwrap();

    assert_eq!(
        h.platform.actions(),
        vec![
            Action::Say {
                group: GROUP,
                text: "Welcome user7!".into()
            },
            Action::Mute {
                group: GROUP,
                user: 7,
                secs: 120
            },
        ]
    );
}
