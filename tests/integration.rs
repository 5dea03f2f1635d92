//! Integration tests for the ledger.

use social_ledger::{
    ActionOutcome, ErrorKind, Identity, Ledger, LedgerConfig, LedgerEvent, Notification,
    NotificationKind, PostId, ReactionState, Sequence, SubscriptionConfig, SubscriptionFilter,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const PICTURE_URL: &str = "https://gateway.example/ipfs/QmRSZrGXfsu7dsboestCcf1mFy7FS3owbSoxZn81HCNiw8";

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn test_ledger(dir: &TempDir) -> Ledger {
    init_tracing();
    Ledger::create(LedgerConfig::at(dir.path().join("ledger"))).unwrap()
}

fn owner() -> Identity {
    Identity::new("0x00000000000000000000000000000000000000a1")
}

fn like_count(ledger: &Ledger, post_id: PostId) -> u64 {
    ledger.post(post_id).unwrap().like_count
}

fn dislike_count(ledger: &Ledger, post_id: PostId) -> u64 {
    ledger.post(post_id).unwrap().dislike_count
}

// --- Reference Scenarios ---

#[test]
fn test_create_account_scenario() {
    let dir = TempDir::new().unwrap();
    let ledger = test_ledger(&dir);

    let receipt = ledger
        .create_account(&owner(), "test_username", "This is a test biography", PICTURE_URL)
        .unwrap();
    assert_eq!(ledger.user_count(), 1);
    assert_eq!(
        receipt.record.notification,
        Notification::AccountCreated {
            identity: owner(),
            username: "test_username".into(),
            biography: "This is a test biography".into(),
            profile_picture_url: PICTURE_URL.into(),
        }
    );

    let err = ledger
        .create_account(&owner(), "", "This is a test biography", PICTURE_URL)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(ledger.user_count(), 1);
}

#[test]
fn test_edit_profile_scenario() {
    let dir = TempDir::new().unwrap();
    let ledger = test_ledger(&dir);
    ledger.create_account(&owner(), "test_username", "bio", PICTURE_URL).unwrap();

    let receipt = ledger
        .edit_profile(
            &owner(),
            &owner(),
            "updated_username",
            "This is an updated biography",
            PICTURE_URL,
        )
        .unwrap();
    assert_eq!(receipt.outcome, ActionOutcome::ProfileUpdated);
    assert_eq!(receipt.record.notification.kind(), NotificationKind::ProfileUpdated);

    let profile = ledger.profile(&owner()).unwrap();
    assert_eq!(profile.username, "updated_username");
    assert_eq!(profile.biography, "This is an updated biography");
    assert_eq!(ledger.user_count(), 1);

    let err = ledger
        .edit_profile(&owner(), &owner(), "", "bio", PICTURE_URL)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(ledger.profile(&owner()).unwrap().username, "updated_username");
}

#[test]
fn test_post_reaction_scenario() {
    let dir = TempDir::new().unwrap();
    let ledger = test_ledger(&dir);
    ledger.create_account(&owner(), "test_username", "", PICTURE_URL).unwrap();

    let receipt = ledger
        .create_post(&owner(), "test_post_description", PICTURE_URL, "Image")
        .unwrap();
    assert_eq!(receipt.outcome, ActionOutcome::PostCreated { post_id: PostId(1) });
    assert_eq!(ledger.post_count(), 1);

    let err = ledger.create_post(&owner(), "", PICTURE_URL, "Image").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(ledger.post_count(), 1);

    let liked = ledger.like_post(&owner(), PostId(1)).unwrap();
    assert_eq!(
        liked.record.notification,
        Notification::PostLiked {
            identity: owner(),
            post_id: PostId(1),
            like_count: 1,
        }
    );

    let unliked = ledger.unlike_post(&owner(), PostId(1)).unwrap();
    assert_eq!(
        unliked.record.notification,
        Notification::PostUnliked {
            identity: owner(),
            post_id: PostId(1),
            like_count: 0,
        }
    );

    let err = ledger.unlike_post(&owner(), PostId(1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    let disliked = ledger.dislike_post(&owner(), PostId(1)).unwrap();
    assert_eq!(
        disliked.outcome,
        ActionOutcome::Reacted {
            post_id: PostId(1),
            like_count: 0,
            dislike_count: 1,
        }
    );

    let undisliked = ledger.undislike_post(&owner(), PostId(1)).unwrap();
    assert_eq!(
        undisliked.record.notification,
        Notification::PostUndisliked {
            identity: owner(),
            post_id: PostId(1),
            dislike_count: 0,
        }
    );
    assert_eq!(dislike_count(&ledger, PostId(1)), 0);
}

// --- Toggle Properties ---

#[test]
fn test_like_is_idempotent() {
    let ledger = Ledger::in_memory();
    ledger.create_account(&owner(), "owner", "", "").unwrap();
    ledger.create_post(&owner(), "post", "", "Image").unwrap();

    ledger.like_post(&owner(), PostId(1)).unwrap();
    let second = ledger.like_post(&owner(), PostId(1)).unwrap();

    assert_eq!(like_count(&ledger, PostId(1)), 1);
    // The repeat still emits, reflecting current counts.
    assert_eq!(second.record.sequence, Sequence(4));
    assert!(matches!(
        second.record.notification,
        Notification::PostLiked { like_count: 1, .. }
    ));
}

#[test]
fn test_cross_toggle_between_identities() {
    let ledger = Ledger::in_memory();
    let alice = Identity::new("alice");
    let bob = Identity::new("bob");
    ledger.create_account(&alice, "alice", "", "").unwrap();
    ledger.create_account(&bob, "bob", "", "").unwrap();
    ledger.create_post(&alice, "post", "", "Image").unwrap();

    ledger.like_post(&alice, PostId(1)).unwrap();
    ledger.like_post(&bob, PostId(1)).unwrap();
    assert_eq!(like_count(&ledger, PostId(1)), 2);

    ledger.dislike_post(&bob, PostId(1)).unwrap();
    assert_eq!(like_count(&ledger, PostId(1)), 1);
    assert_eq!(dislike_count(&ledger, PostId(1)), 1);
    assert_eq!(ledger.reaction(PostId(1), &alice), ReactionState::Liked);
    assert_eq!(ledger.reaction(PostId(1), &bob), ReactionState::Disliked);

    ledger.like_post(&bob, PostId(1)).unwrap();
    assert_eq!(like_count(&ledger, PostId(1)), 2);
    assert_eq!(dislike_count(&ledger, PostId(1)), 0);
}

// --- Persistence ---

#[test]
fn test_reopen_replays_journal() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger");

    let digest = {
        let ledger = Ledger::create(LedgerConfig::at(&path)).unwrap();
        ledger.create_account(&owner(), "owner", "", "").unwrap();
        ledger.create_post(&owner(), "one", "", "Image").unwrap();
        ledger.create_post(&owner(), "two", "", "Video").unwrap();
        ledger.dislike_post(&owner(), PostId(2)).unwrap();
        ledger.sync().unwrap();
        ledger.state_digest().unwrap()
    };

    let ledger = Ledger::open_or_create(LedgerConfig::at(&path)).unwrap();
    assert_eq!(ledger.state_digest().unwrap(), digest);
    assert_eq!(ledger.post_count(), 2);
    assert_eq!(ledger.head(), Sequence(4));
    assert_eq!(ledger.posts_by(&owner()), vec![PostId(1), PostId(2)]);

    // IDs continue from the replayed counter.
    let receipt = ledger.create_post(&owner(), "three", "", "Image").unwrap();
    assert_eq!(receipt.outcome, ActionOutcome::PostCreated { post_id: PostId(3) });
    assert_eq!(receipt.record.sequence, Sequence(5));
}

#[test]
fn test_create_on_existing_ledger_keeps_state() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger");

    {
        let ledger = Ledger::create(LedgerConfig::at(&path)).unwrap();
        ledger.create_account(&owner(), "owner", "", "").unwrap();
    }

    let ledger = Ledger::create(LedgerConfig::at(&path)).unwrap();
    assert_eq!(ledger.user_count(), 1);
    assert_eq!(ledger.head(), Sequence(1));
}

#[test]
fn test_stats() {
    let dir = TempDir::new().unwrap();
    let ledger = test_ledger(&dir);
    ledger.create_account(&owner(), "owner", "", "").unwrap();
    ledger.create_post(&owner(), "post", "", "Image").unwrap();
    ledger.like_post(&owner(), PostId(1)).unwrap();

    let stats = ledger.stats();
    assert_eq!(stats.user_count, 1);
    assert_eq!(stats.post_count, 1);
    assert_eq!(stats.profile_count, 1);
    assert_eq!(stats.reaction_count, 1);
    assert_eq!(stats.notification_count, 3);
    assert!(stats.journal_size_bytes > 0);
}

// --- Subscriptions ---

#[test]
fn test_subscription_catch_up_then_live() {
    let ledger = Ledger::in_memory();
    ledger.create_account(&owner(), "owner", "", "").unwrap();
    ledger.create_post(&owner(), "post", "", "Image").unwrap();

    let handle = ledger.subscribe(SubscriptionConfig::from_start()).unwrap();
    ledger.like_post(&owner(), PostId(1)).unwrap();

    let mut sequences = Vec::new();
    let mut saw_caught_up_after = None;
    while let Ok(event) = handle.recv_timeout(Duration::from_millis(100)) {
        match event {
            LedgerEvent::Notification { record } => sequences.push(record.sequence.0),
            LedgerEvent::CaughtUp => saw_caught_up_after = Some(sequences.len()),
            LedgerEvent::Dropped { .. } => panic!("unexpected drop"),
        }
    }

    assert_eq!(sequences, vec![1, 2, 3]);
    assert_eq!(saw_caught_up_after, Some(2));
}

#[test]
fn test_post_filtered_subscription() {
    let ledger = Ledger::in_memory();
    ledger.create_account(&owner(), "owner", "", "").unwrap();
    ledger.create_post(&owner(), "one", "", "Image").unwrap();
    ledger.create_post(&owner(), "two", "", "Image").unwrap();

    let handle = ledger
        .subscribe(SubscriptionConfig {
            filter: SubscriptionFilter::post(PostId(2)),
            ..Default::default()
        })
        .unwrap();
    assert!(matches!(handle.recv().unwrap(), LedgerEvent::CaughtUp));

    ledger.like_post(&owner(), PostId(1)).unwrap();
    ledger.like_post(&owner(), PostId(2)).unwrap();

    let received = handle.drain_notifications();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].notification.post_id(), Some(PostId(2)));

    ledger.unsubscribe(handle.id);
    assert_eq!(ledger.subscription_count(), 0);
}

#[test]
fn test_rejected_action_is_not_broadcast() {
    let ledger = Ledger::in_memory();
    let handle = ledger.subscribe(SubscriptionConfig::default()).unwrap();
    handle.recv().unwrap();

    assert!(ledger.create_post(&owner(), "orphan", "", "Image").is_err());
    assert!(handle.drain_notifications().is_empty());
}

// --- Concurrency ---

#[test]
fn test_concurrent_likes_are_serialized() {
    let ledger = Arc::new(Ledger::in_memory());
    ledger.create_account(&owner(), "owner", "", "").unwrap();
    ledger.create_post(&owner(), "popular", "", "Image").unwrap();

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                let fan = Identity::new(format!("fan{}", i));
                ledger.create_account(&fan, &format!("fan{}", i), "", "").unwrap();
                for _ in 0..10 {
                    ledger.like_post(&fan, PostId(1)).unwrap();
                    ledger.dislike_post(&fan, PostId(1)).unwrap();
                }
                ledger.like_post(&fan, PostId(1)).unwrap();
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(like_count(&ledger, PostId(1)), 8);
    assert_eq!(dislike_count(&ledger, PostId(1)), 0);
    assert_eq!(ledger.user_count(), 9);

    let sequences: Vec<u64> = ledger
        .notifications_from(Sequence(1))
        .unwrap()
        .iter()
        .map(|r| r.sequence.0)
        .collect();
    assert_eq!(sequences, (1..=ledger.head().0).collect::<Vec<_>>());
}
