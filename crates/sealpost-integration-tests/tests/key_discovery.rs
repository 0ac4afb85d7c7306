//! Integration test: finding keys for people who are not registered yet.
//!
//! A search for an unknown email consults the external directory, answers
//! right away and registers the person in the background. Racing searches,
//! even from separate processes on one store, must register the person
//! exactly once.

use std::sync::Arc;
use std::time::Duration;

use sealpost_db::queries::{people, public_keys};
use sealpost_engine::{EngineError, KeySearch, ProvisionStats};
use sealpost_integration_tests::{candidate, sample_key, sign_up, Board, SlowDirectory};

const DANA: &str = "dana@example.org";

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_searches_register_one_person() {
    let board = Board::new();
    let setup = board.engine();
    let alice = sign_up(&setup, &board.mailer, "alice@example.org", 1).await;
    let bob = sign_up(&setup, &board.mailer, "bob@example.org", 2).await;

    // Slow enough that both searches miss the local store.
    let directory = Arc::new(
        SlowDirectory::new()
            .with_entry(DANA, vec![candidate(40)])
            .with_delay(Duration::from_millis(100)),
    );
    let first = Arc::new(board.engine_with(directory.clone(), |_| {}));
    let second = Arc::new(board.engine_with(directory.clone(), |_| {}));

    let a = {
        let engine = first.clone();
        tokio::spawn(async move { engine.search_keys(alice, DANA).await })
    };
    let b = {
        let engine = second.clone();
        tokio::spawn(async move { engine.search_keys(bob, DANA).await })
    };

    for result in [a.await.expect("join"), b.await.expect("join")] {
        let found = result.expect("search never fails on a race");
        assert!(matches!(found, KeySearch::Directory(_)));
        assert_eq!(found.armored(), vec![sample_key(40).as_str()]);
    }
    assert_eq!(directory.calls(), 2);

    let one = first.shutdown().await;
    let two = second.shutdown().await;
    let total = ProvisionStats {
        created: one.created + two.created,
        duplicates: one.duplicates + two.duplicates,
        failed: one.failed + two.failed,
    };
    assert_eq!(
        total,
        ProvisionStats {
            created: 1,
            duplicates: 1,
            failed: 0
        }
    );

    let conn = board.database().connect().expect("connect");
    let dana = people::find_by_email(&conn, DANA)
        .expect("lookup")
        .expect("registered");
    assert!(!dana.verified);
    let keys = public_keys::list_for_person(&conn, dana.id).expect("keys");
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].source.as_deref(), Some("https://keys.example"));
}

#[tokio::test]
async fn registered_people_are_answered_locally() {
    let board = Board::new();
    let directory = Arc::new(SlowDirectory::new().with_entry(DANA, vec![candidate(40)]));
    let engine = board.engine_with(directory.clone(), |_| {});
    let alice = sign_up(&engine, &board.mailer, "alice@example.org", 1).await;

    let found = engine.search_keys(alice, DANA).await.expect("first search");
    assert!(matches!(found, KeySearch::Directory(_)));
    assert_eq!(engine.shutdown().await.created, 1);

    let engine = board.engine_with(directory.clone(), |_| {});
    let found = engine.search_keys(alice, "Dana@Example.org").await.expect("second search");
    match found {
        KeySearch::Local { person, keys } => {
            assert_eq!(person.email, DANA);
            assert_eq!(keys.len(), 1);
        }
        other => unreachable!("expected a local answer, got {other:?}"),
    }
    assert_eq!(directory.calls(), 1);
}

#[tokio::test]
async fn directory_outage_creates_nothing() {
    let board = Board::new();
    let directory = Arc::new(SlowDirectory::new().failing());
    let engine = board.engine_with(directory, |_| {});
    let alice = sign_up(&engine, &board.mailer, "alice@example.org", 1).await;

    assert!(matches!(
        engine.search_keys(alice, DANA).await,
        Err(EngineError::Transport(_))
    ));
    assert_eq!(engine.shutdown().await, ProvisionStats::default());

    let conn = board.database().connect().expect("connect");
    assert!(people::find_by_email(&conn, DANA).expect("lookup").is_none());
}

#[tokio::test]
async fn provisioned_person_can_sign_in() {
    let board = Board::new();
    let directory = Arc::new(SlowDirectory::new().with_entry(DANA, vec![candidate(40)]));
    let engine = board.engine_with(directory.clone(), |_| {});
    let alice = sign_up(&engine, &board.mailer, "alice@example.org", 1).await;

    engine.search_keys(alice, DANA).await.expect("search");
    engine.shutdown().await;

    let engine = board.engine_with(directory, |_| {});
    let created = engine.request_session(DANA).await.expect("session for dana");
    let envelope = board.mailer.last_envelope_for(DANA).expect("mailed");
    assert_eq!(envelope, created.envelope);
}
