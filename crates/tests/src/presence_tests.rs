use bson::oid::ObjectId;
use std::time::Duration;

use crate::fixtures::engine::{TestEngine, identity};

#[tokio::test]
async fn join_is_deduplicated_per_user() {
    let engine = TestEngine::new();
    let room_id = ObjectId::new();
    let alice = identity("alice");

    // Same identity arriving over a second connection.
    assert!(engine.presence.join(&room_id, &alice).await.unwrap());
    assert!(!engine.presence.join(&room_id, &alice).await.unwrap());

    let participants = engine.presence.participants(&room_id).await.unwrap();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0].user_id, alice.user_id);
    assert_eq!(participants[0].display_name, "alice");
}

#[tokio::test]
async fn leave_is_idempotent() {
    let engine = TestEngine::new();
    let room_id = ObjectId::new();
    let bob = identity("bob");

    // Leaving a room the user never joined is a quiet no-op.
    assert!(!engine.presence.leave(&room_id, &bob.user_id).await.unwrap());

    engine.presence.join(&room_id, &bob).await.unwrap();
    assert!(engine.presence.leave(&room_id, &bob.user_id).await.unwrap());
    assert!(!engine.presence.leave(&room_id, &bob.user_id).await.unwrap());

    assert!(engine.presence.participants(&room_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn participants_ordered_by_join_time() {
    let engine = TestEngine::new();
    let room_id = ObjectId::new();
    let first = identity("first");
    let second = identity("second");

    engine.presence.join(&room_id, &first).await.unwrap();
    tokio::time::sleep(Duration::from_millis(25)).await;
    engine.presence.join(&room_id, &second).await.unwrap();

    let participants = engine.presence.participants(&room_id).await.unwrap();
    let names: Vec<&str> = participants.iter().map(|p| p.display_name.as_str()).collect();
    assert_eq!(names, vec!["first", "second"]);
}

#[tokio::test]
async fn rooms_are_isolated() {
    let engine = TestEngine::new();
    let room_a = ObjectId::new();
    let room_b = ObjectId::new();
    let carol = identity("carol");

    engine.presence.join(&room_a, &carol).await.unwrap();

    assert_eq!(engine.presence.participants(&room_a).await.unwrap().len(), 1);
    assert!(engine.presence.participants(&room_b).await.unwrap().is_empty());
}
