use huddle_db::models::RoomType;
use huddle_services::EngineError;
use huddle_services::whiteboard::StrokeData;

use crate::fixtures::engine::{TestEngine, identity, room};

fn stroke(kind: &str) -> StrokeData {
    StrokeData {
        kind: kind.to_string(),
        points: serde_json::json!([[0, 0], [10, 10]]),
        style: serde_json::json!({ "color": "#000", "width": 2 }),
    }
}

#[tokio::test]
async fn strokes_replay_in_append_order() {
    let engine = TestEngine::new();
    let board = room(RoomType::Whiteboard);
    let room_id = board.id.unwrap();
    let alice = identity("alice");
    let bob = identity("bob");

    engine.whiteboard.append_stroke(&room_id, &alice, stroke("freehand")).await.unwrap();
    engine.whiteboard.append_stroke(&room_id, &bob, stroke("line")).await.unwrap();
    engine.whiteboard.append_stroke(&room_id, &alice, stroke("rect")).await.unwrap();

    let replay = engine.whiteboard.strokes(&room_id).await.unwrap();
    let kinds: Vec<&str> = replay.iter().map(|s| s.kind.as_str()).collect();
    assert_eq!(kinds, vec!["freehand", "line", "rect"]);
    assert_eq!(replay[1].user_id, bob.user_id);
}

#[tokio::test]
async fn clear_is_organizer_only() {
    let engine = TestEngine::new();
    let board = room(RoomType::Whiteboard);
    let room_id = board.id.unwrap();
    let organizer = identity("organizer");
    let attendee = identity("attendee");
    engine.membership.add_organizer(organizer.user_id, board.event_id);
    engine.membership.add_ticket(attendee.user_id, board.event_id);

    engine.whiteboard.append_stroke(&room_id, &attendee, stroke("freehand")).await.unwrap();

    let err = engine
        .whiteboard
        .clear_board(&board, &attendee.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PermissionDenied(_)));
    assert_eq!(engine.whiteboard.strokes(&room_id).await.unwrap().len(), 1);

    engine.whiteboard.clear_board(&board, &organizer.user_id).await.unwrap();
    assert!(engine.whiteboard.strokes(&room_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn strokes_after_clear_start_a_fresh_log() {
    let engine = TestEngine::new();
    let board = room(RoomType::Whiteboard);
    let room_id = board.id.unwrap();
    let organizer = identity("organizer");
    engine.membership.add_organizer(organizer.user_id, board.event_id);

    engine.whiteboard.append_stroke(&room_id, &organizer, stroke("freehand")).await.unwrap();
    engine.whiteboard.append_stroke(&room_id, &organizer, stroke("line")).await.unwrap();
    engine.whiteboard.clear_board(&board, &organizer.user_id).await.unwrap();
    engine.whiteboard.append_stroke(&room_id, &organizer, stroke("ellipse")).await.unwrap();

    let replay = engine.whiteboard.strokes(&room_id).await.unwrap();
    assert_eq!(replay.len(), 1);
    assert_eq!(replay[0].kind, "ellipse");
}

#[tokio::test]
async fn snapshot_counts_current_strokes() {
    let engine = TestEngine::new();
    let board = room(RoomType::Whiteboard);
    let room_id = board.id.unwrap();
    let alice = identity("alice");

    engine.whiteboard.append_stroke(&room_id, &alice, stroke("freehand")).await.unwrap();
    engine.whiteboard.append_stroke(&room_id, &alice, stroke("line")).await.unwrap();

    let snapshot = engine.whiteboard.save_snapshot(&room_id, &alice.user_id).await.unwrap();
    assert_eq!(snapshot.stroke_count, 2);
    assert_eq!(snapshot.saved_by, alice.user_id);
}
