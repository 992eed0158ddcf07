//! Key layout for the shared state backend. Everything belonging to a
//! room hangs off the `room:{id}` prefix so deactivation can clear it
//! in one sweep.

use bson::oid::ObjectId;

pub fn room_prefix(room_id: &ObjectId) -> String {
    format!("room:{}", room_id.to_hex())
}

pub fn participants(room_id: &ObjectId) -> String {
    format!("room:{}:participants", room_id.to_hex())
}

pub fn participant(room_id: &ObjectId, user_id: &ObjectId) -> String {
    format!("room:{}:participant:{}", room_id.to_hex(), user_id.to_hex())
}

pub fn message_cache(room_id: &ObjectId) -> String {
    format!("room:{}:messages", room_id.to_hex())
}

pub fn strokes(room_id: &ObjectId) -> String {
    format!("room:{}:strokes", room_id.to_hex())
}

pub fn stroke_seq(room_id: &ObjectId) -> String {
    format!("room:{}:strokes:seq", room_id.to_hex())
}

pub fn board_snapshots(room_id: &ObjectId) -> String {
    format!("room:{}:board_snapshots", room_id.to_hex())
}

pub fn documents(room_id: &ObjectId) -> String {
    format!("room:{}:documents", room_id.to_hex())
}

pub fn document(room_id: &ObjectId, doc_id: &ObjectId) -> String {
    format!("room:{}:document:{}", room_id.to_hex(), doc_id.to_hex())
}

pub fn cursor(room_id: &ObjectId, doc_id: &ObjectId, user_id: &ObjectId) -> String {
    format!(
        "room:{}:cursor:{}:{}",
        room_id.to_hex(),
        doc_id.to_hex(),
        user_id.to_hex()
    )
}

pub fn cursor_index(room_id: &ObjectId, doc_id: &ObjectId) -> String {
    format!("room:{}:cursor_index:{}", room_id.to_hex(), doc_id.to_hex())
}

pub fn video_session(room_id: &ObjectId) -> String {
    format!("room:{}:video", room_id.to_hex())
}
