use axum::extract::ws::Message;
use bson::oid::ObjectId;
use futures::SinkExt;
use huddle_services::EngineError;
use tracing::{debug, warn};

use super::registry::{WsRegistry, WsSender};

async fn send_text(sender: &WsSender, text: String) -> bool {
    let mut guard = sender.lock().await;
    match guard.send(Message::text(text)).await {
        Ok(()) => true,
        Err(e) => {
            warn!(%e, "Failed to send WS message");
            false
        }
    }
}

/// Fans a JSON event out to every connection joined to the room,
/// optionally excluding the originating connection (no self-echo).
pub async fn broadcast_to_room(
    registry: &WsRegistry,
    room_id: &ObjectId,
    except: Option<&str>,
    message: &serde_json::Value,
) {
    let text = serde_json::to_string(message).unwrap_or_default();
    let senders = registry.room_senders(room_id, except);
    debug!(room_id = %room_id.to_hex(), targets = senders.len(), "Room broadcast");
    for sender in senders {
        send_text(&sender, text.clone()).await;
    }
}

/// Delivers to every connection of one identity (targeted signaling).
pub async fn send_to_user(
    registry: &WsRegistry,
    user_id: &ObjectId,
    message: &serde_json::Value,
) {
    let text = serde_json::to_string(message).unwrap_or_default();
    for sender in registry.user_senders(user_id) {
        send_text(&sender, text.clone()).await;
    }
}

/// Delivers to a single connection; used for acks, snapshots and
/// error events that must only reach the acting tab.
pub async fn send_to_connection(
    registry: &WsRegistry,
    connection_id: &str,
    message: &serde_json::Value,
) {
    if let Some(sender) = registry.sender_of(connection_id) {
        let text = serde_json::to_string(message).unwrap_or_default();
        send_text(&sender, text).await;
    }
}

/// Errors go to the requester only and are never broadcast.
pub async fn send_error(registry: &WsRegistry, connection_id: &str, err: &EngineError) {
    let message = serde_json::json!({
        "type": "error",
        "data": {
            "code": err.code(),
            "message": err.to_string(),
        }
    });
    send_to_connection(registry, connection_id, &message).await;
}
