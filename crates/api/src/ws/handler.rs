use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bson::oid::ObjectId;
use futures::{SinkExt, StreamExt};
use huddle_db::models::{Room, RoomType};
use huddle_services::EngineError;
use huddle_services::auth::Identity;
use huddle_services::whiteboard::StrokeData;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::dispatcher;
use super::events::ClientEvent;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = match state.auth.verify_access_token(&params.token) {
        Ok(identity) => identity,
        Err(_) => {
            return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

async fn handle_socket(socket: WebSocket, state: AppState, identity: Identity) {
    let connection_id = Uuid::new_v4().to_string();
    info!(user_id = %identity.user_id.to_hex(), %connection_id, "WebSocket connected");

    let (sender, mut receiver) = socket.split();
    let sender = Arc::new(Mutex::new(sender));

    state
        .registry
        .add(identity.user_id, connection_id.clone(), sender.clone());

    {
        let msg = serde_json::json!({
            "type": "connected",
            "data": {
                "user_id": identity.user_id.to_hex(),
                "connection_id": connection_id,
            }
        });
        let mut guard = sender.lock().await;
        let _ = guard
            .send(Message::text(serde_json::to_string(&msg).unwrap_or_default()))
            .await;
    }

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_client_message(&state, &identity, &connection_id, &text).await;
            }
            Ok(Message::Ping(data)) => {
                let mut guard = sender.lock().await;
                let _ = guard.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => {
                break;
            }
            Err(e) => {
                warn!(user_id = %identity.user_id.to_hex(), %connection_id, %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    // Abrupt or orderly, a closed socket is an implicit leave for
    // every room this connection was in.
    if let Some(dropped) = state.registry.drop_connection(&connection_id) {
        for (room_id, last_for_user) in dropped.rooms {
            if last_for_user {
                finish_leave(&state, &identity, &room_id).await;
            }
        }
    }

    info!(user_id = %identity.user_id.to_hex(), %connection_id, "WebSocket disconnected");
}

/// Removes the participant and tells the remaining members. Only
/// reached when the identity's last connection left the room.
async fn finish_leave(state: &AppState, identity: &Identity, room_id: &ObjectId) {
    match state.presence.leave(room_id, &identity.user_id).await {
        Ok(true) => {
            let event = serde_json::json!({
                "type": "user_left",
                "data": {
                    "room_id": room_id.to_hex(),
                    "user_id": identity.user_id.to_hex(),
                    "username": identity.display_name,
                }
            });
            dispatcher::broadcast_to_room(&state.registry, room_id, None, &event).await;
        }
        Ok(false) => {}
        Err(e) => {
            warn!(room_id = %room_id.to_hex(), %e, "Failed to remove participant");
        }
    }
}

async fn handle_client_message(
    state: &AppState,
    identity: &Identity,
    connection_id: &str,
    text: &str,
) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            let err = EngineError::Validation(format!("malformed event: {e}"));
            dispatcher::send_error(&state.registry, connection_id, &err).await;
            return;
        }
    };

    debug!(user_id = %identity.user_id.to_hex(), %connection_id, "WS event received");

    let result = route_event(state, identity, connection_id, event).await;
    if let Err(err) = result {
        // The acting client hears about the failure; nobody else does.
        dispatcher::send_error(&state.registry, connection_id, &err).await;
    }
}

async fn route_event(
    state: &AppState,
    identity: &Identity,
    connection_id: &str,
    event: ClientEvent,
) -> Result<(), EngineError> {
    match event {
        ClientEvent::JoinRoom { room_id } => {
            handle_join(state, identity, connection_id, &room_id).await
        }
        ClientEvent::LeaveRoom { room_id } => {
            handle_leave(state, identity, connection_id, &room_id).await
        }
        ClientEvent::ChatMessage {
            room_id,
            message,
            message_type,
        } => handle_chat(state, identity, connection_id, &room_id, &message, &message_type).await,
        ClientEvent::WhiteboardStroke {
            room_id,
            stroke_data,
        } => handle_stroke(state, identity, connection_id, &room_id, stroke_data).await,
        ClientEvent::WhiteboardClear { room_id } => {
            handle_board_clear(state, identity, connection_id, &room_id).await
        }
        ClientEvent::WhiteboardSnapshot { room_id } => {
            handle_board_snapshot(state, identity, connection_id, &room_id).await
        }
        ClientEvent::CodeDocumentCreate {
            room_id,
            filename,
            language,
        } => handle_doc_create(state, identity, connection_id, &room_id, &filename, &language).await,
        ClientEvent::CodeContentChange {
            room_id,
            document_id,
            content,
            cursor_position,
        } => {
            handle_content_change(
                state,
                identity,
                connection_id,
                &room_id,
                &document_id,
                &content,
                cursor_position,
            )
            .await
        }
        ClientEvent::CursorPosition {
            room_id,
            document_id,
            position,
        } => handle_cursor(state, identity, connection_id, &room_id, &document_id, position).await,
        ClientEvent::CodeRun {
            room_id,
            document_id,
        } => handle_code_run(state, identity, connection_id, &room_id, &document_id).await,
        ClientEvent::VideoBootstrap { room_id } => {
            handle_video_bootstrap(state, identity, connection_id, &room_id).await
        }
        ClientEvent::VideoSignal {
            room_id,
            target_user_id,
            signal_type,
            data,
        } => {
            handle_video_signal(
                state,
                identity,
                connection_id,
                &room_id,
                target_user_id.as_deref(),
                &signal_type,
                data,
            )
            .await
        }
        ClientEvent::TypingIndicator {
            room_id,
            is_typing,
        } => handle_typing(state, identity, connection_id, &room_id, is_typing).await,
        ClientEvent::PresenceUpdate { room_id, status } => {
            handle_presence_update(state, identity, connection_id, &room_id, &status).await
        }
        ClientEvent::Ping => {
            let pong = serde_json::json!({ "type": "pong" });
            dispatcher::send_to_connection(&state.registry, connection_id, &pong).await;
            Ok(())
        }
    }
}

fn parse_oid(value: &str, what: &str) -> Result<ObjectId, EngineError> {
    ObjectId::parse_str(value).map_err(|_| EngineError::Validation(format!("invalid {what}")))
}

/// Every room-scoped event except `join_room` requires the connection
/// to have joined first.
fn require_joined(state: &AppState, connection_id: &str, room_id: &ObjectId) -> Result<(), EngineError> {
    if state.registry.is_joined(connection_id, room_id) {
        Ok(())
    } else {
        Err(EngineError::PermissionDenied(
            "join the room before sending events to it".to_string(),
        ))
    }
}

async fn handle_join(
    state: &AppState,
    identity: &Identity,
    connection_id: &str,
    room_id: &str,
) -> Result<(), EngineError> {
    let rid = parse_oid(room_id, "room_id")?;
    let room = state.directory.get_active_room(&rid).await?;
    state.directory.check_permission(&room, &identity.user_id).await?;

    let Some(outcome) = state.registry.join_room(connection_id, rid) else {
        return Err(EngineError::Internal("connection no longer registered".to_string()));
    };

    if outcome.first_for_user {
        state.presence.join(&rid, identity).await?;
        let event = serde_json::json!({
            "type": "user_joined",
            "data": {
                "room_id": rid.to_hex(),
                "user_id": identity.user_id.to_hex(),
                "username": identity.display_name,
            }
        });
        dispatcher::broadcast_to_room(&state.registry, &rid, Some(connection_id), &event).await;
    }

    // The joining connection always gets a fresh full snapshot, even
    // on rejoin; a reconnecting client resyncs this way instead of
    // replaying missed events.
    let snapshot = room_snapshot(state, &room).await?;
    dispatcher::send_to_connection(&state.registry, connection_id, &snapshot).await;
    Ok(())
}

async fn handle_leave(
    state: &AppState,
    identity: &Identity,
    connection_id: &str,
    room_id: &str,
) -> Result<(), EngineError> {
    let rid = parse_oid(room_id, "room_id")?;
    let outcome = state.registry.leave_room(connection_id, rid);

    // Leaving a room this connection never joined is a silent no-op.
    if outcome.was_joined && outcome.last_for_user {
        finish_leave(state, identity, &rid).await;
    }

    let ack = serde_json::json!({
        "type": "ack",
        "data": { "op": "leave_room", "room_id": rid.to_hex() }
    });
    dispatcher::send_to_connection(&state.registry, connection_id, &ack).await;
    Ok(())
}

async fn handle_chat(
    state: &AppState,
    identity: &Identity,
    connection_id: &str,
    room_id: &str,
    message: &str,
    message_type: &str,
) -> Result<(), EngineError> {
    let rid = parse_oid(room_id, "room_id")?;
    require_joined(state, connection_id, &rid)?;

    let sent = state
        .messaging
        .send_message(&rid, identity, message, message_type)
        .await?;

    let event = serde_json::json!({
        "type": "chat_message",
        "data": {
            "id": sent.id,
            "room_id": rid.to_hex(),
            "user_id": identity.user_id.to_hex(),
            "username": identity.display_name,
            "message": message,
            "message_type": message_type,
            "timestamp": sent.timestamp,
        }
    });
    dispatcher::broadcast_to_room(&state.registry, &rid, Some(connection_id), &event).await;

    let ack = serde_json::json!({
        "type": "ack",
        "data": { "op": "chat_message", "id": sent.id, "timestamp": sent.timestamp }
    });
    dispatcher::send_to_connection(&state.registry, connection_id, &ack).await;
    Ok(())
}

async fn handle_stroke(
    state: &AppState,
    identity: &Identity,
    connection_id: &str,
    room_id: &str,
    stroke_data: StrokeData,
) -> Result<(), EngineError> {
    let rid = parse_oid(room_id, "room_id")?;
    require_joined(state, connection_id, &rid)?;

    let stroke = state.whiteboard.append_stroke(&rid, identity, stroke_data).await?;

    let event = serde_json::json!({
        "type": "whiteboard_stroke",
        "data": {
            "room_id": rid.to_hex(),
            "stroke_id": stroke.id.to_hex(),
            "user_id": identity.user_id.to_hex(),
            "stroke_data": {
                "kind": stroke.kind,
                "points": stroke.points,
                "style": stroke.style,
            },
            "timestamp": stroke.created_at,
        }
    });
    dispatcher::broadcast_to_room(&state.registry, &rid, Some(connection_id), &event).await;

    let ack = serde_json::json!({
        "type": "ack",
        "data": { "op": "whiteboard_stroke", "stroke_id": stroke.id.to_hex() }
    });
    dispatcher::send_to_connection(&state.registry, connection_id, &ack).await;
    Ok(())
}

async fn handle_board_clear(
    state: &AppState,
    identity: &Identity,
    connection_id: &str,
    room_id: &str,
) -> Result<(), EngineError> {
    let rid = parse_oid(room_id, "room_id")?;
    require_joined(state, connection_id, &rid)?;

    let room = state.directory.get_active_room(&rid).await?;
    state.whiteboard.clear_board(&room, &identity.user_id).await?;

    let event = serde_json::json!({
        "type": "whiteboard_clear",
        "data": {
            "room_id": rid.to_hex(),
            "user_id": identity.user_id.to_hex(),
        }
    });
    dispatcher::broadcast_to_room(&state.registry, &rid, Some(connection_id), &event).await;

    let ack = serde_json::json!({
        "type": "ack",
        "data": { "op": "whiteboard_clear", "room_id": rid.to_hex() }
    });
    dispatcher::send_to_connection(&state.registry, connection_id, &ack).await;
    Ok(())
}

async fn handle_board_snapshot(
    state: &AppState,
    identity: &Identity,
    connection_id: &str,
    room_id: &str,
) -> Result<(), EngineError> {
    let rid = parse_oid(room_id, "room_id")?;
    require_joined(state, connection_id, &rid)?;

    let snapshot = state.whiteboard.save_snapshot(&rid, &identity.user_id).await?;

    let event = serde_json::json!({
        "type": "whiteboard_snapshot",
        "data": {
            "room_id": rid.to_hex(),
            "user_id": identity.user_id.to_hex(),
            "stroke_count": snapshot.stroke_count,
            "timestamp": snapshot.timestamp,
        }
    });
    dispatcher::broadcast_to_room(&state.registry, &rid, Some(connection_id), &event).await;
    dispatcher::send_to_connection(
        &state.registry,
        connection_id,
        &serde_json::json!({
            "type": "ack",
            "data": {
                "op": "whiteboard_snapshot",
                "stroke_count": snapshot.stroke_count,
                "timestamp": snapshot.timestamp,
            }
        }),
    )
    .await;
    Ok(())
}

async fn handle_doc_create(
    state: &AppState,
    identity: &Identity,
    connection_id: &str,
    room_id: &str,
    filename: &str,
    language: &str,
) -> Result<(), EngineError> {
    let rid = parse_oid(room_id, "room_id")?;
    require_joined(state, connection_id, &rid)?;

    let doc = state
        .code_editor
        .create_document(&rid, identity, filename, language)
        .await?;

    let event = serde_json::json!({
        "type": "code_document_created",
        "data": {
            "room_id": rid.to_hex(),
            "document": doc,
            "user_id": identity.user_id.to_hex(),
        }
    });
    dispatcher::broadcast_to_room(&state.registry, &rid, Some(connection_id), &event).await;
    dispatcher::send_to_connection(
        &state.registry,
        connection_id,
        &serde_json::json!({
            "type": "ack",
            "data": { "op": "code_document_create", "document": doc }
        }),
    )
    .await;
    Ok(())
}

async fn handle_content_change(
    state: &AppState,
    identity: &Identity,
    connection_id: &str,
    room_id: &str,
    document_id: &str,
    content: &str,
    cursor_position: Option<i64>,
) -> Result<(), EngineError> {
    let rid = parse_oid(room_id, "room_id")?;
    let did = parse_oid(document_id, "document_id")?;
    require_joined(state, connection_id, &rid)?;

    let version = state
        .code_editor
        .update_content(&rid, &did, identity, content)
        .await?;

    if let Some(position) = cursor_position {
        state.code_editor.update_cursor(&rid, &did, identity, position).await?;
    }

    let event = serde_json::json!({
        "type": "code_content_change",
        "data": {
            "room_id": rid.to_hex(),
            "document_id": did.to_hex(),
            "content": content,
            "cursor_position": cursor_position,
            "user_id": identity.user_id.to_hex(),
            "version": version,
            "timestamp": bson::DateTime::now().timestamp_millis(),
        }
    });
    dispatcher::broadcast_to_room(&state.registry, &rid, Some(connection_id), &event).await;

    let ack = serde_json::json!({
        "type": "ack",
        "data": { "op": "code_content_change", "document_id": did.to_hex(), "version": version }
    });
    dispatcher::send_to_connection(&state.registry, connection_id, &ack).await;
    Ok(())
}

async fn handle_cursor(
    state: &AppState,
    identity: &Identity,
    connection_id: &str,
    room_id: &str,
    document_id: &str,
    position: i64,
) -> Result<(), EngineError> {
    let rid = parse_oid(room_id, "room_id")?;
    let did = parse_oid(document_id, "document_id")?;
    require_joined(state, connection_id, &rid)?;

    let mark = state.code_editor.update_cursor(&rid, &did, identity, position).await?;

    // Broadcast only; nothing outlives the store TTL.
    let event = serde_json::json!({
        "type": "cursor_position",
        "data": {
            "room_id": rid.to_hex(),
            "document_id": did.to_hex(),
            "user_id": identity.user_id.to_hex(),
            "position": mark.position,
            "timestamp": mark.updated_at,
        }
    });
    dispatcher::broadcast_to_room(&state.registry, &rid, Some(connection_id), &event).await;
    Ok(())
}

async fn handle_code_run(
    state: &AppState,
    _identity: &Identity,
    connection_id: &str,
    room_id: &str,
    document_id: &str,
) -> Result<(), EngineError> {
    let rid = parse_oid(room_id, "room_id")?;
    let did = parse_oid(document_id, "document_id")?;
    require_joined(state, connection_id, &rid)?;

    let result = state.code_editor.run_code(&rid, &did).await?;

    let msg = serde_json::json!({
        "type": "code_run_result",
        "data": {
            "document_id": did.to_hex(),
            "success": result.success,
            "output": result.output,
            "execution_time_ms": result.execution_time_ms,
        }
    });
    dispatcher::send_to_connection(&state.registry, connection_id, &msg).await;
    Ok(())
}

async fn handle_video_bootstrap(
    state: &AppState,
    identity: &Identity,
    connection_id: &str,
    room_id: &str,
) -> Result<(), EngineError> {
    let rid = parse_oid(room_id, "room_id")?;
    require_joined(state, connection_id, &rid)?;

    let bootstrap = state.video.bootstrap(&rid, identity).await?;
    let msg = serde_json::json!({
        "type": "video_session",
        "data": bootstrap,
    });
    dispatcher::send_to_connection(&state.registry, connection_id, &msg).await;
    Ok(())
}

async fn handle_video_signal(
    state: &AppState,
    identity: &Identity,
    connection_id: &str,
    room_id: &str,
    target_user_id: Option<&str>,
    signal_type: &str,
    data: serde_json::Value,
) -> Result<(), EngineError> {
    let rid = parse_oid(room_id, "room_id")?;
    require_joined(state, connection_id, &rid)?;

    let event = serde_json::json!({
        "type": "video_signal",
        "data": {
            "room_id": rid.to_hex(),
            "from_user_id": identity.user_id.to_hex(),
            "type": signal_type,
            "data": data,
        }
    });

    match target_user_id {
        // Targeted delivery goes through the identity index, not a
        // scan over the participant set. The target must be in the
        // room, otherwise the identity index would relay a signal to
        // any connected user in any room.
        Some(target) => {
            let target_id = parse_oid(target, "target_user_id")?;
            if !state.registry.user_in_room(&rid, &target_id) {
                return Err(EngineError::NotFound(format!(
                    "target user {} is not in the room",
                    target_id.to_hex()
                )));
            }
            dispatcher::send_to_user(&state.registry, &target_id, &event).await;
        }
        None => {
            dispatcher::broadcast_to_room(&state.registry, &rid, Some(connection_id), &event).await;
        }
    }
    Ok(())
}

async fn handle_typing(
    state: &AppState,
    identity: &Identity,
    connection_id: &str,
    room_id: &str,
    is_typing: bool,
) -> Result<(), EngineError> {
    let rid = parse_oid(room_id, "room_id")?;
    require_joined(state, connection_id, &rid)?;

    let event = serde_json::json!({
        "type": "typing_indicator",
        "data": {
            "room_id": rid.to_hex(),
            "user_id": identity.user_id.to_hex(),
            "username": identity.display_name,
            "is_typing": is_typing,
        }
    });
    dispatcher::broadcast_to_room(&state.registry, &rid, Some(connection_id), &event).await;
    Ok(())
}

async fn handle_presence_update(
    state: &AppState,
    identity: &Identity,
    connection_id: &str,
    room_id: &str,
    status: &str,
) -> Result<(), EngineError> {
    let rid = parse_oid(room_id, "room_id")?;
    require_joined(state, connection_id, &rid)?;

    let event = serde_json::json!({
        "type": "presence_update",
        "data": {
            "room_id": rid.to_hex(),
            "user_id": identity.user_id.to_hex(),
            "status": status,
        }
    });
    dispatcher::broadcast_to_room(&state.registry, &rid, Some(connection_id), &event).await;
    Ok(())
}

/// Full room snapshot for a joining or resyncing connection:
/// participants, the room type's subsystem state, and the file
/// listing.
async fn room_snapshot(state: &AppState, room: &Room) -> Result<serde_json::Value, EngineError> {
    let room_id = room.id.unwrap_or_default();
    let participants = state.presence.participants(&room_id).await?;

    let subsystem_state = match room.room_type {
        RoomType::Chat => {
            let messages = state.messaging.recent_messages(&room_id).await?;
            serde_json::json!({ "messages": messages })
        }
        RoomType::Whiteboard => {
            let strokes = state.whiteboard.strokes(&room_id).await?;
            serde_json::json!({ "strokes": strokes })
        }
        RoomType::CodeEditor => {
            let documents = state.code_editor.documents(&room_id).await?;
            serde_json::json!({ "documents": documents })
        }
        RoomType::FileSharing | RoomType::VideoCall => serde_json::json!({}),
    };

    let files: Vec<serde_json::Value> = state
        .files
        .list(&room_id)
        .await?
        .into_iter()
        .map(|f| {
            serde_json::json!({
                "file_id": f.id.map(|id| id.to_hex()).unwrap_or_default(),
                "name": f.original_name,
                "size": f.size,
                "uploaded_by": f.uploaded_by.to_hex(),
                "uploaded_at": f.created_at.timestamp_millis(),
            })
        })
        .collect();

    Ok(serde_json::json!({
        "type": "room_state",
        "data": {
            "room_id": room_id.to_hex(),
            "room_type": room.room_type.as_str(),
            "participants": participants,
            "subsystem_state": subsystem_state,
            "files": files,
        }
    }))
}
