use axum::{
    Json,
    extract::{Path, Query, State},
};
use bson::oid::ObjectId;
use huddle_db::models::{Room, RoomType};
use huddle_services::dao::base::PaginationParams;
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub event_id: String,
    pub team_id: Option<String>,
    pub room_type: RoomType,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub id: String,
    pub event_id: String,
    pub team_id: Option<String>,
    pub name: String,
    pub room_type: String,
    pub is_active: bool,
    pub created_at: String,
}

fn to_response(room: Room) -> RoomResponse {
    RoomResponse {
        id: room.id.map(|id| id.to_hex()).unwrap_or_default(),
        event_id: room.event_id.to_hex(),
        team_id: room.team_id.map(|id| id.to_hex()),
        name: room.name,
        room_type: room.room_type.as_str().to_string(),
        is_active: room.is_active,
        created_at: room.created_at.try_to_rfc3339_string().unwrap_or_default(),
    }
}

fn parse_oid(value: &str, what: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(value).map_err(|_| ApiError::BadRequest(format!("Invalid {what}")))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateRoomRequest>,
) -> Result<Json<RoomResponse>, ApiError> {
    let event_id = parse_oid(&body.event_id, "event_id")?;
    let team_id = body
        .team_id
        .as_deref()
        .map(|id| parse_oid(id, "team_id"))
        .transpose()?;

    state
        .directory
        .assert_event_organizer(&event_id, &auth.user_id)
        .await?;

    let room = state
        .directory
        .create_room(event_id, team_id, body.room_type, body.name)
        .await?;

    Ok(Json(to_response(room)))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
) -> Result<Json<RoomResponse>, ApiError> {
    let rid = parse_oid(&room_id, "room_id")?;
    let room = state.directory.get_room(&rid).await?;
    state.directory.check_permission(&room, &auth.user_id).await?;

    Ok(Json(to_response(room)))
}

pub async fn list_for_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<String>,
) -> Result<Json<Vec<RoomResponse>>, ApiError> {
    let eid = parse_oid(&event_id, "event_id")?;
    let rooms = state.directory.rooms_for_event(eid).await?;

    // Access is checked per room; a caller only sees the rooms they
    // could join.
    let mut visible = Vec::with_capacity(rooms.len());
    for room in rooms {
        if state
            .directory
            .check_permission(&room, &auth.user_id)
            .await
            .is_ok()
        {
            visible.push(to_response(room));
        }
    }

    Ok(Json(visible))
}

pub async fn deactivate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rid = parse_oid(&room_id, "room_id")?;
    let room = state.directory.get_room(&rid).await?;

    state
        .directory
        .assert_event_organizer(&room.event_id, &auth.user_id)
        .await?;
    state.directory.deactivate_room(&rid).await?;

    Ok(Json(serde_json::json!({ "deactivated": true })))
}

pub async fn participants(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rid = parse_oid(&room_id, "room_id")?;
    let room = state.directory.get_room(&rid).await?;
    state.directory.check_permission(&room, &auth.user_id).await?;

    let participants = state.presence.participants(&rid).await?;
    Ok(Json(serde_json::json!({ "participants": participants })))
}

pub async fn messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rid = parse_oid(&room_id, "room_id")?;
    let room = state.directory.get_room(&rid).await?;
    state.directory.check_permission(&room, &auth.user_id).await?;

    let page = state.messaging.history(&rid, &params).await?;
    Ok(Json(serde_json::json!({
        "items": page.items,
        "total": page.total,
        "page": page.page,
        "per_page": page.per_page,
        "total_pages": page.total_pages,
    })))
}
