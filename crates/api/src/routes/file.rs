use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use bson::oid::ObjectId;
use huddle_db::models::UploadedFile;
use serde::Serialize;
use tracing::info;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub id: String,
    pub room_id: String,
    pub name: String,
    pub size: u64,
    pub uploaded_by: String,
    pub uploaded_at: String,
}

fn to_response(file: UploadedFile) -> FileResponse {
    FileResponse {
        id: file.id.map(|id| id.to_hex()).unwrap_or_default(),
        room_id: file.room_id.to_hex(),
        name: file.original_name,
        size: file.size,
        uploaded_by: file.uploaded_by.to_hex(),
        uploaded_at: file.created_at.try_to_rfc3339_string().unwrap_or_default(),
    }
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<FileResponse>>, ApiError> {
    let rid = ObjectId::parse_str(&room_id)
        .map_err(|_| ApiError::BadRequest("Invalid room_id".to_string()))?;
    let room = state.directory.get_room(&rid).await?;
    state.directory.check_permission(&room, &auth.user_id).await?;

    let files = state.files.list(&rid).await?;
    Ok(Json(files.into_iter().map(to_response).collect()))
}

pub async fn upload(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<FileResponse>, ApiError> {
    let rid = ObjectId::parse_str(&room_id)
        .map_err(|_| ApiError::BadRequest("Invalid room_id".to_string()))?;
    let room = state.directory.get_active_room(&rid).await?;
    state.directory.check_permission(&room, &auth.user_id).await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field
            .file_name()
            .map(|n| n.to_string())
            .ok_or_else(|| ApiError::BadRequest("Missing filename".to_string()))?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?;

        // Validates extension and size before anything touches disk.
        let stored_name = state.files.prepare(&original_name, bytes.len() as u64)?;

        let dir = std::path::Path::new(&state.settings.uploads.dir).join(rid.to_hex());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to create upload dir: {e}")))?;
        tokio::fs::write(dir.join(&stored_name), &bytes)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to store file: {e}")))?;

        let file = state
            .files
            .register(
                &rid,
                &auth.identity(),
                &original_name,
                &stored_name,
                bytes.len() as u64,
            )
            .await?;

        info!(
            room_id = %rid.to_hex(),
            user_id = %auth.user_id.to_hex(),
            name = %original_name,
            size = bytes.len(),
            "File uploaded"
        );

        return Ok(Json(to_response(file)));
    }

    Err(ApiError::BadRequest("No file field in request".to_string()))
}
