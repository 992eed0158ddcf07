use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// File metadata only; the bytes live on the blob store under
/// `{upload_dir}/{room_id}/{stored_name}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub room_id: ObjectId,
    pub original_name: String,
    pub stored_name: String,
    pub size: u64,
    pub uploaded_by: ObjectId,
    pub created_at: DateTime,
}

impl UploadedFile {
    pub const COLLECTION: &'static str = "room_files";
}
