use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// A scoped collaboration context tied to an event, optionally
/// narrowed to one team. The type is fixed at creation and decides
/// which subsystem state a room snapshot carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub event_id: ObjectId,
    pub team_id: Option<ObjectId>,
    pub name: String,
    pub room_type: RoomType,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: DateTime,
}

impl Room {
    pub const COLLECTION: &'static str = "rooms";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    Chat,
    Whiteboard,
    CodeEditor,
    FileSharing,
    VideoCall,
}

impl RoomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Chat => "chat",
            RoomType::Whiteboard => "whiteboard",
            RoomType::CodeEditor => "code_editor",
            RoomType::FileSharing => "file_sharing",
            RoomType::VideoCall => "video_call",
        }
    }
}
