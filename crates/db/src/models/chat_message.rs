use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// Durable chat log row. `ciphertext` is the AES-GCM sealed payload;
/// plaintext never reaches this collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub room_id: ObjectId,
    pub user_id: ObjectId,
    pub display_name: String,
    pub ciphertext: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    pub created_at: DateTime,
}

impl ChatMessage {
    pub const COLLECTION: &'static str = "chat_messages";
}

fn default_message_type() -> String {
    "text".to_string()
}
