use std::sync::Arc;

use bson::{DateTime, oid::ObjectId};
use mongodb::Database;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::Identity;
use crate::crypto::MessageCodec;
use crate::dao::base::{PaginatedResult, PaginationParams};
use crate::dao::message::MessageDao;
use crate::error::EngineResult;
use crate::store::{SharedStateStore, keys};

/// Shown instead of a record whose ciphertext no longer decrypts
/// (e.g. after a key rotation). One bad record never fails the read.
pub const DECRYPT_PLACEHOLDER: &str = "[message unavailable]";

/// Last N messages kept in the hot cache per room.
pub const HOT_CACHE_SIZE: usize = 100;

/// Hot-cache entry; ciphertext only, same as the durable log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedMessage {
    pub id: ObjectId,
    pub user_id: ObjectId,
    pub username: String,
    pub ciphertext: String,
    pub message_type: String,
    /// Unix millis; doubles as the cache score.
    pub timestamp: i64,
}

impl CachedMessage {
    pub fn into_view(self, codec: &MessageCodec) -> MessageView {
        let message = decrypt_or_placeholder(codec, &self.ciphertext);
        MessageView {
            id: self.id.to_hex(),
            user_id: self.user_id.to_hex(),
            username: self.username,
            message,
            message_type: self.message_type,
            timestamp: self.timestamp,
        }
    }
}

/// Decrypted message as handed to an authorized viewer.
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub message: String,
    pub message_type: String,
    pub timestamp: i64,
}

#[derive(Debug, Serialize)]
pub struct SentMessage {
    pub id: String,
    pub timestamp: i64,
}

pub fn decrypt_or_placeholder(codec: &MessageCodec, ciphertext: &str) -> String {
    match codec.decrypt(ciphertext) {
        Ok(plaintext) => plaintext,
        Err(e) => {
            warn!(%e, "Undecryptable message record, substituting placeholder");
            DECRYPT_PLACEHOLDER.to_string()
        }
    }
}

pub struct MessagingService {
    dao: MessageDao,
    store: Arc<dyn SharedStateStore>,
    codec: Arc<MessageCodec>,
}

impl MessagingService {
    pub fn new(
        db: &Database,
        store: Arc<dyn SharedStateStore>,
        codec: Arc<MessageCodec>,
    ) -> Self {
        Self {
            dao: MessageDao::new(db),
            store,
            codec,
        }
    }

    /// Encrypts, durably appends, then feeds the hot cache. Plaintext
    /// never touches storage.
    pub async fn send_message(
        &self,
        room_id: &ObjectId,
        identity: &Identity,
        text: &str,
        message_type: &str,
    ) -> EngineResult<SentMessage> {
        let ciphertext = self.codec.encrypt(text)?;
        let created_at = DateTime::now();
        let timestamp = created_at.timestamp_millis();

        let id = self
            .dao
            .insert(
                *room_id,
                identity.user_id,
                identity.display_name.clone(),
                ciphertext.clone(),
                message_type.to_string(),
                created_at,
            )
            .await?;

        let cached = CachedMessage {
            id,
            user_id: identity.user_id,
            username: identity.display_name.clone(),
            ciphertext,
            message_type: message_type.to_string(),
            timestamp,
        };
        let body = serde_json::to_string(&cached)
            .map_err(|e| crate::EngineError::Internal(e.to_string()))?;
        self.store
            .sorted_append(
                &keys::message_cache(room_id),
                timestamp as f64,
                &body,
                Some(HOT_CACHE_SIZE),
            )
            .await?;

        Ok(SentMessage {
            id: id.to_hex(),
            timestamp,
        })
    }

    /// Hot-cache read for snapshots: the last `HOT_CACHE_SIZE`
    /// messages, oldest first, decrypted at read time.
    pub async fn recent_messages(&self, room_id: &ObjectId) -> EngineResult<Vec<MessageView>> {
        let entries = self
            .store
            .sorted_range(&keys::message_cache(room_id), 0, -1)
            .await?;

        Ok(entries
            .into_iter()
            .filter_map(|body| serde_json::from_str::<CachedMessage>(&body).ok())
            .map(|cached| cached.into_view(&self.codec))
            .collect())
    }

    /// Durable history, newest first, paginated.
    pub async fn history(
        &self,
        room_id: &ObjectId,
        params: &PaginationParams,
    ) -> EngineResult<PaginatedResult<MessageView>> {
        let result = self.dao.find_in_room(*room_id, params).await?;

        let items = result
            .items
            .into_iter()
            .map(|m| MessageView {
                id: m.id.map(|id| id.to_hex()).unwrap_or_default(),
                user_id: m.user_id.to_hex(),
                username: m.display_name,
                message: decrypt_or_placeholder(&self.codec, &m.ciphertext),
                message_type: m.message_type,
                timestamp: m.created_at.timestamp_millis(),
            })
            .collect();

        Ok(PaginatedResult {
            items,
            total: result.total,
            page: result.page,
            per_page: result.per_page,
            total_pages: result.total_pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undecryptable_record_becomes_placeholder() {
        let old_codec = MessageCodec::new(&[1u8; 32]).unwrap();
        let new_codec = MessageCodec::new(&[2u8; 32]).unwrap();
        let sealed = old_codec.encrypt("pre-rotation message").unwrap();

        // A record sealed under a rotated-away key must degrade to the
        // placeholder, not error the whole read.
        assert_eq!(decrypt_or_placeholder(&new_codec, &sealed), DECRYPT_PLACEHOLDER);
        assert_eq!(
            decrypt_or_placeholder(&new_codec, "not even base64"),
            DECRYPT_PLACEHOLDER
        );
    }

    #[test]
    fn readable_record_passes_through() {
        let codec = MessageCodec::new(&[3u8; 32]).unwrap();
        let sealed = codec.encrypt("hello").unwrap();
        assert_eq!(decrypt_or_placeholder(&codec, &sealed), "hello");
    }

    #[test]
    fn cached_message_view_substitutes_placeholder() {
        let old_codec = MessageCodec::new(&[4u8; 32]).unwrap();
        let new_codec = MessageCodec::new(&[5u8; 32]).unwrap();

        let cached = CachedMessage {
            id: ObjectId::new(),
            user_id: ObjectId::new(),
            username: "ana".to_string(),
            ciphertext: old_codec.encrypt("lost to rotation").unwrap(),
            message_type: "text".to_string(),
            timestamp: DateTime::now().timestamp_millis(),
        };

        let view = cached.into_view(&new_codec);
        assert_eq!(view.message, DECRYPT_PLACEHOLDER);
        assert_eq!(view.username, "ana");
    }
}
