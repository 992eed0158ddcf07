use bson::{DateTime, doc, oid::ObjectId};
use huddle_db::models::ChatMessage;
use mongodb::Database;

use super::base::{BaseDao, DaoResult, PaginatedResult, PaginationParams};

pub struct MessageDao {
    pub base: BaseDao<ChatMessage>,
}

impl MessageDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, ChatMessage::COLLECTION),
        }
    }

    pub async fn insert(
        &self,
        room_id: ObjectId,
        user_id: ObjectId,
        display_name: String,
        ciphertext: String,
        message_type: String,
        created_at: DateTime,
    ) -> DaoResult<ObjectId> {
        let message = ChatMessage {
            id: None,
            room_id,
            user_id,
            display_name,
            ciphertext,
            message_type,
            created_at,
        };
        self.base.insert_one(&message).await
    }

    pub async fn find_in_room(
        &self,
        room_id: ObjectId,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<ChatMessage>> {
        self.base
            .find_paginated(
                doc! { "room_id": room_id },
                doc! { "created_at": -1 },
                params,
            )
            .await
    }
}
