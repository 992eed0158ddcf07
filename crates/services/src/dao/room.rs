use bson::{DateTime, doc, oid::ObjectId};
use huddle_db::models::{Room, RoomType};
use mongodb::Database;

use super::base::{BaseDao, DaoResult};

pub struct RoomDao {
    pub base: BaseDao<Room>,
}

impl RoomDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Room::COLLECTION),
        }
    }

    pub async fn create(
        &self,
        event_id: ObjectId,
        team_id: Option<ObjectId>,
        room_type: RoomType,
        name: String,
    ) -> DaoResult<Room> {
        let room = Room {
            id: None,
            event_id,
            team_id,
            name,
            room_type,
            is_active: true,
            created_at: DateTime::now(),
        };

        let id = self.base.insert_one(&room).await?;
        self.base.find_by_id(id).await
    }

    pub async fn find_by_event(&self, event_id: ObjectId) -> DaoResult<Vec<Room>> {
        self.base
            .find_many(
                doc! { "event_id": event_id, "is_active": true },
                Some(doc! { "created_at": 1 }),
            )
            .await
    }

    /// Rooms are deactivated, never hard-deleted; durable history
    /// stays readable for the event archive.
    pub async fn set_active(&self, room_id: ObjectId, is_active: bool) -> DaoResult<()> {
        self.base
            .update_one(
                doc! { "_id": room_id },
                doc! { "$set": { "is_active": is_active } },
            )
            .await
    }
}
