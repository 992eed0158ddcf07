use std::sync::Arc;

use bson::oid::ObjectId;
use huddle_db::models::{Room, RoomType};
use mongodb::Database;
use tracing::info;

use crate::dao::base::DaoError;
use crate::dao::room::RoomDao;
use crate::error::{EngineError, EngineResult};
use crate::membership::MembershipProvider;
use crate::store::{SharedStateStore, keys};

/// Persisted room records plus the permission gate every join and
/// privileged operation goes through.
pub struct RoomDirectory {
    dao: RoomDao,
    membership: Arc<dyn MembershipProvider>,
    store: Arc<dyn SharedStateStore>,
}

impl RoomDirectory {
    pub fn new(
        db: &Database,
        membership: Arc<dyn MembershipProvider>,
        store: Arc<dyn SharedStateStore>,
    ) -> Self {
        Self {
            dao: RoomDao::new(db),
            membership,
            store,
        }
    }

    pub async fn create_room(
        &self,
        event_id: ObjectId,
        team_id: Option<ObjectId>,
        room_type: RoomType,
        name: String,
    ) -> EngineResult<Room> {
        if name.trim().is_empty() {
            return Err(EngineError::Validation("room name is empty".to_string()));
        }
        let room = self.dao.create(event_id, team_id, room_type, name).await?;
        info!(room_id = %room.id.unwrap_or_default(), room_type = room.room_type.as_str(), "Room created");
        Ok(room)
    }

    pub async fn get_room(&self, room_id: &ObjectId) -> EngineResult<Room> {
        match self.dao.base.find_by_id(*room_id).await {
            Ok(room) => Ok(room),
            Err(DaoError::NotFound) => {
                Err(EngineError::NotFound(format!("room {}", room_id.to_hex())))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Like `get_room` but rejects deactivated rooms, which accept no
    /// further collaboration.
    pub async fn get_active_room(&self, room_id: &ObjectId) -> EngineResult<Room> {
        let room = self.get_room(room_id).await?;
        if !room.is_active {
            return Err(EngineError::NotFound(format!(
                "room {} is deactivated",
                room_id.to_hex()
            )));
        }
        Ok(room)
    }

    pub async fn rooms_for_event(&self, event_id: ObjectId) -> EngineResult<Vec<Room>> {
        Ok(self.dao.find_by_event(event_id).await?)
    }

    /// Deactivation clears hot state; the durable message/file history
    /// is retained.
    pub async fn deactivate_room(&self, room_id: &ObjectId) -> EngineResult<()> {
        self.dao.set_active(*room_id, false).await.map_err(|e| match e {
            DaoError::NotFound => EngineError::NotFound(format!("room {}", room_id.to_hex())),
            other => other.into(),
        })?;
        self.store.clear_prefix(&keys::room_prefix(room_id)).await?;
        info!(room_id = %room_id.to_hex(), "Room deactivated, hot state cleared");
        Ok(())
    }

    /// A user may enter a room when they organize its event, belong to
    /// its team (team-scoped rooms), or hold a valid ticket for the
    /// event (open rooms).
    pub async fn check_permission(&self, room: &Room, user_id: &ObjectId) -> EngineResult<()> {
        if self.membership.organizes_event(user_id, &room.event_id).await? {
            return Ok(());
        }

        let allowed = match room.team_id {
            Some(team_id) => self.membership.is_team_member(user_id, &team_id).await?,
            None => self.membership.holds_ticket(user_id, &room.event_id).await?,
        };

        if allowed {
            Ok(())
        } else {
            Err(EngineError::PermissionDenied(format!(
                "user {} may not enter room {}",
                user_id.to_hex(),
                room.id.map(|id| id.to_hex()).unwrap_or_default()
            )))
        }
    }

    pub async fn is_organizer(&self, room: &Room, user_id: &ObjectId) -> EngineResult<bool> {
        self.membership.organizes_event(user_id, &room.event_id).await
    }

    /// Room creation and deactivation are organizer actions.
    pub async fn assert_event_organizer(
        &self,
        event_id: &ObjectId,
        user_id: &ObjectId,
    ) -> EngineResult<()> {
        if self.membership.organizes_event(user_id, event_id).await? {
            Ok(())
        } else {
            Err(EngineError::PermissionDenied(format!(
                "user {} does not organize event {}",
                user_id.to_hex(),
                event_id.to_hex()
            )))
        }
    }
}
