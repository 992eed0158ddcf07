use std::sync::Arc;

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::error::EngineResult;
use crate::store::{SharedStateStore, keys};

/// An identity with at least one live connection joined to a room.
/// Membership lives in the shared store so every dispatcher process
/// sees the same participant set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub room_id: ObjectId,
    pub user_id: ObjectId,
    pub display_name: String,
    /// Unix millis.
    pub joined_at: i64,
}

pub struct PresenceService {
    store: Arc<dyn SharedStateStore>,
}

impl PresenceService {
    pub fn new(store: Arc<dyn SharedStateStore>) -> Self {
        Self { store }
    }

    /// Registers the participant; returns false when the identity was
    /// already present (another connection of the same user).
    pub async fn join(&self, room_id: &ObjectId, identity: &Identity) -> EngineResult<bool> {
        let newly_added = self
            .store
            .set_add(&keys::participants(room_id), &identity.user_id.to_hex())
            .await?;

        if newly_added {
            let participant = Participant {
                room_id: *room_id,
                user_id: identity.user_id,
                display_name: identity.display_name.clone(),
                joined_at: bson::DateTime::now().timestamp_millis(),
            };
            let body = serde_json::to_string(&participant)
                .map_err(|e| crate::EngineError::Internal(e.to_string()))?;
            self.store
                .hash_set(
                    &keys::participant(room_id, &identity.user_id),
                    &[("body", body)],
                )
                .await?;
        }

        Ok(newly_added)
    }

    /// Removes the participant; returns false when the identity was
    /// not in the room (idempotent leave).
    pub async fn leave(&self, room_id: &ObjectId, user_id: &ObjectId) -> EngineResult<bool> {
        let removed = self
            .store
            .set_remove(&keys::participants(room_id), &user_id.to_hex())
            .await?;
        if removed {
            self.store
                .delete(&keys::participant(room_id, user_id))
                .await?;
        }
        Ok(removed)
    }

    pub async fn participants(&self, room_id: &ObjectId) -> EngineResult<Vec<Participant>> {
        let member_ids = self.store.set_members(&keys::participants(room_id)).await?;

        let mut participants = Vec::with_capacity(member_ids.len());
        for hex in member_ids {
            let Ok(user_id) = ObjectId::parse_str(&hex) else {
                continue;
            };
            if let Some(body) = self
                .store
                .hash_get(&keys::participant(room_id, &user_id), "body")
                .await?
                && let Ok(participant) = serde_json::from_str::<Participant>(&body)
            {
                participants.push(participant);
            }
        }
        participants.sort_by_key(|p| p.joined_at);
        Ok(participants)
    }
}
