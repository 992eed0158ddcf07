use std::sync::Arc;

use bson::oid::ObjectId;
use huddle_db::models::Room;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::Identity;
use crate::error::{EngineError, EngineResult};
use crate::membership::MembershipProvider;
use crate::store::{SharedStateStore, keys};

/// One atomic drawing action. Immutable once appended; a room's
/// strokes are totally ordered by append sequence, which is the order
/// the dispatcher observed them in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stroke {
    pub id: ObjectId,
    pub user_id: ObjectId,
    pub kind: String,
    pub points: serde_json::Value,
    pub style: serde_json::Value,
    /// Unix millis.
    pub created_at: i64,
}

/// Client-supplied stroke payload.
#[derive(Debug, Clone, Deserialize)]
pub struct StrokeData {
    #[serde(default = "default_kind")]
    pub kind: String,
    pub points: serde_json::Value,
    #[serde(default)]
    pub style: serde_json::Value,
}

fn default_kind() -> String {
    "freehand".to_string()
}

/// Marker recorded by `save_snapshot`; no raster rendering happens
/// here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub saved_by: ObjectId,
    pub stroke_count: usize,
    /// Unix millis.
    pub timestamp: i64,
}

pub struct WhiteboardService {
    store: Arc<dyn SharedStateStore>,
    membership: Arc<dyn MembershipProvider>,
}

impl WhiteboardService {
    pub fn new(
        store: Arc<dyn SharedStateStore>,
        membership: Arc<dyn MembershipProvider>,
    ) -> Self {
        Self { store, membership }
    }

    pub async fn append_stroke(
        &self,
        room_id: &ObjectId,
        identity: &Identity,
        data: StrokeData,
    ) -> EngineResult<Stroke> {
        let stroke = Stroke {
            id: ObjectId::new(),
            user_id: identity.user_id,
            kind: data.kind,
            points: data.points,
            style: data.style,
            created_at: bson::DateTime::now().timestamp_millis(),
        };

        // The per-room sequence makes concurrent appends from
        // different dispatcher processes collision-free and ordered.
        let seq = self.store.counter_incr(&keys::stroke_seq(room_id)).await?;
        let body = serde_json::to_string(&stroke)
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        self.store
            .sorted_append(&keys::strokes(room_id), seq as f64, &body, None)
            .await?;

        Ok(stroke)
    }

    pub async fn strokes(&self, room_id: &ObjectId) -> EngineResult<Vec<Stroke>> {
        let entries = self.store.sorted_range(&keys::strokes(room_id), 0, -1).await?;
        Ok(entries
            .into_iter()
            .filter_map(|body| serde_json::from_str(&body).ok())
            .collect())
    }

    /// Organizer-only. Truncates the stroke log; the sequence counter
    /// keeps running so post-clear strokes still sort after the wipe.
    pub async fn clear_board(&self, room: &Room, user_id: &ObjectId) -> EngineResult<()> {
        if !self.membership.organizes_event(user_id, &room.event_id).await? {
            return Err(EngineError::PermissionDenied(
                "only the event organizer may clear the board".to_string(),
            ));
        }
        let room_id = room.id.unwrap_or_default();
        self.store.delete(&keys::strokes(&room_id)).await?;
        info!(room_id = %room_id.to_hex(), user_id = %user_id.to_hex(), "Whiteboard cleared");
        Ok(())
    }

    pub async fn save_snapshot(
        &self,
        room_id: &ObjectId,
        user_id: &ObjectId,
    ) -> EngineResult<BoardSnapshot> {
        let stroke_count = self.store.sorted_len(&keys::strokes(room_id)).await?;
        let snapshot = BoardSnapshot {
            saved_by: *user_id,
            stroke_count,
            timestamp: bson::DateTime::now().timestamp_millis(),
        };
        let body = serde_json::to_string(&snapshot)
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        self.store
            .sorted_append(
                &keys::board_snapshots(room_id),
                snapshot.timestamp as f64,
                &body,
                None,
            )
            .await?;
        Ok(snapshot)
    }
}
