use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bson::oid::ObjectId;
use hmac::{Hmac, Mac};
use huddle_config::{ServerSettings, TurnSettings, VideoSettings};
use nanoid::nanoid;
use qrcode::QrCode;
use qrcode::render::svg;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use tracing::{debug, info};

use crate::auth::Identity;
use crate::error::{EngineError, EngineResult};
use crate::store::{SharedStateStore, keys};

/// Session descriptor for a room's video call. The engine only
/// bootstraps: the media path itself is the external SFU's business.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSession {
    pub id: ObjectId,
    pub room_id: ObjectId,
    pub created_by: ObjectId,
    pub max_participants: u32,
    pub meeting_code: String,
    pub join_url: String,
}

#[derive(Debug, Serialize)]
pub struct VideoBootstrap {
    #[serde(flatten)]
    pub session: VideoSession,
    pub ice_servers: Vec<serde_json::Value>,
    /// SVG QR encoding of the join URL.
    pub qr_svg: String,
}

pub struct VideoSessionBootstrap {
    store: Arc<dyn SharedStateStore>,
    server: ServerSettings,
    turn: TurnSettings,
    video: VideoSettings,
}

impl VideoSessionBootstrap {
    pub fn new(
        store: Arc<dyn SharedStateStore>,
        server: ServerSettings,
        turn: TurnSettings,
        video: VideoSettings,
    ) -> Self {
        Self {
            store,
            server,
            turn,
            video,
        }
    }

    /// Returns the room's session, creating it lazily on the first
    /// request. Ephemeral like the rest of the hot state: room
    /// deactivation sweeps it away.
    pub async fn bootstrap(
        &self,
        room_id: &ObjectId,
        identity: &Identity,
    ) -> EngineResult<VideoBootstrap> {
        let key = keys::video_session(room_id);
        let session = match self.store.hash_get(&key, "body").await? {
            Some(body) => serde_json::from_str(&body)
                .map_err(|e| EngineError::Internal(e.to_string()))?,
            None => {
                let meeting_code = nanoid!(10);
                let session = VideoSession {
                    id: ObjectId::new(),
                    room_id: *room_id,
                    created_by: identity.user_id,
                    max_participants: self.video.max_participants,
                    join_url: format!("{}/join/{}", self.server.public_url, meeting_code),
                    meeting_code,
                };
                let body = serde_json::to_string(&session)
                    .map_err(|e| EngineError::Internal(e.to_string()))?;
                self.store.hash_set(&key, &[("body", body)]).await?;
                info!(room_id = %room_id.to_hex(), code = %session.meeting_code, "Video session created");
                session
            }
        };

        let qr_svg = QrCode::new(session.join_url.as_bytes())
            .map_err(|e| EngineError::Internal(e.to_string()))?
            .render::<svg::Color>()
            .min_dimensions(200, 200)
            .build();

        Ok(VideoBootstrap {
            ice_servers: build_ice_servers(&self.turn, &identity.user_id),
            qr_svg,
            session,
        })
    }
}

/// TURN URL variants with credentials. UDP TURN often fails behind
/// NAT/firewalls, so TCP and TLS fallbacks are included. With a shared
/// secret configured, credentials are per-user and time-limited
/// (HMAC-SHA1 over `expiry:user`, the coturn REST scheme).
pub fn build_ice_servers(turn: &TurnSettings, user_id: &ObjectId) -> Vec<serde_json::Value> {
    let Some(ref url) = turn.url else {
        return Vec::new();
    };

    let (username, credential) = if let Some(ref secret) = turn.shared_secret {
        let expiry = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            + 86400;
        let username = format!("{}:{}", expiry, user_id.to_hex());
        let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(username.as_bytes());
        let credential = BASE64.encode(mac.finalize().into_bytes());
        debug!(%username, "Generated TURN ephemeral credentials");
        (username, credential)
    } else {
        (
            turn.username.clone().unwrap_or_default(),
            turn.password.clone().unwrap_or_default(),
        )
    };

    let mut urls = vec![url.clone()];
    if url.starts_with("turn:") && !url.contains("?transport=") {
        urls.push(format!("{url}?transport=tcp"));
        let turns_url = url.replacen("turn:", "turns:", 1).replace(":3478", ":5349");
        urls.push(format!("{turns_url}?transport=tcp"));
    }

    vec![serde_json::json!({
        "urls": urls,
        "username": username,
        "credential": credential,
    })]
}
