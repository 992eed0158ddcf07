use std::sync::Arc;

use bson::oid::ObjectId;
use huddle_config::{ServerSettings, TurnSettings, VideoSettings};
use huddle_db::models::{Room, RoomType};
use huddle_services::auth::Identity;
use huddle_services::code_editor::CodeEditorService;
use huddle_services::membership::{MembershipProvider, StaticMembership};
use huddle_services::presence::PresenceService;
use huddle_services::store::{MemoryStore, SharedStateStore};
use huddle_services::video::VideoSessionBootstrap;
use huddle_services::whiteboard::WhiteboardService;

/// The collaboration services wired to an in-memory backend and a
/// static membership table. Each instance is fully isolated.
pub struct TestEngine {
    pub store: Arc<MemoryStore>,
    pub membership: Arc<StaticMembership>,
    pub presence: Arc<PresenceService>,
    pub whiteboard: Arc<WhiteboardService>,
    pub code_editor: Arc<CodeEditorService>,
    pub video: Arc<VideoSessionBootstrap>,
}

impl TestEngine {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let membership = Arc::new(StaticMembership::new());
        let store_dyn: Arc<dyn SharedStateStore> = store.clone();
        let membership_dyn: Arc<dyn MembershipProvider> = membership.clone();

        Self {
            presence: Arc::new(PresenceService::new(store_dyn.clone())),
            whiteboard: Arc::new(WhiteboardService::new(
                store_dyn.clone(),
                membership_dyn.clone(),
            )),
            code_editor: Arc::new(CodeEditorService::new(store_dyn.clone())),
            video: Arc::new(VideoSessionBootstrap::new(
                store_dyn,
                server_settings(),
                turn_settings(),
                video_settings(),
            )),
            store,
            membership,
        }
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

pub fn identity(display_name: &str) -> Identity {
    Identity {
        user_id: ObjectId::new(),
        display_name: display_name.to_string(),
    }
}

pub fn room(room_type: RoomType) -> Room {
    Room {
        id: Some(ObjectId::new()),
        event_id: ObjectId::new(),
        team_id: None,
        name: "fixture room".to_string(),
        room_type,
        is_active: true,
        created_at: bson::DateTime::now(),
    }
}

pub fn server_settings() -> ServerSettings {
    ServerSettings {
        host: "127.0.0.1".to_string(),
        port: 0,
        public_url: "https://huddle.test".to_string(),
    }
}

pub fn turn_settings() -> TurnSettings {
    TurnSettings {
        url: Some("turn:turn.huddle.test:3478".to_string()),
        username: Some("static-user".to_string()),
        password: Some("static-pass".to_string()),
        shared_secret: Some("coturn-rest-secret".to_string()),
    }
}

pub fn video_settings() -> VideoSettings {
    VideoSettings {
        max_participants: 16,
    }
}
