use std::sync::Arc;

use anyhow::Context;
use axum::extract::ws::Message;
use futures::SinkExt;
use huddle_config::Settings;
use huddle_services::auth::AuthService;
use huddle_services::code_editor::CodeEditorService;
use huddle_services::crypto::MessageCodec;
use huddle_services::file_registry::FileRegistryService;
use huddle_services::membership::{MembershipProvider, MongoMembership};
use huddle_services::messaging::MessagingService;
use huddle_services::presence::PresenceService;
use huddle_services::rooms::RoomDirectory;
use huddle_services::store::{RedisStore, SharedStateStore};
use huddle_services::video::VideoSessionBootstrap;
use huddle_services::whiteboard::WhiteboardService;
use tracing::info;

use crate::ws::registry::WsRegistry;

/// The one engine context, constructed at process start and injected
/// into every handler. Anything behind it is read-only after init;
/// mutable room state lives in the shared store, never here.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub auth: Arc<AuthService>,
    pub directory: Arc<RoomDirectory>,
    pub presence: Arc<PresenceService>,
    pub messaging: Arc<MessagingService>,
    pub whiteboard: Arc<WhiteboardService>,
    pub code_editor: Arc<CodeEditorService>,
    pub files: Arc<FileRegistryService>,
    pub video: Arc<VideoSessionBootstrap>,
    pub registry: Arc<WsRegistry>,
}

impl AppState {
    pub async fn init(settings: Settings) -> anyhow::Result<Self> {
        // The key is mandatory: starting without one would mint
        // history nobody can ever read back after a restart.
        let codec = Arc::new(
            MessageCodec::from_base64(&settings.encryption.message_key)
                .context("encryption.message_key must be a base64-encoded 32-byte key")?,
        );

        let client = mongodb::Client::with_uri_str(&settings.mongo.url)
            .await
            .context("connecting to MongoDB")?;
        let db = client.database(&settings.mongo.database);
        huddle_db::indexes::ensure_indexes(&db).await?;

        let store: Arc<dyn SharedStateStore> = Arc::new(
            RedisStore::connect(&settings.redis.url)
                .await
                .context("connecting to Redis")?,
        );
        let membership: Arc<dyn MembershipProvider> = Arc::new(MongoMembership::new(&db));

        let state = Self {
            auth: Arc::new(AuthService::new(&settings.auth.jwt_secret)),
            directory: Arc::new(RoomDirectory::new(&db, membership.clone(), store.clone())),
            presence: Arc::new(PresenceService::new(store.clone())),
            messaging: Arc::new(MessagingService::new(&db, store.clone(), codec)),
            whiteboard: Arc::new(WhiteboardService::new(store.clone(), membership)),
            code_editor: Arc::new(CodeEditorService::new(store.clone())),
            files: Arc::new(FileRegistryService::new(&db, settings.uploads.clone())),
            video: Arc::new(VideoSessionBootstrap::new(
                store,
                settings.server.clone(),
                settings.turn.clone(),
                settings.video.clone(),
            )),
            registry: Arc::new(WsRegistry::new()),
            settings: Arc::new(settings),
        };

        info!("Room engine initialized");
        Ok(state)
    }

    /// Drains open connections. Clients reconnect and re-snapshot;
    /// nothing is resumable across a socket loss.
    pub async fn shutdown(&self) {
        let senders = self.registry.all_senders();
        info!(connections = senders.len(), "Draining connections for shutdown");
        for sender in senders {
            let mut guard = sender.lock().await;
            let _ = guard.send(Message::Close(None)).await;
        }
    }
}
