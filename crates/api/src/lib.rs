pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod ws;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let room_routes = Router::new()
        .route("/", post(routes::room::create))
        .route("/{room_id}", get(routes::room::get))
        .route("/{room_id}/deactivate", post(routes::room::deactivate))
        .route("/{room_id}/participant", get(routes::room::participants))
        .route("/{room_id}/message", get(routes::room::messages));

    // Body limit sized to the configured per-file cap plus multipart
    // framing overhead.
    let file_routes = Router::new()
        .route("/", get(routes::file::list))
        .route("/upload", post(routes::file::upload))
        .layer(DefaultBodyLimit::max(
            state.settings.uploads.max_file_size as usize + 64 * 1024,
        ));

    let event_routes = Router::new().route("/{event_id}/room", get(routes::room::list_for_event));

    let api = Router::new()
        .nest("/room", room_routes)
        .nest("/room/{room_id}/file", file_routes)
        .nest("/event", event_routes);

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .route("/ws", get(ws::handler::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
