//! REST API implementation for the media controller
//!
//! The operator dashboard and the audience surface both drive playback
//! through these endpoints; the SSE stream at /api/v1/events carries the
//! engine's event stream back out.

pub mod handlers;
pub mod sse;

use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::playback::PlaybackEngine;
use crate::playlist::PlaylistManager;
use showdeck_common::events::EventBus;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Playback engine
    pub engine: Arc<PlaybackEngine>,
    /// Playlist (ordering + cursor; the engine never sees it)
    pub playlist: Arc<PlaylistManager>,
    /// Event broadcaster feeding the SSE stream
    pub bus: Arc<EventBus>,
    /// Server port
    pub port: u16,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check (no prefix for health endpoint)
        .route("/health", get(health_check))
        // API v1 routes
        .nest(
            "/api/v1",
            Router::new()
                // Playback control endpoints
                .route("/playback/load", post(handlers::load))
                .route("/playback/play", post(handlers::play))
                .route("/playback/pause", post(handlers::pause))
                .route("/playback/toggle", post(handlers::toggle_pause))
                .route("/playback/stop", post(handlers::stop))
                .route("/playback/seek", post(handlers::seek))
                .route("/playback/speed", post(handlers::set_speed))
                .route("/playback/status", get(handlers::get_status))
                .route("/playback/position", get(handlers::get_position))
                // Volume endpoints
                .route("/audio/volume", get(handlers::get_volume))
                .route("/audio/volume", post(handlers::set_volume))
                // Output window targeting
                .route("/output/target", post(handlers::set_output_target))
                // Playlist endpoints
                .route("/playlist", get(handlers::get_playlist))
                .route("/playlist/add", post(handlers::playlist_add))
                .route("/playlist/next", post(handlers::playlist_next))
                .route("/playlist/previous", post(handlers::playlist_previous))
                .route("/playlist/select", post(handlers::playlist_select))
                .route("/playlist/notes", post(handlers::playlist_notes))
                .route("/playlist/play", post(handlers::playlist_play))
                .route("/playlist/:index", delete(handlers::playlist_remove))
                // SSE events
                .route("/events", get(sse::event_stream)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "showdeck-mc",
        "version": env!("CARGO_PKG_VERSION"),
        "port": state.port,
        "mock_decoder": state.engine.is_mock(),
    }))
}
