//! HTTP request handlers
//!
//! Implements the REST endpoints for playback and playlist control. The
//! engine absorbs backend faults internally, so handlers never surface 5xx
//! for decoder trouble; the only caller-visible failure is a load that did
//! not start.

use crate::api::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use showdeck_common::playlist::PlaylistItem;
use tracing::info;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    playing: bool,
    mock_decoder: bool,
    recoveries: u64,
    current_item: Option<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
pub struct LoadRequest {
    file_path: String,
}

#[derive(Debug, Serialize)]
pub struct LoadResponse {
    loaded: bool,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    position_secs: f64,
}

#[derive(Debug, Deserialize)]
pub struct SpeedRequest {
    speed: f64,
}

#[derive(Debug, Serialize)]
pub struct PositionResponse {
    position_secs: f64,
    duration_secs: f64,
    playing: bool,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    volume: u8, // 0-100 user-facing scale
}

#[derive(Debug, Serialize)]
pub struct VolumeResponse {
    volume: u8,
}

#[derive(Debug, Deserialize)]
pub struct OutputTargetRequest {
    /// Platform window handle; omit or null to detach
    window_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct PlaylistResponse {
    items: Vec<PlaylistItem>,
    current_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    file_path: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    index: usize,
}

#[derive(Debug, Deserialize)]
pub struct NotesRequest {
    index: usize,
    notes: String,
}

#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    moved: bool,
    current_index: Option<usize>,
}

fn ack() -> Json<AckResponse> {
    Json(AckResponse {
        status: "ok".to_string(),
    })
}

// ============================================================================
// Playback Endpoints
// ============================================================================

/// POST /playback/load - start playback of an explicit file path
pub async fn load(
    State(state): State<AppState>,
    Json(req): Json<LoadRequest>,
) -> (StatusCode, Json<LoadResponse>) {
    let loaded = state.engine.load(&req.file_path).await;
    let code = if loaded {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (code, Json(LoadResponse { loaded }))
}

/// POST /playback/play - resume playback
pub async fn play(State(state): State<AppState>) -> Json<AckResponse> {
    state.engine.play().await;
    ack()
}

/// POST /playback/pause - pause playback
pub async fn pause(State(state): State<AppState>) -> Json<AckResponse> {
    state.engine.pause().await;
    ack()
}

/// POST /playback/toggle - flip the paused state
pub async fn toggle_pause(State(state): State<AppState>) -> Json<AckResponse> {
    state.engine.toggle_pause().await;
    ack()
}

/// POST /playback/stop - halt playback and reset position
pub async fn stop(State(state): State<AppState>) -> Json<AckResponse> {
    state.engine.stop().await;
    ack()
}

/// POST /playback/seek - absolute seek in seconds
pub async fn seek(
    State(state): State<AppState>,
    Json(req): Json<SeekRequest>,
) -> Json<AckResponse> {
    state.engine.seek(req.position_secs).await;
    ack()
}

/// POST /playback/speed - playback speed multiplier
pub async fn set_speed(
    State(state): State<AppState>,
    Json(req): Json<SpeedRequest>,
) -> Json<AckResponse> {
    state.engine.set_speed(req.speed).await;
    ack()
}

/// GET /playback/status - engine health and transport state
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        playing: state.engine.is_playing().await,
        mock_decoder: state.engine.is_mock(),
        recoveries: state.engine.recoveries(),
        current_item: state.playlist.current().await,
    })
}

/// GET /playback/position - pull-based position/duration fallback
///
/// Duration here may still be the default if the DurationChanged event has
/// not arrived yet; SSE consumers get it pushed instead.
pub async fn get_position(State(state): State<AppState>) -> Json<PositionResponse> {
    Json(PositionResponse {
        position_secs: state.engine.get_position().await,
        duration_secs: state.engine.get_duration().await,
        playing: state.engine.is_playing().await,
    })
}

// ============================================================================
// Volume / Output Endpoints
// ============================================================================

/// GET /audio/volume
pub async fn get_volume(State(state): State<AppState>) -> Json<VolumeResponse> {
    Json(VolumeResponse {
        volume: state.engine.get_volume().round() as u8,
    })
}

/// POST /audio/volume
pub async fn set_volume(
    State(state): State<AppState>,
    Json(req): Json<VolumeRequest>,
) -> Json<VolumeResponse> {
    state.engine.set_volume(req.volume as f64).await;
    Json(VolumeResponse {
        volume: state.engine.get_volume().round() as u8,
    })
}

/// POST /output/target - attach the decoder to a window, or detach with null
pub async fn set_output_target(
    State(state): State<AppState>,
    Json(req): Json<OutputTargetRequest>,
) -> Json<AckResponse> {
    match req.window_id {
        Some(id) => info!("Attaching output to window {}", id),
        None => info!("Detaching output from presentation window"),
    }
    state.engine.set_output_target(req.window_id).await;
    ack()
}

// ============================================================================
// Playlist Endpoints
// ============================================================================

/// GET /playlist
pub async fn get_playlist(State(state): State<AppState>) -> Json<PlaylistResponse> {
    Json(PlaylistResponse {
        items: state.playlist.items().await,
        current_index: state.playlist.current_index().await,
    })
}

/// POST /playlist/add
pub async fn playlist_add(
    State(state): State<AppState>,
    Json(req): Json<AddItemRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.playlist.add(&req.file_path).await {
        Some(item) => (StatusCode::OK, Json(serde_json::json!({ "item": item }))),
        None => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "error": "file not found" })),
        ),
    }
}

/// DELETE /playlist/:index
pub async fn playlist_remove(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> StatusCode {
    if state.playlist.remove(index).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// POST /playlist/next
pub async fn playlist_next(State(state): State<AppState>) -> Json<AdvanceResponse> {
    let moved = state.playlist.next().await;
    Json(AdvanceResponse {
        moved,
        current_index: state.playlist.current_index().await,
    })
}

/// POST /playlist/previous
pub async fn playlist_previous(State(state): State<AppState>) -> Json<AdvanceResponse> {
    let moved = state.playlist.previous().await;
    Json(AdvanceResponse {
        moved,
        current_index: state.playlist.current_index().await,
    })
}

/// POST /playlist/select
pub async fn playlist_select(
    State(state): State<AppState>,
    Json(req): Json<SelectRequest>,
) -> (StatusCode, Json<AckResponse>) {
    if state.playlist.set_current_index(req.index).await {
        (StatusCode::OK, ack())
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(AckResponse {
                status: "index out of range".to_string(),
            }),
        )
    }
}

/// POST /playlist/notes
pub async fn playlist_notes(
    State(state): State<AppState>,
    Json(req): Json<NotesRequest>,
) -> StatusCode {
    if state.playlist.set_notes(req.index, req.notes).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// POST /playlist/play - load the current playlist item into the engine
///
/// The engine only ever receives the filepath; the playlist keeps ownership
/// of the item and the cursor.
pub async fn playlist_play(
    State(state): State<AppState>,
) -> (StatusCode, Json<LoadResponse>) {
    match state.playlist.current().await {
        Some(item) => {
            let loaded = state.engine.load(&item.filepath).await;
            let code = if loaded {
                StatusCode::OK
            } else {
                StatusCode::UNPROCESSABLE_ENTITY
            };
            (code, Json(LoadResponse { loaded }))
        }
        None => (StatusCode::NOT_FOUND, Json(LoadResponse { loaded: false })),
    }
}
