use super::state::AppState;
use crate::bus::ConnectionState;
use crate::orchestrator::ConversationEntry;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Serialize)]
pub struct PttResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub interim: Option<String>,
    pub bus: ConnectionState,
    pub listening: bool,
    pub speaking: bool,
    pub muted: bool,
}

#[derive(Debug, Serialize)]
pub struct MuteResponse {
    pub muted: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn orchestrator_gone() -> axum::response::Response {
    error!("Session orchestrator is not running");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: "Session orchestrator is not running".to_string(),
        }),
    )
        .into_response()
}

/// POST /ptt/start
/// Press push-to-talk; the outcome shows up on /status
pub async fn start_listening(State(state): State<AppState>) -> impl IntoResponse {
    info!("PTT start requested over HTTP");

    if !state.orchestrator.start_listening() {
        return orchestrator_gone();
    }

    (
        StatusCode::ACCEPTED,
        Json(PttResponse {
            status: "pressed".to_string(),
        }),
    )
        .into_response()
}

/// POST /ptt/stop
pub async fn stop_listening(State(state): State<AppState>) -> impl IntoResponse {
    info!("PTT stop requested over HTTP");

    if !state.orchestrator.stop_listening() {
        return orchestrator_gone();
    }

    (
        StatusCode::ACCEPTED,
        Json(PttResponse {
            status: "released".to_string(),
        }),
    )
        .into_response()
}

/// POST /mute
/// Toggle spoken output; the bus and display keep running
pub async fn toggle_mute(State(state): State<AppState>) -> impl IntoResponse {
    match state.orchestrator.toggle_mute().await {
        Some(muted) => {
            info!("Mute toggled over HTTP, muted={}", muted);
            Json(MuteResponse { muted }).into_response()
        }
        None => orchestrator_gone(),
    }
}

/// GET /status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let display = state.display.read().await;

    Json(StatusResponse {
        status: display.status.clone(),
        interim: display.interim.clone(),
        bus: state.bus.state(),
        listening: state.recognition.is_listening(),
        speaking: state.playback.is_speaking(),
        muted: state.playback.is_muted(),
    })
}

/// GET /conversation
/// Oldest first, capped in memory
pub async fn get_conversation(State(state): State<AppState>) -> impl IntoResponse {
    let display = state.display.read().await;
    let entries: Vec<ConversationEntry> = display.conversation.iter().cloned().collect();
    Json(entries)
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
