use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Push-to-talk
        .route("/ptt/start", post(handlers::start_listening))
        .route("/ptt/stop", post(handlers::stop_listening))
        .route("/mute", post(handlers::toggle_mute))
        // Display mirror
        .route("/status", get(handlers::get_status))
        .route("/conversation", get(handlers::get_conversation))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
