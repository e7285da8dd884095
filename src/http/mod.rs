//! HTTP control surface
//!
//! Stands in for a physical PTT button and a screen:
//! - POST /ptt/start - Press push-to-talk
//! - POST /ptt/stop - Release push-to-talk
//! - GET /status - Current status line, interim transcript, bus state
//! - GET /conversation - Recent conversation messages
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
