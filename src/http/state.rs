use std::sync::Arc;

use tokio::sync::RwLock;

use crate::bus::ResilientPubSubClient;
use crate::orchestrator::{DisplayState, OrchestratorHandle};
use crate::speech::{PlaybackController, StreamingRecognitionSession};

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: OrchestratorHandle,
    /// What the display currently shows
    pub display: Arc<RwLock<DisplayState>>,
    pub bus: ResilientPubSubClient,
    pub recognition: Arc<StreamingRecognitionSession>,
    pub playback: Arc<PlaybackController>,
}
