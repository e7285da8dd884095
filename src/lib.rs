pub mod audio;
pub mod bus;
pub mod config;
pub mod error;
pub mod http;
pub mod nats;
pub mod orchestrator;
pub mod retry;
pub mod speech;

pub use audio::{AudioCaptureSource, AudioFrame, CaptureBackend, CaptureConfig, FrameSink};
pub use bus::{ConnectionState, ResilientPubSubClient, RoutingTable};
pub use config::Config;
pub use error::{Error, Result};
pub use http::{create_router, AppState};
pub use orchestrator::{DisplayEvent, OrchestratorHandle, SessionOrchestrator};
pub use speech::{PlaybackController, StreamingRecognitionSession};
