//! Speech recognition and synthesis
//!
//! - `StreamingRecognitionSession` turns a capture source into transcript events
//! - `PlaybackController` speaks text and yields to live capture
//!
//! The cloud services sit behind `RecognitionBackend` and `SpeechSynthesizer`.

mod playback;
mod recognition;
mod session;
mod synthesis;

pub use playback::{PlaybackController, SpeakOutcome};
pub use recognition::{
    AudioEncoding, EndReason, RecognitionAlternative, RecognitionBackend, RecognitionConfig,
    RecognitionEvent, RecognitionResponse, RecognitionResult, ResponseStream, TranscriptEvent,
};
pub use session::StreamingRecognitionSession;
pub use synthesis::{SpeechSynthesizer, SynthesisRequest, SynthesisResponse, VoiceConfig};
