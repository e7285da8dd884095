use std::time::Duration;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::audio::FrameStream;
use crate::Result;

/// Audio encoding shared by recognition and synthesis requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudioEncoding {
    Linear16,
    Mp3,
}

/// Streaming recognition parameters
#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    pub sample_rate: u32,
    pub encoding: AudioEncoding,
    pub language_code: String,
    pub interim_results: bool,
    pub automatic_punctuation: bool,
    /// Maximum silence from the service before the stream is abandoned
    pub idle_timeout: Duration,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            encoding: AudioEncoding::Linear16,
            language_code: "en-US".to_string(),
            interim_results: true,
            automatic_punctuation: true,
            idle_timeout: Duration::from_secs(10),
        }
    }
}

/// One hypothesis for the current utterance
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionAlternative {
    pub transcript: String,
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecognitionResult {
    /// Best hypothesis first
    pub alternatives: Vec<RecognitionAlternative>,
    pub is_final: bool,
}

/// One message from the recognition service
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecognitionResponse {
    pub results: Vec<RecognitionResult>,
}

impl RecognitionResponse {
    /// Single-result response carrying one hypothesis
    pub fn transcript(text: impl Into<String>, is_final: bool) -> Self {
        Self {
            results: vec![RecognitionResult {
                alternatives: vec![RecognitionAlternative {
                    transcript: text.into(),
                    confidence: None,
                }],
                is_final,
            }],
        }
    }

    /// Top alternative of the first result, if any
    pub fn top_transcript(&self) -> Option<TranscriptEvent> {
        let result = self.results.first()?;
        let best = result.alternatives.first()?;

        Some(TranscriptEvent {
            text: best.transcript.clone(),
            is_final: result.is_final,
        })
    }
}

/// Transcript delivered to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
}

/// Why a recognition session stopped producing events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// `stop()` was called
    Stopped,
    /// The service closed the stream
    StreamClosed,
    /// Transport failure, including idle timeouts
    Failed(String),
}

/// Callback payload of a recognition session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Transcript(TranscriptEvent),
    Ended(EndReason),
}

pub type ResponseStream = BoxStream<'static, Result<RecognitionResponse>>;

/// Bidirectional streaming recognizer
///
/// Consumes frames until the stream ends and yields responses as the
/// service produces them.
#[async_trait::async_trait]
pub trait RecognitionBackend: Send + Sync {
    async fn streaming_recognize(
        &self,
        config: &RecognitionConfig,
        frames: FrameStream,
    ) -> Result<ResponseStream>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
