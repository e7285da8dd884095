use serde::{Deserialize, Serialize};

use crate::speech::{AudioEncoding, VoiceConfig};

/// Audio frame message published to the STT service
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    pub session_id: String,
    pub sequence: u64,
    pub pcm: String, // Base64-encoded PCM bytes
    pub sample_rate: u32,
    pub channels: u16,
    pub language_code: String,
    pub interim_results: bool,
    pub timestamp: String, // RFC3339 timestamp
    #[serde(rename = "final")]
    pub final_frame: bool,
}

/// Transcript message received from the STT service
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub session_id: String,
    pub text: String,
    pub partial: bool,
    pub timestamp: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Request sent to the TTS service
#[derive(Debug, Serialize, Deserialize)]
pub struct SynthesisRequestMessage {
    pub text: String,
    pub voice: VoiceConfig,
    pub audio_encoding: AudioEncoding,
}

/// Reply from the TTS service
#[derive(Debug, Serialize, Deserialize)]
pub struct SynthesisReplyMessage {
    /// Base64-encoded audio; empty on error
    #[serde(default)]
    pub audio: String,
    #[serde(default)]
    pub error: Option<String>,
}
