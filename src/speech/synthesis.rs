use serde::{Deserialize, Serialize};

use super::recognition::AudioEncoding;
use crate::Result;

/// Voice selection for synthesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceConfig {
    pub language_code: String,
    /// Specific voice, e.g. "en-US-Standard-C"; service default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language_code: "en-US".to_string(),
            name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: VoiceConfig,
    pub audio_encoding: AudioEncoding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisResponse {
    /// Encoded audio in the requested encoding
    pub audio: Vec<u8>,
}

/// Text-to-speech service
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesisResponse>;
}
