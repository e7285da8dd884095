use std::time::Duration;

use anyhow::{ensure, Result};
use serde::Deserialize;

use crate::audio::CaptureConfig;
use crate::bus::{Capability, RoutingTable};
use crate::retry::RetryPolicy;
use crate::speech::{AudioEncoding, RecognitionConfig, VoiceConfig};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub bus: BusConfig,
    pub speech: SpeechConfig,
    pub playback: PlaybackConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "ptt-bridge".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8088,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_samples: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            frame_samples: 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub url: String,
    pub client_id: String,
    pub topics: TopicsConfig,
    pub retry: RetryConfig,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            client_id: "ptt-bridge".to_string(),
            topics: TopicsConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    /// Inbound: text recognised from sign language
    pub sign_to_text: String,
    /// Inbound: canned replies
    pub quick_response: String,
    /// Outbound: our own recognised speech
    pub speech_to_text: String,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            sign_to_text: "band.sign_to_text".to_string(),
            quick_response: "band.quick_response".to_string(),
            speech_to_text: "bridge.speech_to_text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub base_interval_ms: u64,
    pub max_interval_ms: u64,
    pub jitter_ms: u64,
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: 5_000,
            max_interval_ms: 60_000,
            jitter_ms: 5_000,
            max_attempts: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// NATS server hosting the STT/TTS services
    pub nats_url: String,
    pub language_code: String,
    pub interim_results: bool,
    pub automatic_punctuation: bool,
    pub stop_timeout_ms: u64,
    pub idle_timeout_ms: u64,
    pub frame_subject_prefix: String,
    pub transcript_subject: String,
    pub synthesis_subject: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://localhost:4222".to_string(),
            language_code: "en-US".to_string(),
            interim_results: true,
            automatic_punctuation: true,
            stop_timeout_ms: 2_000,
            idle_timeout_ms: 10_000,
            frame_subject_prefix: "audio.frame".to_string(),
            transcript_subject: "stt.text.>".to_string(),
            synthesis_subject: "tts.synthesize".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub language_code: String,
    pub voice_name: Option<String>,
    pub audio_encoding: AudioEncoding,
    pub interrupt_delay_ms: u64,
    pub sign_prefix: String,
    pub quick_response_prefix: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            language_code: "en-US".to_string(),
            voice_name: None,
            audio_encoding: AudioEncoding::Mp3,
            interrupt_delay_ms: 300,
            sign_prefix: "Received sign".to_string(),
            quick_response_prefix: "Quick response".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from an optional file plus `PTT_BRIDGE__*` env vars
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("PTT_BRIDGE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the audio and retry loops cannot run with
    pub fn validate(&self) -> Result<()> {
        ensure!(self.audio.sample_rate > 0, "audio.sample_rate must be greater than zero");
        ensure!(self.audio.channels > 0, "audio.channels must be greater than zero");
        ensure!(self.audio.frame_samples > 0, "audio.frame_samples must be greater than zero");
        ensure!(
            self.bus.retry.max_attempts > 0,
            "bus.retry.max_attempts must be greater than zero"
        );
        Ok(())
    }

    pub fn capture(&self) -> CaptureConfig {
        CaptureConfig {
            sample_rate: self.audio.sample_rate,
            channels: self.audio.channels,
            frame_samples: self.audio.frame_samples,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = &self.bus.retry;
        RetryPolicy {
            base_interval: Duration::from_millis(retry.base_interval_ms),
            max_interval: Duration::from_millis(retry.max_interval_ms),
            jitter_span: Duration::from_millis(retry.jitter_ms),
            max_attempts: retry.max_attempts,
        }
    }

    pub fn recognition(&self) -> RecognitionConfig {
        RecognitionConfig {
            sample_rate: self.audio.sample_rate,
            encoding: AudioEncoding::Linear16,
            language_code: self.speech.language_code.clone(),
            interim_results: self.speech.interim_results,
            automatic_punctuation: self.speech.automatic_punctuation,
            idle_timeout: Duration::from_millis(self.speech.idle_timeout_ms),
        }
    }

    pub fn voice(&self) -> VoiceConfig {
        VoiceConfig {
            language_code: self.playback.language_code.clone(),
            name: self.playback.voice_name.clone(),
        }
    }

    /// Build the fixed topic routing table
    pub fn routes(&self) -> RoutingTable {
        let topics = &self.bus.topics;
        RoutingTable::new([
            (
                topics.sign_to_text.clone(),
                Capability::DisplayAndSpeak {
                    sender: "Band (Sign)".to_string(),
                    prefix: self.playback.sign_prefix.clone(),
                },
            ),
            (
                topics.quick_response.clone(),
                Capability::DisplayAndSpeak {
                    sender: "Band (Quick)".to_string(),
                    prefix: self.playback.quick_response_prefix.clone(),
                },
            ),
            (topics.speech_to_text.clone(), Capability::VoiceOut),
        ])
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.speech.stop_timeout_ms)
    }

    pub fn interrupt_delay(&self) -> Duration {
        Duration::from_millis(self.playback.interrupt_delay_ms)
    }
}
