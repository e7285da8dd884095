// STT / TTS services reached over NATS
//
// Recognition: frames go out on `<prefix>.<session_id>`, transcripts come back
// on the transcript subject and are filtered by session id.
// Synthesis: request/reply on the synthesis subject.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_nats::{Client, Subscriber};
use base64::Engine;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::messages::{
    AudioFrameMessage, SynthesisReplyMessage, SynthesisRequestMessage, TranscriptMessage,
};
use crate::audio::FrameStream;
use crate::speech::{
    RecognitionAlternative, RecognitionBackend, RecognitionConfig, RecognitionResponse,
    RecognitionResult, ResponseStream, SpeechSynthesizer, SynthesisRequest, SynthesisResponse,
};
use crate::{Error, Result};

/// Connect the client shared by the speech services
pub async fn connect_speech_client(url: &str) -> anyhow::Result<Client> {
    info!("Connecting to speech services at {}", url);

    let client = async_nats::connect(url)
        .await
        .context("Failed to connect to NATS speech services")?;

    info!("Connected to speech services");
    Ok(client)
}

async fn publish_json<T: Serialize>(client: &Client, subject: &str, message: &T) -> Result<()> {
    let payload = serde_json::to_vec(message)?;
    client
        .publish(subject.to_string(), payload.into())
        .await
        .map_err(|e| Error::Transport(format!("failed to publish to {subject}: {e}")))
}

/// Streaming recognizer backed by an STT service on NATS
pub struct NatsRecognizer {
    client: Client,
    frame_subject_prefix: String,
    transcript_subject: String,
}

impl NatsRecognizer {
    pub fn new(
        client: Client,
        frame_subject_prefix: impl Into<String>,
        transcript_subject: impl Into<String>,
    ) -> Self {
        Self {
            client,
            frame_subject_prefix: frame_subject_prefix.into(),
            transcript_subject: transcript_subject.into(),
        }
    }
}

#[async_trait::async_trait]
impl RecognitionBackend for NatsRecognizer {
    async fn streaming_recognize(
        &self,
        config: &RecognitionConfig,
        mut frames: FrameStream,
    ) -> Result<ResponseStream> {
        let session_id = format!("ptt-{}", uuid::Uuid::new_v4());

        // Subscribe before the first frame goes out so no transcript is missed
        let subscriber = self
            .client
            .subscribe(self.transcript_subject.clone())
            .await
            .map_err(|e| Error::Transport(format!("failed to subscribe to transcripts: {e}")))?;

        let audio_done = Arc::new(AtomicBool::new(false));
        let subject = format!("{}.{}", self.frame_subject_prefix, session_id);
        let client = self.client.clone();
        let uplink_session = session_id.clone();
        let uplink_done = Arc::clone(&audio_done);
        let language_code = config.language_code.clone();
        let interim_results = config.interim_results;

        tokio::spawn(async move {
            let mut next_sequence = 0;

            while let Some(frame) = frames.next_frame().await {
                let message = AudioFrameMessage {
                    session_id: uplink_session.clone(),
                    sequence: frame.sequence,
                    pcm: base64::engine::general_purpose::STANDARD.encode(&frame.pcm),
                    sample_rate: frame.sample_rate,
                    channels: frame.channels,
                    language_code: language_code.clone(),
                    interim_results,
                    timestamp: chrono::Utc::now().to_rfc3339(),
                    final_frame: false,
                };
                next_sequence = frame.sequence + 1;

                if let Err(e) = publish_json(&client, &subject, &message).await {
                    error!("Failed to publish audio frame: {}", e);
                    break;
                }
            }

            let marker = AudioFrameMessage {
                session_id: uplink_session,
                sequence: next_sequence,
                pcm: String::new(),
                sample_rate: 0,
                channels: 0,
                language_code,
                interim_results,
                timestamp: chrono::Utc::now().to_rfc3339(),
                final_frame: true,
            };
            if let Err(e) = publish_json(&client, &subject, &marker).await {
                error!("Failed to publish final frame marker: {}", e);
            }

            uplink_done.store(true, Ordering::SeqCst);
            debug!("Audio uplink finished after {} frames", next_sequence);
        });

        info!("Streaming recognition started ({})", session_id);

        let downlink = Downlink {
            subscriber,
            session_id,
            audio_done,
            idle_timeout: config.idle_timeout,
            finished: false,
        };

        Ok(stream::unfold(downlink, Downlink::next_response).boxed())
    }

    fn name(&self) -> &str {
        "NATS STT"
    }
}

struct Downlink {
    subscriber: Subscriber,
    session_id: String,
    audio_done: Arc<AtomicBool>,
    idle_timeout: Duration,
    finished: bool,
}

impl Downlink {
    async fn next_response(mut self) -> Option<(Result<RecognitionResponse>, Self)> {
        if self.finished {
            return None;
        }

        loop {
            let message = match tokio::time::timeout(self.idle_timeout, self.subscriber.next()).await
            {
                Ok(Some(message)) => message,
                Ok(None) => return None,
                Err(_) => {
                    self.finished = true;
                    let error = Error::Transport(format!(
                        "no transcript within {:?}",
                        self.idle_timeout
                    ));
                    return Some((Err(error), self));
                }
            };

            let transcript = match serde_json::from_slice::<TranscriptMessage>(&message.payload) {
                Ok(transcript) => transcript,
                Err(e) => {
                    warn!("Failed to parse transcript message: {}", e);
                    continue;
                }
            };

            if transcript.session_id != self.session_id {
                continue;
            }

            // The last final after the uplink closed ends the exchange
            if !transcript.partial && self.audio_done.load(Ordering::SeqCst) {
                self.finished = true;
            }

            let response = RecognitionResponse {
                results: vec![RecognitionResult {
                    alternatives: vec![RecognitionAlternative {
                        transcript: transcript.text,
                        confidence: transcript.confidence,
                    }],
                    is_final: !transcript.partial,
                }],
            };

            return Some((Ok(response), self));
        }
    }
}

/// Synthesizer backed by a TTS service on NATS (request/reply)
pub struct NatsSynthesizer {
    client: Client,
    subject: String,
}

impl NatsSynthesizer {
    pub fn new(client: Client, subject: impl Into<String>) -> Self {
        Self {
            client,
            subject: subject.into(),
        }
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for NatsSynthesizer {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesisResponse> {
        let message = SynthesisRequestMessage {
            text: request.text,
            voice: request.voice,
            audio_encoding: request.audio_encoding,
        };
        let payload = serde_json::to_vec(&message)?;

        let reply = self
            .client
            .request(self.subject.clone(), payload.into())
            .await
            .map_err(|e| Error::Transport(format!("synthesis request failed: {e}")))?;

        let reply: SynthesisReplyMessage = serde_json::from_slice(&reply.payload)?;
        if let Some(error) = reply.error {
            return Err(Error::Transport(format!("synthesis service error: {error}")));
        }

        let audio = base64::engine::general_purpose::STANDARD
            .decode(reply.audio)
            .map_err(|e| Error::Transport(format!("invalid synthesized audio: {e}")))?;

        debug!("Synthesized {} bytes of audio", audio.len());
        Ok(SynthesisResponse { audio })
    }
}
