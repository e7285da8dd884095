use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, info, warn};

use super::recognition::AudioEncoding;
use super::synthesis::{SpeechSynthesizer, SynthesisRequest, VoiceConfig};
use crate::audio::AudioOutput;

/// What happened to a `speak` request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Empty text, muted, or controller closed
    Skipped,
    /// Playback started
    Played,
    /// A later `speak` or `stop_speaking` arrived while synthesizing
    Superseded,
    /// Synthesis or playback start failed (already logged)
    Failed,
}

/// Synthesizes text and plays it, yielding to newer requests and to live capture
///
/// Each `speak` call is a playback session identified by a generation number.
/// Starting a new one stops the current playback; a synthesis that finishes
/// after being superseded is discarded instead of played.
pub struct PlaybackController {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    output: Arc<dyn AudioOutput>,
    voice: VoiceConfig,
    encoding: AudioEncoding,
    generation: AtomicU64,
    /// Held while checking the generation and touching the output
    output_lock: Mutex<()>,
    muted: AtomicBool,
    closed: AtomicBool,
}

impl PlaybackController {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        output: Arc<dyn AudioOutput>,
        voice: VoiceConfig,
        encoding: AudioEncoding,
    ) -> Self {
        Self {
            synthesizer,
            output,
            voice,
            encoding,
            generation: AtomicU64::new(0),
            output_lock: Mutex::new(()),
            muted: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub async fn speak(&self, text: &str) -> SpeakOutcome {
        if text.is_empty() {
            warn!("No text provided to speak");
            return SpeakOutcome::Skipped;
        }
        if self.closed.load(Ordering::SeqCst) {
            warn!("Playback closed, not speaking: {}", text);
            return SpeakOutcome::Skipped;
        }
        if self.muted.load(Ordering::SeqCst) {
            debug!("Muted, skipping speech: {}", text);
            return SpeakOutcome::Skipped;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.output.stop();

        let request = SynthesisRequest {
            text: text.to_string(),
            voice: self.voice.clone(),
            audio_encoding: self.encoding,
        };

        let response = match self.synthesizer.synthesize(request).await {
            Ok(response) => response,
            Err(e) => {
                error!("Speech synthesis failed: {}", e);
                return SpeakOutcome::Failed;
            }
        };

        self.play_if_current(generation, response.audio, text)
    }

    fn play_if_current(&self, generation: u64, audio: Vec<u8>, text: &str) -> SpeakOutcome {
        let _output = self.output_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if self.generation.load(Ordering::SeqCst) != generation
            || self.closed.load(Ordering::SeqCst)
            || self.muted.load(Ordering::SeqCst)
        {
            info!("Discarding superseded synthesis: {}", text);
            return SpeakOutcome::Superseded;
        }

        match self.output.play(audio) {
            Ok(()) => {
                info!("Speaking: {}", text);
                SpeakOutcome::Played
            }
            Err(e) => {
                error!("Playback failed: {}", e);
                SpeakOutcome::Failed
            }
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.output.is_playing()
    }

    /// Halt playback now and drop any synthesis still in flight
    pub fn stop_speaking(&self) {
        let _output = self.output_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::SeqCst);
        if self.output.is_playing() {
            self.output.stop();
            info!("Playback stopped");
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    /// Muting also silences anything currently playing
    pub fn set_muted(&self, muted: bool) {
        if self.muted.swap(muted, Ordering::SeqCst) == muted {
            return;
        }
        if muted {
            self.stop_speaking();
        }
        info!("Audio {}", if muted { "muted" } else { "unmuted" });
    }

    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_speaking();
        self.output.close();
        info!("Playback controller closed");
    }
}
