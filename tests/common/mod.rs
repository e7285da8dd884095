// Fakes shared by the integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use ptt_bridge::audio::{AudioFrame, AudioOutput, CaptureBackend, CaptureBackendFactory, CaptureConfig, FrameSink, FrameStream};
use ptt_bridge::bus::{BusConnector, BusLink, LinkEvent, RoutingTable};
use ptt_bridge::retry::RetryPolicy;
use ptt_bridge::speech::{
    RecognitionBackend, RecognitionConfig, RecognitionResponse, ResponseStream, SpeechSynthesizer,
    SynthesisRequest, SynthesisResponse,
};
use ptt_bridge::{Config, Error, Result};
use tokio::sync::mpsc;

pub const SIGN_TOPIC: &str = "band.sign_to_text";
pub const QUICK_TOPIC: &str = "band.quick_response";
pub const VOICE_TOPIC: &str = "bridge.speech_to_text";

pub fn routes() -> RoutingTable {
    Config::default().routes()
}

pub fn short_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        base_interval: Duration::from_millis(100),
        max_interval: Duration::from_secs(1),
        jitter_span: Duration::from_millis(50),
        max_attempts,
    }
}

/// Give spawned tasks a moment to run
///
/// Under a paused clock this returns once every other task is idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

// ---------------------------------------------------------------------------
// Microphone
// ---------------------------------------------------------------------------

/// Microphone stand-in; the test pushes PCM through the captured sinks
#[derive(Default)]
pub struct FakeMicFactory {
    pub sinks: Arc<Mutex<Vec<FrameSink>>>,
    pub fail_open: Arc<AtomicBool>,
    pub stops: Arc<AtomicUsize>,
}

impl FakeMicFactory {
    /// Sink of the most recently opened capture
    pub fn sink(&self) -> FrameSink {
        self.sinks.lock().unwrap().last().cloned().expect("no capture opened")
    }

    pub fn opened(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }

    pub fn backend(&self) -> FakeMic {
        FakeMic {
            sinks: Arc::clone(&self.sinks),
            fail_open: Arc::clone(&self.fail_open),
            stops: Arc::clone(&self.stops),
        }
    }
}

impl CaptureBackendFactory for FakeMicFactory {
    fn create(&self) -> Box<dyn CaptureBackend> {
        Box::new(self.backend())
    }
}

pub struct FakeMic {
    sinks: Arc<Mutex<Vec<FrameSink>>>,
    fail_open: Arc<AtomicBool>,
    stops: Arc<AtomicUsize>,
}

impl CaptureBackend for FakeMic {
    fn start(&mut self, _config: &CaptureConfig, sink: FrameSink) -> Result<()> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(Error::Device("no input device available".to_string()));
        }
        self.sinks.lock().unwrap().push(sink);
        Ok(())
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "fake mic"
    }
}

// ---------------------------------------------------------------------------
// Recognition
// ---------------------------------------------------------------------------

enum Script {
    Respond(Result<RecognitionResponse>),
    Close,
}

/// Recognizer driven by the test
///
/// Records every frame it is sent. Its response stream ends once the
/// frame stream ends, like a service answering the final audio marker.
#[derive(Default)]
pub struct ScriptedRecognizer {
    scripts: Mutex<Vec<mpsc::UnboundedSender<Script>>>,
    pub frames: Arc<Mutex<Vec<AudioFrame>>>,
    pub fail_start: AtomicBool,
}

impl ScriptedRecognizer {
    pub fn sessions(&self) -> usize {
        self.scripts.lock().unwrap().len()
    }

    fn latest(&self) -> mpsc::UnboundedSender<Script> {
        self.scripts.lock().unwrap().last().cloned().expect("no recognition session")
    }

    pub fn respond(&self, response: RecognitionResponse) {
        let _ = self.latest().send(Script::Respond(Ok(response)));
    }

    pub fn interim(&self, text: &str) {
        self.respond(RecognitionResponse::transcript(text, false));
    }

    pub fn final_transcript(&self, text: &str) {
        self.respond(RecognitionResponse::transcript(text, true));
    }

    pub fn fail(&self, message: &str) {
        let _ = self
            .latest()
            .send(Script::Respond(Err(Error::Transport(message.to_string()))));
    }

    pub fn close_stream(&self) {
        let _ = self.latest().send(Script::Close);
    }

    pub fn frame_sequences(&self) -> Vec<u64> {
        self.frames.lock().unwrap().iter().map(|f| f.sequence).collect()
    }
}

#[async_trait::async_trait]
impl RecognitionBackend for ScriptedRecognizer {
    async fn streaming_recognize(
        &self,
        _config: &RecognitionConfig,
        mut frames: FrameStream,
    ) -> Result<ResponseStream> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(Error::Transport("recognition service unavailable".to_string()));
        }

        let (script_tx, script_rx) = mpsc::unbounded_channel();
        self.scripts.lock().unwrap().push(script_tx.clone());

        let recorded = Arc::clone(&self.frames);
        tokio::spawn(async move {
            while let Some(frame) = frames.next_frame().await {
                recorded.lock().unwrap().push(frame);
            }
            let _ = script_tx.send(Script::Close);
        });

        let responses = stream::unfold(script_rx, |mut scripts| async move {
            match scripts.recv().await {
                Some(Script::Respond(response)) => Some((response, scripts)),
                Some(Script::Close) | None => None,
            }
        });

        Ok(responses.boxed())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ---------------------------------------------------------------------------
// Synthesis and output
// ---------------------------------------------------------------------------

/// Returns the text bytes as "audio" after an optional delay
#[derive(Default)]
pub struct FakeSynthesizer {
    pub requests: Mutex<Vec<String>>,
    pub delay: Mutex<Duration>,
    pub fail: AtomicBool,
}

impl FakeSynthesizer {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Mutex::new(delay),
            ..Self::default()
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesisResponse> {
        self.requests.lock().unwrap().push(request.text.clone());

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Transport("synthesis service unavailable".to_string()));
        }

        Ok(SynthesisResponse {
            audio: request.text.into_bytes(),
        })
    }
}

/// Speaker stand-in; stays "playing" until stopped
#[derive(Default)]
pub struct FakeOutput {
    pub played: Mutex<Vec<String>>,
    pub playing: AtomicBool,
    pub stops: AtomicUsize,
    pub closed: AtomicBool,
}

impl FakeOutput {
    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }
}

impl AudioOutput for FakeOutput {
    fn play(&self, audio: Vec<u8>) -> Result<()> {
        let text = String::from_utf8(audio).map_err(|e| Error::Device(e.to_string()))?;
        self.played.lock().unwrap().push(text);
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Broker
// ---------------------------------------------------------------------------

/// Everything the fake broker saw
#[derive(Default)]
pub struct FakeBroker {
    pub published: Mutex<Vec<(String, String)>>,
    pub subscriptions: Mutex<Vec<String>>,
    pub events: Mutex<Option<mpsc::UnboundedSender<LinkEvent>>>,
    pub links_closed: AtomicUsize,
}

impl FakeBroker {
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn deliver(&self, topic: &str, payload: &[u8]) {
        let events = self.events.lock().unwrap();
        let events = events.as_ref().expect("no live link");
        let _ = events.send(LinkEvent::Message {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
    }

    pub fn drop_connection(&self) {
        if let Some(events) = self.events.lock().unwrap().take() {
            let _ = events.send(LinkEvent::Disconnected);
        }
    }
}

/// Connector that fails a scripted number of times before succeeding
pub struct FakeConnector {
    pub broker: Arc<FakeBroker>,
    failures_remaining: AtomicU32,
    pub attempts: AtomicU32,
}

impl FakeConnector {
    pub fn reachable() -> Self {
        Self::failing(0)
    }

    pub fn unreachable() -> Self {
        Self::failing(u32::MAX)
    }

    pub fn failing(times: u32) -> Self {
        Self {
            broker: Arc::new(FakeBroker::default()),
            failures_remaining: AtomicU32::new(times),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, times: u32) {
        self.failures_remaining.store(times, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl BusConnector for FakeConnector {
    async fn connect(&self, events: mpsc::UnboundedSender<LinkEvent>) -> Result<Box<dyn BusLink>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            }
            return Err(Error::Connectivity("connection refused".to_string()));
        }

        *self.broker.events.lock().unwrap() = Some(events);
        Ok(Box::new(FakeLink {
            broker: Arc::clone(&self.broker),
        }))
    }

    fn endpoint(&self) -> String {
        "fake://broker".to_string()
    }
}

pub struct FakeLink {
    broker: Arc<FakeBroker>,
}

#[async_trait::async_trait]
impl BusLink for FakeLink {
    async fn subscribe(&self, topic: &str) -> Result<()> {
        self.broker.subscriptions.lock().unwrap().push(topic.to_string());
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let text = String::from_utf8(payload).map_err(|e| Error::Transport(e.to_string()))?;
        self.broker.published.lock().unwrap().push((topic.to_string(), text));
        Ok(())
    }

    async fn close(&self) {
        self.broker.links_closed.fetch_add(1, Ordering::SeqCst);
    }
}
