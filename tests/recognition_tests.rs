mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{settle, FakeMicFactory, ScriptedRecognizer};
use ptt_bridge::audio::{AudioCaptureSource, CaptureBackendFactory, CaptureConfig};
use ptt_bridge::speech::{
    EndReason, RecognitionConfig, RecognitionEvent, RecognitionResponse, RecognitionResult,
    StreamingRecognitionSession, TranscriptEvent,
};
use ptt_bridge::Error;
use tokio::sync::mpsc;

struct Harness {
    mic: FakeMicFactory,
    recognizer: Arc<ScriptedRecognizer>,
    session: StreamingRecognitionSession,
}

impl Harness {
    fn new() -> Self {
        let recognizer = Arc::new(ScriptedRecognizer::default());
        let session = StreamingRecognitionSession::new(
            recognizer.clone(),
            RecognitionConfig::default(),
            Duration::from_secs(2),
        );

        Self {
            mic: FakeMicFactory::default(),
            recognizer,
            session,
        }
    }

    fn capture(&self) -> Arc<AudioCaptureSource> {
        let capture = Arc::new(AudioCaptureSource::new(
            self.mic.create(),
            CaptureConfig::default(),
        ));
        capture.open().unwrap();
        capture
    }

    async fn start(
        &self,
        capture: Arc<AudioCaptureSource>,
    ) -> ptt_bridge::Result<mpsc::UnboundedReceiver<RecognitionEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.session.start(capture, move |event| {
            let _ = tx.send(event);
        })?;
        settle().await;
        Ok(rx)
    }
}

fn transcript(text: &str, is_final: bool) -> RecognitionEvent {
    RecognitionEvent::Transcript(TranscriptEvent {
        text: text.to_string(),
        is_final,
    })
}

#[tokio::test]
async fn test_second_start_rejected_while_listening() {
    let h = Harness::new();
    let mut events = h.start(h.capture()).await.unwrap();

    let second = h.capture();
    let err = h.start(Arc::clone(&second)).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyActive(_)));

    // First session keeps working
    assert!(h.session.is_listening());
    assert_eq!(h.recognizer.sessions(), 1);
    h.recognizer.final_transcript("still here");
    assert_eq!(events.recv().await, Some(transcript("still here", true)));
}

#[tokio::test]
async fn test_stop_when_idle_is_noop() {
    let h = Harness::new();

    h.session.stop().await;
    h.session.stop().await;

    assert!(!h.session.is_listening());
    assert_eq!(h.session.current_id(), None);
}

#[tokio::test]
async fn test_empty_responses_skipped() {
    let h = Harness::new();
    let mut events = h.start(h.capture()).await.unwrap();

    h.recognizer.respond(RecognitionResponse::default());
    h.recognizer.respond(RecognitionResponse {
        results: vec![RecognitionResult::default()],
    });
    h.recognizer.interim("turn on");
    h.recognizer.final_transcript("turn on the light");

    assert_eq!(events.recv().await, Some(transcript("turn on", false)));
    assert_eq!(events.recv().await, Some(transcript("turn on the light", true)));
}

#[tokio::test]
async fn test_stop_flushes_frames_and_reports_stopped() {
    let h = Harness::new();
    let capture = h.capture();
    let mut events = h.start(Arc::clone(&capture)).await.unwrap();

    let sink = h.mic.sink();
    for value in 0..3i16 {
        sink.push_samples(&[value; 1024]);
    }

    h.session.stop().await;

    assert!(!h.session.is_listening());
    assert!(!capture.is_open());
    assert_eq!(h.recognizer.frame_sequences(), vec![0, 1, 2]);
    assert_eq!(events.recv().await, Some(RecognitionEvent::Ended(EndReason::Stopped)));
}

#[tokio::test]
async fn test_concurrent_stops_collapse() {
    let h = Harness::new();
    let mut events = h.start(h.capture()).await.unwrap();

    tokio::join!(h.session.stop(), h.session.stop());

    assert_eq!(events.recv().await, Some(RecognitionEvent::Ended(EndReason::Stopped)));
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn test_transport_error_ends_session() {
    let h = Harness::new();
    let capture = h.capture();
    let mut events = h.start(Arc::clone(&capture)).await.unwrap();

    h.recognizer.interim("hel");
    h.recognizer.fail("stream reset");

    assert_eq!(events.recv().await, Some(transcript("hel", false)));
    match events.recv().await {
        Some(RecognitionEvent::Ended(EndReason::Failed(message))) => {
            assert!(message.contains("stream reset"))
        }
        other => panic!("expected failure, got {:?}", other),
    }

    assert!(!h.session.is_listening());
    assert!(!capture.is_open());

    // Idle again: a new session may start
    let _events = h.start(h.capture()).await.unwrap();
    assert!(h.session.is_listening());
    assert_eq!(h.recognizer.sessions(), 2);
}

#[tokio::test]
async fn test_backend_start_failure_ends_session() {
    let h = Harness::new();
    h.recognizer
        .fail_start
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let capture = h.capture();
    let mut events = h.start(Arc::clone(&capture)).await.unwrap();

    assert!(matches!(
        events.recv().await,
        Some(RecognitionEvent::Ended(EndReason::Failed(_)))
    ));
    assert!(!h.session.is_listening());
    assert!(!capture.is_open());
}

#[tokio::test]
async fn test_service_closing_stream_ends_session() {
    let h = Harness::new();
    let mut events = h.start(h.capture()).await.unwrap();

    h.recognizer.final_transcript("done");
    h.recognizer.close_stream();

    assert_eq!(events.recv().await, Some(transcript("done", true)));
    assert_eq!(
        events.recv().await,
        Some(RecognitionEvent::Ended(EndReason::StreamClosed))
    );
    assert!(!h.session.is_listening());

    // Late stop after the session wound down on its own
    h.session.stop().await;
}
