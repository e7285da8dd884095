use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::stream::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::recognition::{
    EndReason, RecognitionBackend, RecognitionConfig, RecognitionEvent, ResponseStream,
};
use crate::audio::AudioCaptureSource;
use crate::{Error, Result};

type EventCallback = Arc<dyn Fn(RecognitionEvent) + Send + Sync>;

/// Drives one push-to-talk utterance at a time through a streaming recognizer
///
/// `start` returns immediately; the exchange runs on its own tokio task and
/// reports through the callback. Stopping is cooperative: the listening flag
/// is checked between responses, so one late response may still arrive.
pub struct StreamingRecognitionSession {
    backend: Arc<dyn RecognitionBackend>,
    config: RecognitionConfig,
    stop_timeout: Duration,
    current: Arc<Mutex<Option<ActiveRun>>>,
    next_id: AtomicU64,
}

struct ActiveRun {
    id: u64,
    listening: Arc<AtomicBool>,
    capture: Arc<AudioCaptureSource>,
    task: Option<JoinHandle<()>>,
}

impl StreamingRecognitionSession {
    pub fn new(
        backend: Arc<dyn RecognitionBackend>,
        config: RecognitionConfig,
        stop_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            config,
            stop_timeout,
            current: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }

    /// Start streaming frames from `capture`
    ///
    /// Returns the new session id. Fails with `AlreadyActive` while another
    /// session is listening; that session is left untouched.
    pub fn start<F>(&self, capture: Arc<AudioCaptureSource>, on_event: F) -> Result<u64>
    where
        F: Fn(RecognitionEvent) + Send + Sync + 'static,
    {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);

        if current
            .as_ref()
            .is_some_and(|run| run.listening.load(Ordering::SeqCst))
        {
            warn!("Already listening, rejecting new recognition session");
            return Err(Error::AlreadyActive(
                "a recognition session is already listening".to_string(),
            ));
        }

        let frames = capture.frames().ok_or_else(|| {
            Error::AlreadyActive("capture frames already consumed".to_string())
        })?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let listening = Arc::new(AtomicBool::new(true));
        let on_event: EventCallback = Arc::new(on_event);

        let backend = Arc::clone(&self.backend);
        let config = self.config.clone();
        let task_listening = Arc::clone(&listening);
        let task_capture = Arc::clone(&capture);
        let slot = Arc::clone(&self.current);

        let task = tokio::spawn(async move {
            let outcome = match backend.streaming_recognize(&config, frames).await {
                Ok(responses) => pump(responses, &task_listening, on_event.as_ref()).await,
                Err(e) => Err(e),
            };

            let reason = match outcome {
                Ok(()) if task_listening.load(Ordering::SeqCst) => EndReason::StreamClosed,
                Ok(()) => EndReason::Stopped,
                Err(e) => {
                    error!("Recognition error in session {}: {}", id, e);
                    EndReason::Failed(e.to_string())
                }
            };

            info!("Recognition task for session {} finished", id);

            // Nobody called stop(): wind down quietly
            if task_listening.swap(false, Ordering::SeqCst) {
                task_capture.close();
                let mut current = slot.lock().unwrap_or_else(PoisonError::into_inner);
                if current.as_ref().is_some_and(|run| run.id == id) {
                    *current = None;
                }
            }

            on_event(RecognitionEvent::Ended(reason));
        });

        *current = Some(ActiveRun {
            id,
            listening,
            capture,
            task: Some(task),
        });

        info!(
            "Recognition session {} started on {} ({}, interim={})",
            id, self.backend.name(), self.config.language_code, self.config.interim_results
        );

        Ok(id)
    }

    /// Stop the current session; a no-op (with a warning) when idle
    pub async fn stop(&self) {
        self.shutdown(false).await;
    }

    /// Stop without complaining when idle
    pub async fn close(&self) {
        self.shutdown(true).await;
    }

    pub fn is_listening(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|run| run.listening.load(Ordering::SeqCst))
    }

    /// Id of the session currently listening
    pub fn current_id(&self) -> Option<u64> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|run| run.listening.load(Ordering::SeqCst))
            .map(|run| run.id)
    }

    async fn shutdown(&self, silent: bool) {
        let run = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(mut run) = run else {
            if !silent {
                warn!("Not currently listening");
            }
            return;
        };

        run.listening.store(false, Ordering::SeqCst);
        run.capture.close();

        if let Some(task) = run.task.take() {
            debug!("Waiting for recognition task {} to finish", run.id);
            match tokio::time::timeout(self.stop_timeout, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Recognition task panicked: {}", e),
                Err(_) => warn!(
                    "Recognition task {} did not finish within {:?}",
                    run.id, self.stop_timeout
                ),
            }
        }

        info!("Stopped listening (session {})", run.id);
    }
}

async fn pump(
    mut responses: ResponseStream,
    listening: &AtomicBool,
    on_event: &(dyn Fn(RecognitionEvent) + Send + Sync),
) -> Result<()> {
    let mut echo = LocalEcho::default();

    while let Some(response) = responses.next().await {
        if !listening.load(Ordering::SeqCst) {
            break;
        }

        let Some(event) = response?.top_transcript() else {
            continue;
        };

        if event.is_final {
            info!("Final transcript: {}", event.text);
            echo.finish();
        } else {
            echo.interim(&event.text);
        }

        on_event(RecognitionEvent::Transcript(event));
    }

    debug!("Recognition response loop ended");
    Ok(())
}

/// Console-style overwrite of interim hypotheses in the debug log
#[derive(Default)]
struct LocalEcho {
    chars_printed: usize,
}

impl LocalEcho {
    fn interim(&mut self, text: &str) {
        let padding = self.chars_printed.saturating_sub(text.len());
        debug!("Interim: {}{}", text, " ".repeat(padding));
        self.chars_printed = text.len();
    }

    fn finish(&mut self) {
        self.chars_printed = 0;
    }
}
