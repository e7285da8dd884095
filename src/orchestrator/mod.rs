//! Push-to-talk session orchestration
//!
//! A single actor task owns the session state. PTT presses, recognition
//! events and inbound bus messages all arrive as messages, so nothing here
//! needs a lock:
//! - press: open the microphone and start recognition, deferring briefly when
//!   playback has to be interrupted first
//! - final transcript: show it and publish it on the voice-out topic
//! - inbound sign / quick response: show it and speak it

mod display;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

pub use display::{run_display, ConversationEntry, DisplayEvent, DisplaySender, DisplayState};

use crate::audio::{AudioCaptureSource, CaptureBackendFactory, CaptureConfig};
use crate::bus::{Capability, ConnectionState, InboundMessage, ResilientPubSubClient};
use crate::Error;
use crate::speech::{
    EndReason, PlaybackController, RecognitionEvent, StreamingRecognitionSession, TranscriptEvent,
};

const VOICE_SENDER: &str = "You (Voice)";

/// Collaborators the orchestrator drives
pub struct OrchestratorParts {
    pub capture_factory: Arc<dyn CaptureBackendFactory>,
    pub capture_config: CaptureConfig,
    pub recognition: Arc<StreamingRecognitionSession>,
    pub playback: Arc<PlaybackController>,
    pub bus: ResilientPubSubClient,
    /// Where final transcripts are published
    pub voice_out_topic: String,
    /// Pause between interrupting playback and opening the microphone
    pub interrupt_delay: Duration,
    pub display: DisplaySender,
}

enum Command {
    StartListening,
    StopListening,
    BeginCapture { ticket: u64 },
    Recognition { generation: u64, event: RecognitionEvent },
    ToggleMute { reply: oneshot::Sender<bool> },
    Shutdown { done: oneshot::Sender<()> },
}

/// Cheap handle for driving the orchestrator from input sources
#[derive(Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl OrchestratorHandle {
    /// PTT pressed
    pub fn start_listening(&self) -> bool {
        self.commands.send(Command::StartListening).is_ok()
    }

    /// PTT released
    pub fn stop_listening(&self) -> bool {
        self.commands.send(Command::StopListening).is_ok()
    }

    /// Flip speech output mute; returns the new state
    pub async fn toggle_mute(&self) -> Option<bool> {
        let (reply, muted) = oneshot::channel();
        self.commands.send(Command::ToggleMute { reply }).ok()?;
        muted.await.ok()
    }

    /// Stop recognition, close playback, disconnect the bus
    ///
    /// Resolves once the actor has finished tearing down.
    pub async fn shutdown(&self) {
        let (done, finished) = oneshot::channel();
        if self.commands.send(Command::Shutdown { done }).is_err() {
            debug!("Orchestrator already stopped");
            return;
        }
        let _ = finished.await;
    }
}

pub struct SessionOrchestrator {
    parts: OrchestratorParts,
    commands: mpsc::UnboundedSender<Command>,
    /// Listen session whose events are still honoured
    current: Option<u64>,
    generation: u64,
    pending_ticket: Option<u64>,
    next_ticket: u64,
    heard_final: bool,
}

impl SessionOrchestrator {
    /// Spawn the actor plus a watcher that mirrors bus state to the display
    pub fn spawn(
        parts: OrchestratorParts,
        inbound: mpsc::UnboundedReceiver<InboundMessage>,
    ) -> OrchestratorHandle {
        let (commands, receiver) = mpsc::unbounded_channel();

        tokio::spawn(watch_bus(parts.bus.clone(), parts.display.clone()));

        let orchestrator = SessionOrchestrator {
            parts,
            commands: commands.clone(),
            current: None,
            generation: 0,
            pending_ticket: None,
            next_ticket: 0,
            heard_final: false,
        };
        tokio::spawn(orchestrator.run(receiver, inbound));

        OrchestratorHandle { commands }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut inbound: mpsc::UnboundedReceiver<InboundMessage>,
    ) {
        info!("Session orchestrator started");
        self.status("Ready");

        let mut inbound_open = true;
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown { done }) => {
                        self.shutdown().await;
                        let _ = done.send(());
                        break;
                    }
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                message = inbound.recv(), if inbound_open => match message {
                    Some(message) => self.on_inbound(message),
                    None => {
                        debug!("Inbound dispatch channel closed");
                        inbound_open = false;
                    }
                },
            }
        }

        info!("Session orchestrator stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::StartListening => self.start_listening().await,
            Command::StopListening => self.stop_listening().await,
            Command::BeginCapture { ticket } => {
                if self.pending_ticket == Some(ticket) {
                    self.pending_ticket = None;
                    self.begin_capture().await;
                } else {
                    debug!("Deferred capture {} was cancelled", ticket);
                }
            }
            Command::Recognition { generation, event } => {
                self.on_recognition(generation, event).await
            }
            Command::ToggleMute { reply } => {
                let muted = !self.parts.playback.is_muted();
                self.parts.playback.set_muted(muted);
                self.status(if muted { "Audio Muted" } else { "Audio Unmuted" });
                let _ = reply.send(muted);
            }
            Command::Shutdown { .. } => {}
        }
    }

    async fn start_listening(&mut self) {
        info!("Push-to-talk pressed");

        if self.pending_ticket.is_some() || self.parts.recognition.is_listening() {
            warn!("Already listening, ignoring push-to-talk");
            return;
        }

        self.status("Listening...");

        // Also discards any synthesis still in flight
        let was_speaking = self.parts.playback.is_speaking();
        self.parts.playback.stop_speaking();

        if !was_speaking {
            self.begin_capture().await;
            return;
        }

        info!("Interrupted playback, deferring capture");

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.pending_ticket = Some(ticket);

        let commands = self.commands.clone();
        let delay = self.parts.interrupt_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = commands.send(Command::BeginCapture { ticket });
        });
    }

    async fn begin_capture(&mut self) {
        let backend = self.parts.capture_factory.create();
        let capture = Arc::new(AudioCaptureSource::new(
            backend,
            self.parts.capture_config.clone(),
        ));

        // Device startup blocks until the driver answers
        let opening = Arc::clone(&capture);
        let opened = match tokio::task::spawn_blocking(move || opening.open()).await {
            Ok(opened) => opened,
            Err(e) => Err(Error::Device(format!("capture startup task failed: {e}"))),
        };
        if let Err(e) = opened {
            error!("Failed to open microphone: {}", e);
            self.status(format!("Microphone unavailable: {e}"));
            return;
        }

        self.generation += 1;
        let generation = self.generation;
        let commands = self.commands.clone();

        let started = self.parts.recognition.start(capture, move |event| {
            let _ = commands.send(Command::Recognition { generation, event });
        });

        match started {
            Ok(id) => {
                debug!("Listen session {} uses recognition session {}", generation, id);
                self.current = Some(generation);
                self.heard_final = false;
            }
            Err(e) => {
                warn!("Could not start recognition: {}", e);
                self.status("Ready");
            }
        }
    }

    async fn stop_listening(&mut self) {
        info!("Push-to-talk released");

        if self.pending_ticket.take().is_some() {
            info!("Released before capture began, cancelling");
            self.status("Ready");
            return;
        }

        if self.current.take().is_none() {
            debug!("Release without an active listen session");
            return;
        }

        self.parts.recognition.stop().await;
        self.display(DisplayEvent::ClearInterim);
        self.status(if self.heard_final { "Processing..." } else { "Ready" });
    }

    async fn on_recognition(&mut self, generation: u64, event: RecognitionEvent) {
        if self.current != Some(generation) {
            debug!("Ignoring event from stale listen session {}", generation);
            return;
        }

        match event {
            RecognitionEvent::Transcript(TranscriptEvent { text, is_final: false }) => {
                self.display(DisplayEvent::InterimTranscript(text));
            }
            RecognitionEvent::Transcript(TranscriptEvent { text, is_final: true }) => {
                self.heard_final = true;
                self.display(DisplayEvent::ClearInterim);

                if text.trim().is_empty() {
                    self.status("No speech detected or empty.");
                    return;
                }

                self.display(DisplayEvent::Conversation {
                    sender: VOICE_SENDER.to_string(),
                    text: text.clone(),
                });
                self.parts.bus.publish(&self.parts.voice_out_topic, &text).await;
                self.status("Ready");
            }
            RecognitionEvent::Ended(reason) => {
                self.current = None;
                self.display(DisplayEvent::ClearInterim);
                match reason {
                    EndReason::Failed(e) => {
                        warn!("Recognition ended with error: {}", e);
                        self.status("Ready");
                    }
                    EndReason::StreamClosed => self.status("Ready"),
                    EndReason::Stopped => {}
                }
            }
        }
    }

    fn on_inbound(&mut self, message: InboundMessage) {
        match message.capability {
            Capability::DisplayAndSpeak { sender, prefix } => {
                self.display(DisplayEvent::Conversation {
                    sender,
                    text: message.text.clone(),
                });

                let line = format!("{}: {}", prefix, message.text);
                let playback = Arc::clone(&self.parts.playback);
                tokio::spawn(async move {
                    playback.speak(&line).await;
                });
            }
            Capability::VoiceOut => {
                debug!("Ignoring message on outbound topic {}", message.topic);
            }
        }
    }

    async fn shutdown(&mut self) {
        info!("Shutting down session orchestrator");
        self.pending_ticket = None;
        self.current = None;
        self.parts.recognition.close().await;
        self.parts.playback.close();
        self.parts.bus.disconnect().await;
    }

    fn status(&self, text: impl Into<String>) {
        self.display(DisplayEvent::Status(text.into()));
    }

    fn display(&self, event: DisplayEvent) {
        if self.parts.display.send(event).is_err() {
            debug!("Display channel closed");
        }
    }
}

async fn watch_bus(bus: ResilientPubSubClient, display: DisplaySender) {
    let mut states = bus.watch_state();

    while states.changed().await.is_ok() {
        let state = *states.borrow_and_update();
        let text = match state {
            ConnectionState::Connected => "Bus connected",
            ConnectionState::Connecting => "Connecting to bus...",
            ConnectionState::Disconnected => "Bus disconnected",
            ConnectionState::Failed => "Bus connection failed",
            ConnectionState::Disconnecting => continue,
        };

        if display.send(DisplayEvent::Status(text.to_string())).is_err() {
            break;
        }
    }
}
