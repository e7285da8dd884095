use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

/// Update for the display collaborator
///
/// Sent over an ordered channel so backend tasks never touch UI state directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    Status(String),
    Conversation { sender: String, text: String },
    InterimTranscript(String),
    ClearInterim,
}

pub type DisplaySender = mpsc::UnboundedSender<DisplayEvent>;

#[derive(Debug, Clone, Serialize)]
pub struct ConversationEntry {
    pub sender: String,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

/// Headless display: what a screen would currently show
///
/// Keeps only the most recent conversation lines in memory.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayState {
    pub status: String,
    pub interim: Option<String>,
    pub conversation: VecDeque<ConversationEntry>,
    #[serde(skip)]
    capacity: usize,
}

impl DisplayState {
    /// `capacity` is clamped to at least one line
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            status: "Initializing...".to_string(),
            interim: None,
            conversation: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn apply(&mut self, event: DisplayEvent) {
        match event {
            DisplayEvent::Status(text) => self.status = text,
            DisplayEvent::Conversation { sender, text } => {
                while self.conversation.len() >= self.capacity {
                    self.conversation.pop_front();
                }
                self.conversation.push_back(ConversationEntry {
                    sender,
                    text,
                    received_at: Utc::now(),
                });
            }
            DisplayEvent::InterimTranscript(text) => self.interim = Some(text),
            DisplayEvent::ClearInterim => self.interim = None,
        }
    }
}

impl Default for DisplayState {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Drain display events into shared state until every sender is gone
pub async fn run_display(
    mut events: mpsc::UnboundedReceiver<DisplayEvent>,
    state: Arc<RwLock<DisplayState>>,
) {
    while let Some(event) = events.recv().await {
        match &event {
            DisplayEvent::Status(text) => info!("Status: {}", text),
            DisplayEvent::Conversation { sender, text } => info!("{}: {}", sender, text),
            DisplayEvent::InterimTranscript(text) => debug!("Interim: {}", text),
            DisplayEvent::ClearInterim => {}
        }
        state.write().await.apply(event);
    }

    debug!("Display channel closed");
}
