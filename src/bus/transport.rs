use tokio::sync::mpsc;

use crate::Result;

/// Raised by a live broker link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Message { topic: String, payload: Vec<u8> },
    /// The transport dropped; the link is unusable afterwards
    Disconnected,
}

/// Opens broker connections
///
/// Each successful `connect` yields a fresh link that reports inbound
/// messages and disconnects on `events`.
#[async_trait::async_trait]
pub trait BusConnector: Send + Sync {
    async fn connect(&self, events: mpsc::UnboundedSender<LinkEvent>) -> Result<Box<dyn BusLink>>;

    /// Broker address for logging
    fn endpoint(&self) -> String;
}

/// One established broker connection
#[async_trait::async_trait]
pub trait BusLink: Send + Sync {
    async fn subscribe(&self, topic: &str) -> Result<()>;

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    async fn close(&self);
}
