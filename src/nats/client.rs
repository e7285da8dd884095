use std::sync::{Mutex, PoisonError};

use async_nats::{Client, ConnectOptions, Event};
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::bus::{BusConnector, BusLink, LinkEvent};
use crate::{Error, Result};

/// Opens NATS connections for the resilient bus client
///
/// Bus topics map one-to-one onto NATS subjects.
pub struct NatsConnector {
    url: String,
    client_id: String,
}

impl NatsConnector {
    pub fn new(url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client_id: client_id.into(),
        }
    }
}

#[async_trait::async_trait]
impl BusConnector for NatsConnector {
    async fn connect(&self, events: mpsc::UnboundedSender<LinkEvent>) -> Result<Box<dyn BusLink>> {
        info!("Connecting to NATS at {} as {}", self.url, self.client_id);

        let disconnects = events.clone();
        let client = ConnectOptions::new()
            .name(self.client_id.as_str())
            .event_callback(move |event| {
                let disconnects = disconnects.clone();
                async move {
                    match event {
                        Event::Disconnected => {
                            let _ = disconnects.send(LinkEvent::Disconnected);
                        }
                        other => debug!("NATS event: {}", other),
                    }
                }
            })
            .connect(self.url.as_str())
            .await
            .map_err(|e| Error::Connectivity(format!("failed to connect to NATS: {e}")))?;

        info!("Connected to NATS successfully");

        Ok(Box::new(NatsLink {
            client,
            events,
            forwarders: Mutex::new(Vec::new()),
        }))
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}

/// One live NATS connection
pub struct NatsLink {
    client: Client,
    events: mpsc::UnboundedSender<LinkEvent>,
    forwarders: Mutex<Vec<JoinHandle<()>>>,
}

#[async_trait::async_trait]
impl BusLink for NatsLink {
    async fn subscribe(&self, topic: &str) -> Result<()> {
        let mut subscriber = self
            .client
            .subscribe(topic.to_string())
            .await
            .map_err(|e| Error::Connectivity(format!("failed to subscribe to {topic}: {e}")))?;

        let events = self.events.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                let event = LinkEvent::Message {
                    topic: message.subject.to_string(),
                    payload: message.payload.to_vec(),
                };
                if events.send(event).is_err() {
                    break;
                }
            }
        });

        self.forwarders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(forwarder);

        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish(topic.to_string(), payload.into())
            .await
            .map_err(|e| Error::Connectivity(format!("failed to publish to {topic}: {e}")))
    }

    async fn close(&self) {
        info!("Closing NATS connection");

        let forwarders: Vec<_> = self
            .forwarders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for forwarder in forwarders {
            forwarder.abort();
        }

        if let Err(e) = self.client.flush().await {
            debug!("Flush on close failed: {}", e);
        }
        // async-nats tears the connection down once the client is dropped
    }
}
