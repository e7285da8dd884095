use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::routing::{Capability, RoutingTable};
use super::transport::{BusConnector, BusLink, LinkEvent};
use crate::retry::{RetryPolicy, RetryState};
use crate::{Error, Result};

/// Broker connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    /// Reconnect budget exhausted; terminal for this client instance
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
            ConnectionState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Decoded inbound bus message, already routed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub capability: Capability,
    pub text: String,
}

/// Pub/sub client that keeps itself connected
///
/// - Subscribes to every inbound topic on each successful (re)connect
/// - Reconnects with exponential backoff after an unexpected drop
/// - Gives up for good after `max_attempts` consecutive failures
/// - Drops publishes while not connected (at-most-once, never queued)
#[derive(Clone)]
pub struct ResilientPubSubClient {
    inner: Arc<Inner>,
}

struct Inner {
    connector: Arc<dyn BusConnector>,
    routes: RoutingTable,
    policy: RetryPolicy,
    state: watch::Sender<ConnectionState>,
    link: RwLock<Option<Arc<dyn BusLink>>>,
    dispatch: mpsc::UnboundedSender<InboundMessage>,
    closing: AtomicBool,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    rng: Mutex<StdRng>,
}

impl ResilientPubSubClient {
    pub fn new(
        connector: Arc<dyn BusConnector>,
        routes: RoutingTable,
        policy: RetryPolicy,
        dispatch: mpsc::UnboundedSender<InboundMessage>,
    ) -> Self {
        Self::with_rng(connector, routes, policy, dispatch, StdRng::from_entropy())
    }

    /// Same as `new` with deterministic jitter
    pub fn seeded(
        connector: Arc<dyn BusConnector>,
        routes: RoutingTable,
        policy: RetryPolicy,
        dispatch: mpsc::UnboundedSender<InboundMessage>,
        seed: u64,
    ) -> Self {
        Self::with_rng(connector, routes, policy, dispatch, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        connector: Arc<dyn BusConnector>,
        routes: RoutingTable,
        policy: RetryPolicy,
        dispatch: mpsc::UnboundedSender<InboundMessage>,
        rng: StdRng,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(Inner {
                connector,
                routes,
                policy,
                state,
                link: RwLock::new(None),
                dispatch,
                closing: AtomicBool::new(false),
                supervisor: Mutex::new(None),
                rng: Mutex::new(rng),
            }),
        }
    }

    /// Connect, retrying with backoff until the attempt budget runs out
    ///
    /// On success a background task keeps the connection alive.
    pub async fn connect(&self) -> Result<()> {
        match self.state() {
            ConnectionState::Failed => {
                return Err(Error::Connectivity(
                    "client gave up on the broker; create a new client".to_string(),
                ))
            }
            ConnectionState::Connected => return Ok(()),
            _ => {}
        }

        self.inner.closing.store(false, Ordering::SeqCst);
        let events = self.inner.establish().await?;

        let supervisor = tokio::spawn(Arc::clone(&self.inner).supervise(events));
        let previous = self
            .inner
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(supervisor);
        if let Some(previous) = previous {
            previous.abort();
        }

        Ok(())
    }

    /// Publish `payload` if connected; returns whether it was handed to the broker
    pub async fn publish(&self, topic: &str, payload: &str) -> bool {
        if self.state() != ConnectionState::Connected {
            warn!("Not connected to broker, dropping publish to {}", topic);
            return false;
        }

        let link = self.inner.link.read().await.clone();
        let Some(link) = link else {
            warn!("No broker link, dropping publish to {}", topic);
            return false;
        };

        match link.publish(topic, payload.as_bytes().to_vec()).await {
            Ok(()) => {
                info!("Published [{}]: {}", topic, payload);
                true
            }
            Err(e) => {
                error!("Failed to publish to {}: {}", topic, e);
                false
            }
        }
    }

    /// Stop the background loop and close the connection
    pub async fn disconnect(&self) {
        let inner = &self.inner;
        let already_closing = inner.closing.swap(true, Ordering::SeqCst);
        if already_closing && inner.link.read().await.is_none() {
            return;
        }

        let failed = self.state() == ConnectionState::Failed;
        if !failed {
            inner.set_state(ConnectionState::Disconnecting);
        }

        let supervisor = inner
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(supervisor) = supervisor {
            supervisor.abort();
        }

        let link = inner.link.write().await.take();
        if let Some(link) = link {
            link.close().await;
        }

        if !failed {
            inner.set_state(ConnectionState::Disconnected);
        }
        info!("Bus client disconnected");
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Observe state changes
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.inner.routes
    }
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Bus state {} -> {}", previous, state);
        }
    }

    async fn establish(self: &Arc<Self>) -> Result<mpsc::UnboundedReceiver<LinkEvent>> {
        let endpoint = self.connector.endpoint();
        let mut retry = RetryState::new(self.policy.clone());

        loop {
            if self.closing.load(Ordering::SeqCst) {
                self.set_state(ConnectionState::Disconnected);
                return Err(Error::Connectivity("disconnect requested".to_string()));
            }

            self.set_state(ConnectionState::Connecting);
            info!(
                "Attempting to connect to {} (attempt {}/{})",
                endpoint,
                retry.attempt() + 1,
                retry.max_attempts()
            );

            let failure = match self.open_link().await {
                Ok(events) => {
                    retry.reset();
                    self.set_state(ConnectionState::Connected);
                    info!("Connected to broker at {}", endpoint);
                    return Ok(events);
                }
                Err(e) => e,
            };

            error!("Broker connection failed: {}", failure);

            let delay = {
                let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                retry.fail(&mut *rng)
            };

            match delay {
                Some(delay) => {
                    info!("Retrying in {:.2} seconds", delay.as_secs_f64());
                    tokio::time::sleep(delay).await;
                }
                None => {
                    error!("Max retries reached, giving up on broker connection");
                    self.set_state(ConnectionState::Failed);
                    return Err(Error::Connectivity(format!(
                        "{} unreachable after {} attempts: {}",
                        endpoint,
                        retry.attempt(),
                        failure
                    )));
                }
            }
        }
    }

    async fn open_link(&self) -> Result<mpsc::UnboundedReceiver<LinkEvent>> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let link: Arc<dyn BusLink> = Arc::from(self.connector.connect(events_tx).await?);

        for topic in self.routes.inbound_topics() {
            if let Err(e) = link.subscribe(topic).await {
                link.close().await;
                return Err(e);
            }
            info!("Subscribed to topic: {}", topic);
        }

        *self.link.write().await = Some(Arc::clone(&link));

        // disconnect() raced with us
        if self.closing.load(Ordering::SeqCst) {
            self.link.write().await.take();
            link.close().await;
            return Err(Error::Connectivity("disconnect requested".to_string()));
        }

        Ok(events_rx)
    }

    async fn supervise(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<LinkEvent>) {
        loop {
            match events.recv().await {
                Some(LinkEvent::Message { topic, payload }) => self.dispatch(&topic, payload),
                Some(LinkEvent::Disconnected) | None => {
                    if self.closing.load(Ordering::SeqCst) {
                        return;
                    }

                    warn!("Disconnected from broker unexpectedly, reconnecting");
                    let stale = self.link.write().await.take();
                    if let Some(stale) = stale {
                        stale.close().await;
                    }
                    self.set_state(ConnectionState::Disconnected);

                    match self.establish().await {
                        Ok(next) => events = next,
                        Err(e) => {
                            error!("Stopped reconnecting: {}", e);
                            return;
                        }
                    }
                }
            }
        }
    }

    fn dispatch(&self, topic: &str, payload: Vec<u8>) {
        let text = match String::from_utf8(payload) {
            Ok(text) => text,
            Err(e) => {
                warn!("Dropping non-UTF-8 message on {}: {}", topic, e);
                return;
            }
        };

        let Some(capability) = self.routes.resolve(topic) else {
            warn!("Unhandled topic: {}", topic);
            return;
        };

        info!("Received on [{}]: {}", topic, text);

        let message = InboundMessage {
            topic: topic.to_string(),
            capability: capability.clone(),
            text,
        };
        if self.dispatch.send(message).is_err() {
            warn!("Dispatcher gone, dropping message on {}", topic);
        }
    }
}
