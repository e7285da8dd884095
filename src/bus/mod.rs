//! Resilient publish/subscribe messaging
//!
//! The client owns connection state and the reconnect loop; the broker
//! itself sits behind `BusConnector` / `BusLink` (NATS in production).

mod client;
mod routing;
mod transport;

pub use client::{ConnectionState, InboundMessage, ResilientPubSubClient};
pub use routing::{Capability, RoutingTable};
pub use transport::{BusConnector, BusLink, LinkEvent};
