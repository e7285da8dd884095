use std::collections::HashMap;

/// What the bridge does with a topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    /// Inbound: show in the conversation as `sender` and speak with `prefix`
    DisplayAndSpeak { sender: String, prefix: String },
    /// Outbound only: our recognised speech is published here
    VoiceOut,
}

impl Capability {
    /// Whether the client subscribes to topics with this capability
    pub fn is_inbound(&self) -> bool {
        matches!(self, Capability::DisplayAndSpeak { .. })
    }
}

/// Topic → capability map, fixed at construction
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<String, Capability>,
}

impl RoutingTable {
    pub fn new(routes: impl IntoIterator<Item = (String, Capability)>) -> Self {
        Self {
            routes: routes.into_iter().collect(),
        }
    }

    pub fn resolve(&self, topic: &str) -> Option<&Capability> {
        self.routes.get(topic)
    }

    /// Topics to (re)subscribe on every connect, sorted for stable ordering
    pub fn inbound_topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = self
            .routes
            .iter()
            .filter(|(_, capability)| capability.is_inbound())
            .map(|(topic, _)| topic.as_str())
            .collect();
        topics.sort_unstable();
        topics
    }

    /// First topic routed as `VoiceOut`
    pub fn voice_out_topic(&self) -> Option<&str> {
        let mut topics: Vec<&str> = self
            .routes
            .iter()
            .filter(|(_, capability)| **capability == Capability::VoiceOut)
            .map(|(topic, _)| topic.as_str())
            .collect();
        topics.sort_unstable();
        topics.first().copied()
    }
}
