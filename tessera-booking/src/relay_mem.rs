use std::sync::Mutex;

use async_trait::async_trait;
use tessera_core::{CoreResult, EventRelay};

#[derive(Debug, Clone)]
pub struct RelayedMessage {
    pub topic: String,
    pub key: String,
    pub payload: String,
}

/// Relay that records every message instead of sending it anywhere.
#[derive(Default)]
pub struct MemoryRelay {
    messages: Mutex<Vec<RelayedMessage>>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self, topic: &str) -> Vec<RelayedMessage> {
        self.messages
            .lock()
            .expect("relay mutex poisoned")
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventRelay for MemoryRelay {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> CoreResult<()> {
        self.messages
            .lock()
            .expect("relay mutex poisoned")
            .push(RelayedMessage {
                topic: topic.to_string(),
                key: key.to_string(),
                payload: payload.to_string(),
            });
        Ok(())
    }
}
