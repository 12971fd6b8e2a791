use async_trait::async_trait;
use serde::Serialize;

use crate::{CoreError, CoreResult};

/// At-least-once message relay between pipeline stages.
///
/// Producers only get a delivery guarantee, never ordering across keys;
/// consumers are expected to tolerate replays.
#[async_trait]
pub trait EventRelay: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> CoreResult<()>;
}

/// Serialize `message` as JSON and publish it.
pub async fn publish_json<T: Serialize + Sync>(
    relay: &dyn EventRelay,
    topic: &str,
    key: &str,
    message: &T,
) -> CoreResult<()> {
    let payload =
        serde_json::to_string(message).map_err(|e| CoreError::DeliveryFailure(e.to_string()))?;
    relay.publish(topic, key, &payload).await
}
