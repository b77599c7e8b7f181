//! Transaction Events
//!
//! Failed remote transactions are published on a broadcast channel owned by
//! the gateway. Nobody has to listen.

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::broadcast;

/// Capacity of the event channel; slow subscribers lose the oldest events
pub const EVENT_CAPACITY: usize = 64;

/// Gateway events
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// A remote transaction came back with a non-approval code
    TransactionUnsuccessful {
        transaction_type: String,
        /// Flattened processor response
        fields: BTreeMap<String, String>,
    },
}

/// Sending half of the event channel
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<GatewayEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Returns how many subscribers received it.
    pub fn publish(&self, event: GatewayEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> GatewayEvent {
        GatewayEvent::TransactionUnsuccessful {
            transaction_type: "Payment".into(),
            fields: BTreeMap::from([("response".to_string(), "110".to_string())]),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(event()), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        assert_eq!(bus.publish(event()), 1);
        assert_eq!(rx.recv().await.unwrap(), event());
    }
}
