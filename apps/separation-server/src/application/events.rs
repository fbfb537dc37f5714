//! Event publisher: maps applied transitions to broadcast events.
//!
//! Ordering per batch: per-item events in update order, then `order_updated`
//! to the fleet, then `order_completed` last when the batch crossed into the
//! completed state. Facet reversals emit no dedicated event; the batch's
//! closing `order_updated` carries the new percentage.

use std::sync::Arc;

use serde_json::json;

use crate::domain::ItemTransition;
use crate::infrastructure::persistence::TransitionEvent;
use crate::infrastructure::ws::{BroadcastFabric, EventKind, EventMessage};

/// Thin adapter between the state machine and the fabric.
pub struct EventPublisher {
    fabric: Arc<BroadcastFabric>,
}

impl EventPublisher {
    /// Create a publisher over the shared fabric.
    #[must_use]
    pub fn new(fabric: Arc<BroadcastFabric>) -> Self {
        Self { fabric }
    }

    /// Publish everything a committed batch produced.
    pub fn publish_batch(
        &self,
        order_id: i64,
        events: &[TransitionEvent],
        final_progress: f64,
        newly_completed: bool,
    ) {
        for event in events {
            match event.transition {
                ItemTransition::Separated => self.fabric.broadcast_to_order(
                    &EventMessage::new(
                        EventKind::ItemSeparated,
                        json!({
                            "order_id": order_id,
                            "item_id": event.item_id,
                            "progress_percentage": event.progress_after,
                        }),
                    ),
                    order_id,
                    None,
                ),
                ItemTransition::SentToPurchase => self.fabric.broadcast_to_order(
                    &EventMessage::new(
                        EventKind::ItemSentToPurchase,
                        json!({ "order_id": order_id, "item_id": event.item_id }),
                    ),
                    order_id,
                    None,
                ),
                ItemTransition::NotSent => self.fabric.broadcast_to_order(
                    &EventMessage::new(
                        EventKind::ItemNotSent,
                        json!({
                            "order_id": order_id,
                            "item_id": event.item_id,
                            "progress_percentage": event.progress_after,
                        }),
                    ),
                    order_id,
                    None,
                ),
                ItemTransition::SeparationReverted
                | ItemTransition::PurchaseReverted
                | ItemTransition::NotSentReverted => {}
            }
        }

        self.fabric.broadcast_to_all(
            &EventMessage::new(
                EventKind::OrderUpdated,
                json!({ "order_id": order_id, "progress_percentage": final_progress }),
            ),
            None,
        );

        if newly_completed {
            self.publish_order_completed(order_id);
        }
    }

    /// Announce a freshly confirmed order to the whole fleet.
    pub fn publish_new_order(&self, order_id: i64, order_number: &str, client_name: &str) {
        self.fabric.broadcast_to_all(
            &EventMessage::new(
                EventKind::NewOrder,
                json!({
                    "order_id": order_id,
                    "order_number": order_number,
                    "client_name": client_name,
                }),
            ),
            None,
        );
    }

    /// Announce completion to the whole fleet.
    pub fn publish_order_completed(&self, order_id: i64) {
        self.fabric.broadcast_to_all(
            &EventMessage::new(EventKind::OrderCompleted, json!({ "order_id": order_id })),
            None,
        );
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::infrastructure::ws::{OutboundFrame, PresenceRegistry};

    fn setup() -> (
        Arc<PresenceRegistry>,
        EventPublisher,
        mpsc::Receiver<OutboundFrame>,
    ) {
        let registry = Arc::new(PresenceRegistry::new());
        let fabric = Arc::new(BroadcastFabric::new(Arc::clone(&registry)));
        let publisher = EventPublisher::new(Arc::clone(&fabric));
        let (tx, rx) = mpsc::channel(32);
        registry.connect(1, "Ana", tx);
        registry.join_order(1, 42);
        (registry, publisher, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<OutboundFrame>) -> Vec<serde_json::Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            if let OutboundFrame::Text(text) = frame {
                frames.push(serde_json::from_str(&text).unwrap());
            }
        }
        frames
    }

    #[tokio::test]
    async fn batch_events_are_ordered() {
        let (_registry, publisher, mut rx) = setup();
        let events = vec![
            TransitionEvent {
                item_id: 10,
                transition: ItemTransition::Separated,
                progress_after: 50.0,
            },
            TransitionEvent {
                item_id: 11,
                transition: ItemTransition::NotSent,
                progress_after: 100.0,
            },
        ];

        publisher.publish_batch(42, &events, 100.0, true);

        let frames = drain(&mut rx);
        let kinds: Vec<&str> = frames.iter().map(|f| f["type"].as_str().unwrap()).collect();
        assert_eq!(
            kinds,
            vec!["item_separated", "item_not_sent", "order_updated", "order_completed"]
        );
        assert_eq!(frames[0]["data"]["progress_percentage"], 50.0);
        assert_eq!(frames[1]["data"]["progress_percentage"], 100.0);
        assert_eq!(frames[2]["data"]["progress_percentage"], 100.0);
    }

    #[tokio::test]
    async fn reversals_emit_only_order_updated() {
        let (_registry, publisher, mut rx) = setup();
        let events = vec![TransitionEvent {
            item_id: 10,
            transition: ItemTransition::PurchaseReverted,
            progress_after: 25.0,
        }];

        publisher.publish_batch(42, &events, 25.0, false);

        let frames = drain(&mut rx);
        let kinds: Vec<&str> = frames.iter().map(|f| f["type"].as_str().unwrap()).collect();
        assert_eq!(kinds, vec!["order_updated"]);
    }

    #[tokio::test]
    async fn purchase_event_has_no_progress_field() {
        let (_registry, publisher, mut rx) = setup();
        let events = vec![TransitionEvent {
            item_id: 10,
            transition: ItemTransition::SentToPurchase,
            progress_after: 0.0,
        }];

        publisher.publish_batch(42, &events, 0.0, false);

        let frames = drain(&mut rx);
        assert_eq!(frames[0]["type"], "item_sent_to_purchase");
        assert!(frames[0]["data"].get("progress_percentage").is_none());
    }

    #[tokio::test]
    async fn new_order_reaches_the_fleet() {
        let (_registry, publisher, mut rx) = setup();
        publisher.publish_new_order(7, "27820", "MARCIO");
        let frames = drain(&mut rx);
        assert_eq!(frames[0]["type"], "new_order");
        assert_eq!(frames[0]["data"]["order_number"], "27820");
    }
}
