//! Broadcast fabric: routes event envelopes to one operator, to an order's
//! members, or to the whole fleet.
//!
//! The registry lock is held only to snapshot the target set; the actual
//! writes go through each connection's bounded queue outside the lock. A
//! queue that is full or closed means the client is gone or too slow —
//! either way the connection is dropped and `user_left` is published, so a
//! broken recipient never blocks delivery to the others.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use super::messages::EventMessage;
use super::presence::{FrameSender, OutboundFrame, PresenceRegistry};

/// Fan-out router over the presence registry.
pub struct BroadcastFabric {
    registry: Arc<PresenceRegistry>,
}

impl BroadcastFabric {
    /// Create a fabric over the shared registry.
    #[must_use]
    pub fn new(registry: Arc<PresenceRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver an event to a single operator.
    pub fn send_to_user(&self, message: &EventMessage, user_id: i64) {
        let Some(sender) = self.registry.sender_for(user_id) else {
            return;
        };
        let frame = message.to_frame();
        if !try_deliver(&sender, frame) {
            self.reap(vec![user_id]);
        }
    }

    /// Deliver an event to every member of an order, optionally excluding
    /// the originating operator.
    pub fn broadcast_to_order(&self, message: &EventMessage, order_id: i64, exclude: Option<i64>) {
        let targets = self.registry.order_senders(order_id, exclude);
        self.deliver_all(message, targets);
    }

    /// Deliver an event to the whole fleet, optionally excluding one
    /// operator.
    pub fn broadcast_to_all(&self, message: &EventMessage, exclude: Option<i64>) {
        let targets = self.registry.all_senders(exclude);
        self.deliver_all(message, targets);
    }

    fn deliver_all(&self, message: &EventMessage, targets: Vec<(i64, FrameSender)>) {
        if targets.is_empty() {
            return;
        }
        // Serialized once per broadcast batch.
        let frame = message.to_frame();
        let mut dead = Vec::new();
        for (user_id, sender) in targets {
            if !try_deliver(&sender, frame.clone()) {
                dead.push(user_id);
            }
        }
        if !dead.is_empty() {
            self.reap(dead);
        }
    }

    /// Drop broken connections and publish the resulting `user_left` events.
    /// Each reaped user shrinks the registry, so the recursion through the
    /// `user_left` broadcasts terminates.
    fn reap(&self, dead: Vec<i64>) {
        for user_id in dead {
            let Some(outcome) = self.registry.disconnect(user_id, None) else {
                continue;
            };
            warn!(user_id, "dropping unresponsive connection");

            if let Some(order_id) = outcome.left_order {
                self.broadcast_to_order(
                    &EventMessage::user_left_order(order_id, user_id, &outcome.user_name),
                    order_id,
                    Some(user_id),
                );
            }
            self.broadcast_to_all(
                &EventMessage::user_left(user_id, &outcome.user_name),
                Some(user_id),
            );
        }
    }
}

fn try_deliver(sender: &FrameSender, frame: String) -> bool {
    match sender.try_send(OutboundFrame::Text(frame)) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            debug!("send queue full, demoting connection");
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::infrastructure::ws::messages::EventKind;

    fn setup() -> (Arc<PresenceRegistry>, BroadcastFabric) {
        let registry = Arc::new(PresenceRegistry::new());
        let fabric = BroadcastFabric::new(Arc::clone(&registry));
        (registry, fabric)
    }

    fn text_of(frame: OutboundFrame) -> String {
        match frame {
            OutboundFrame::Text(t) => t,
            OutboundFrame::Close => panic!("unexpected close frame"),
        }
    }

    #[tokio::test]
    async fn order_broadcast_reaches_members_only() {
        let (registry, fabric) = setup();
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        registry.connect(1, "Ana", tx1);
        registry.connect(2, "Bia", tx2);
        registry.join_order(1, 42);

        fabric.broadcast_to_order(
            &EventMessage::new(EventKind::OrderUpdated, serde_json::json!({"order_id": 42})),
            42,
            None,
        );

        let frame = text_of(rx1.recv().await.unwrap());
        assert!(frame.contains("order_updated"));
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn exclusion_skips_the_originator() {
        let (registry, fabric) = setup();
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        registry.connect(1, "Ana", tx1);
        registry.connect(2, "Bia", tx2);

        fabric.broadcast_to_all(&EventMessage::user_joined(1, "Ana"), Some(1));
        assert!(rx1.try_recv().is_err());
        assert!(text_of(rx2.recv().await.unwrap()).contains("user_joined"));
    }

    #[tokio::test]
    async fn full_queue_demotes_the_connection() {
        let (registry, fabric) = setup();
        // Capacity one: the second frame cannot be queued.
        let (tx, mut rx) = mpsc::channel(1);
        registry.connect(1, "Ana", tx);

        let msg = EventMessage::new(EventKind::OrderUpdated, serde_json::json!({}));
        fabric.send_to_user(&msg, 1);
        fabric.send_to_user(&msg, 1);

        assert!(!registry.is_connected(1));
        // The first frame is still in the queue; the connection is gone.
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn closed_queue_is_detected_within_one_broadcast() {
        let (registry, fabric) = setup();
        let (tx, rx) = mpsc::channel(8);
        registry.connect(1, "Ana", tx);
        drop(rx);

        fabric.broadcast_to_all(
            &EventMessage::new(EventKind::OrderUpdated, serde_json::json!({})),
            None,
        );
        assert!(!registry.is_connected(1));
    }

    #[tokio::test]
    async fn reaping_one_user_notifies_the_order() {
        let (registry, fabric) = setup();
        let (tx1, rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        registry.connect(1, "Ana", tx1);
        registry.connect(2, "Bia", tx2);
        registry.join_order(1, 42);
        registry.join_order(2, 42);
        drop(rx1);

        // Delivery to Ana fails, she is reaped, and Bia hears about it both
        // at the order level and at the fleet level.
        fabric.broadcast_to_order(
            &EventMessage::new(EventKind::OrderUpdated, serde_json::json!({})),
            42,
            None,
        );

        let mut kinds = Vec::new();
        while let Ok(frame) = rx2.try_recv() {
            kinds.push(text_of(frame));
        }
        assert!(kinds.iter().any(|f| f.contains("order_updated")));
        assert!(kinds.iter().filter(|f| f.contains("user_left")).count() >= 1);
        assert!(!registry.is_connected(1));
        assert!(registry.is_connected(2));
    }
}
