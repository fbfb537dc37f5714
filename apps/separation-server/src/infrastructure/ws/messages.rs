//! WebSocket wire messages.
//!
//! Server events are `{type, data, timestamp}` envelopes serialized once per
//! broadcast batch and sent verbatim to every recipient. Client messages are
//! the small `join_order` / `leave_order` / `ping` vocabulary; anything else
//! is logged and ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Server-to-client event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An item was picked; order-scoped.
    ItemSeparated,
    /// An item was routed to the purchase queue; order-scoped.
    ItemSentToPurchase,
    /// An item was declared undeliverable; order-scoped.
    ItemNotSent,
    /// An order reached completion; fleet-wide.
    OrderCompleted,
    /// Closing progress update of a batch; fleet-wide.
    OrderUpdated,
    /// A new order was confirmed; fleet-wide.
    NewOrder,
    /// An operator connected or joined an order.
    UserJoined,
    /// An operator disconnected or left an order.
    UserLeft,
    /// Liveness reply to a client `ping`.
    Pong,
}

/// A server event envelope.
#[derive(Debug, Clone, Serialize)]
pub struct EventMessage {
    /// Event type tag.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Event payload.
    pub data: serde_json::Value,
    /// Server-side emission time.
    pub timestamp: DateTime<Utc>,
}

impl EventMessage {
    /// Build an envelope stamped with the current time.
    #[must_use]
    pub fn new(kind: EventKind, data: serde_json::Value) -> Self {
        Self {
            kind,
            data,
            timestamp: Utc::now(),
        }
    }

    /// Serialize once; the fabric fans the resulting frame out verbatim.
    #[must_use]
    pub fn to_frame(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            // Envelope fields are all serializable; this is unreachable in
            // practice but must not panic a broadcast path.
            String::from("{\"type\":\"order_updated\",\"data\":{}}")
        })
    }

    /// `user_joined` for a fleet-level connect.
    #[must_use]
    pub fn user_joined(user_id: i64, user_name: &str) -> Self {
        Self::new(
            EventKind::UserJoined,
            json!({ "user_id": user_id, "user_name": user_name }),
        )
    }

    /// `user_joined` scoped to an order.
    #[must_use]
    pub fn user_joined_order(order_id: i64, user_id: i64, user_name: &str) -> Self {
        Self::new(
            EventKind::UserJoined,
            json!({ "order_id": order_id, "user_id": user_id, "user_name": user_name }),
        )
    }

    /// `user_left` for a fleet-level disconnect.
    #[must_use]
    pub fn user_left(user_id: i64, user_name: &str) -> Self {
        Self::new(
            EventKind::UserLeft,
            json!({ "user_id": user_id, "user_name": user_name }),
        )
    }

    /// `user_left` scoped to an order.
    #[must_use]
    pub fn user_left_order(order_id: i64, user_id: i64, user_name: &str) -> Self {
        Self::new(
            EventKind::UserLeft,
            json!({ "order_id": order_id, "user_id": user_id, "user_name": user_name }),
        )
    }

    /// `pong` echoing the client's timestamp.
    #[must_use]
    pub fn pong(timestamp: Option<serde_json::Value>) -> Self {
        Self::new(
            EventKind::Pong,
            json!({ "timestamp": timestamp.unwrap_or(serde_json::Value::Null) }),
        )
    }
}

/// Client-to-server messages.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Enter an order's coordination channel.
    JoinOrder {
        /// Target order handle.
        order_id: i64,
    },
    /// Leave an order's coordination channel.
    LeaveOrder {
        /// Target order handle.
        order_id: i64,
    },
    /// Application-level liveness probe; echoed back as `pong`.
    Ping {
        /// Client timestamp, echoed verbatim.
        #[serde(default)]
        timestamp: Option<serde_json::Value>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_with_type_tag() {
        let msg = EventMessage::user_joined(7, "Ana");
        let frame = msg.to_frame();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "user_joined");
        assert_eq!(value["data"]["user_id"], 7);
        assert_eq!(value["data"]["user_name"], "Ana");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn client_join_order_parses() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"join_order","data":{"order_id":42}}"#).unwrap();
        assert_eq!(msg, ClientMessage::JoinOrder { order_id: 42 });
    }

    #[test]
    fn client_ping_keeps_timestamp() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"ping","data":{"timestamp":1700000000}}"#).unwrap();
        match msg {
            ClientMessage::Ping { timestamp } => {
                assert_eq!(timestamp, Some(serde_json::json!(1_700_000_000)));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn unknown_client_type_fails_to_parse() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type":"shout","data":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn pong_echoes_timestamp() {
        let msg = EventMessage::pong(Some(serde_json::json!(123)));
        let value: serde_json::Value = serde_json::from_str(&msg.to_frame()).unwrap();
        assert_eq!(value["data"]["timestamp"], 123);
    }
}
