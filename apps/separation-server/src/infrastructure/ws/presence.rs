//! Presence registry: live operator connections and per-order membership.
//!
//! Process-local and transient; rebuilt from live connections on restart.
//! All state sits behind one mutex. Mutations return outcome structs and
//! never perform I/O, so broadcasting always happens after the lock is
//! released (one slow client must not stall registry access).
//!
//! At most one connection per operator: a reconnect (second tab) replaces
//! the socket in place, preserving order membership, and asks the old writer
//! to close. Each connection carries an epoch so the teardown of a replaced
//! socket cannot disconnect its successor.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// A frame queued for one connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// Pre-serialized event envelope.
    Text(String),
    /// Ask the writer to close the socket.
    Close,
}

/// Sending half of a connection's bounded write queue.
pub type FrameSender = mpsc::Sender<OutboundFrame>;

#[derive(Debug)]
struct ConnectionEntry {
    sender: FrameSender,
    user_name: String,
    connected_at: DateTime<Utc>,
    current_order: Option<i64>,
    epoch: u64,
}

/// Outcome of [`PresenceRegistry::connect`].
#[derive(Debug)]
pub struct ConnectOutcome {
    /// Writer of the replaced connection, to be closed by the caller.
    pub replaced: Option<FrameSender>,
    /// Whether a fleet-level `user_joined` should be announced (first
    /// connection only; a replacement stays silent).
    pub announce: bool,
    /// Epoch token identifying this connection.
    pub epoch: u64,
}

/// Outcome of [`PresenceRegistry::disconnect`].
#[derive(Debug)]
pub struct DisconnectOutcome {
    /// Display name of the departed operator.
    pub user_name: String,
    /// Order the user was removed from, if any.
    pub left_order: Option<i64>,
}

/// Outcome of [`PresenceRegistry::join_order`].
#[derive(Debug)]
pub struct JoinOutcome {
    /// Display name of the joining operator.
    pub user_name: String,
    /// Previous order left as a side effect, if different.
    pub left_previous: Option<i64>,
    /// False when the user was already a member (idempotent re-join).
    pub newly_joined: bool,
}

/// Outcome of [`PresenceRegistry::leave_order`].
#[derive(Debug)]
pub struct LeaveOutcome {
    /// Display name of the leaving operator.
    pub user_name: String,
    /// Whether the user was actually a member.
    pub removed: bool,
}

/// Metadata snapshot of one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    /// Operator handle.
    pub user_id: i64,
    /// Display name.
    pub user_name: String,
    /// When the connection was established.
    pub connected_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    connections: HashMap<i64, ConnectionEntry>,
    members: HashMap<i64, HashSet<i64>>,
    next_epoch: u64,
}

/// The concurrent registry of connected operators.
#[derive(Default)]
pub struct PresenceRegistry {
    inner: Mutex<Inner>,
}

impl PresenceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. A second connection from the same user
    /// replaces the first in place: membership and `current_order` are
    /// preserved and no order-level `user_joined` is re-announced.
    pub fn connect(&self, user_id: i64, user_name: &str, sender: FrameSender) -> ConnectOutcome {
        let mut inner = self.inner.lock();
        inner.next_epoch += 1;
        let epoch = inner.next_epoch;

        if let Some(entry) = inner.connections.get_mut(&user_id) {
            let old = std::mem::replace(&mut entry.sender, sender);
            entry.user_name = user_name.to_string();
            entry.epoch = epoch;
            return ConnectOutcome {
                replaced: Some(old),
                announce: false,
                epoch,
            };
        }

        inner.connections.insert(
            user_id,
            ConnectionEntry {
                sender,
                user_name: user_name.to_string(),
                connected_at: Utc::now(),
                current_order: None,
                epoch,
            },
        );
        ConnectOutcome {
            replaced: None,
            announce: true,
            epoch,
        }
    }

    /// Remove a connection, leaving any joined order. When `epoch` is given
    /// it must match the stored entry; a stale teardown is a no-op.
    pub fn disconnect(&self, user_id: i64, epoch: Option<u64>) -> Option<DisconnectOutcome> {
        let mut inner = self.inner.lock();
        let entry = inner.connections.get(&user_id)?;
        if let Some(epoch) = epoch {
            if entry.epoch != epoch {
                return None;
            }
        }

        let entry = inner.connections.remove(&user_id)?;
        let left_order = entry.current_order;
        if let Some(order_id) = left_order {
            Self::remove_member(&mut inner, order_id, user_id);
        }
        Some(DisconnectOutcome {
            user_name: entry.user_name,
            left_order,
        })
    }

    /// Add the user to an order's membership set, leaving a previous order
    /// first. Re-joining the current order is a no-op.
    pub fn join_order(&self, user_id: i64, order_id: i64) -> Option<JoinOutcome> {
        let mut inner = self.inner.lock();
        let entry = inner.connections.get(&user_id)?;
        let user_name = entry.user_name.clone();
        let previous = entry.current_order;

        if previous == Some(order_id) {
            return Some(JoinOutcome {
                user_name,
                left_previous: None,
                newly_joined: false,
            });
        }

        if let Some(prev) = previous {
            Self::remove_member(&mut inner, prev, user_id);
        }
        inner.members.entry(order_id).or_default().insert(user_id);
        if let Some(entry) = inner.connections.get_mut(&user_id) {
            entry.current_order = Some(order_id);
        }
        Some(JoinOutcome {
            user_name,
            left_previous: previous,
            newly_joined: true,
        })
    }

    /// Remove the user from an order's membership set.
    pub fn leave_order(&self, user_id: i64, order_id: i64) -> Option<LeaveOutcome> {
        let mut inner = self.inner.lock();
        let entry = inner.connections.get_mut(&user_id)?;
        let user_name = entry.user_name.clone();
        let removed = entry.current_order == Some(order_id);
        if removed {
            entry.current_order = None;
            Self::remove_member(&mut inner, order_id, user_id);
        }
        Some(LeaveOutcome { user_name, removed })
    }

    fn remove_member(inner: &mut Inner, order_id: i64, user_id: i64) {
        if let Some(set) = inner.members.get_mut(&order_id) {
            set.remove(&user_id);
            // Empty buckets are deleted outright (memory hygiene).
            if set.is_empty() {
                inner.members.remove(&order_id);
            }
        }
    }

    /// Metadata snapshot of an order's members.
    #[must_use]
    pub fn members_in_order(&self, order_id: i64) -> Vec<MemberInfo> {
        let inner = self.inner.lock();
        let Some(set) = inner.members.get(&order_id) else {
            return Vec::new();
        };
        set.iter()
            .filter_map(|user_id| {
                inner.connections.get(user_id).map(|entry| MemberInfo {
                    user_id: *user_id,
                    user_name: entry.user_name.clone(),
                    connected_at: entry.connected_at,
                })
            })
            .collect()
    }

    /// Snapshot the writer of one user.
    #[must_use]
    pub fn sender_for(&self, user_id: i64) -> Option<FrameSender> {
        self.inner.lock().connections.get(&user_id).map(|e| e.sender.clone())
    }

    /// Snapshot every writer, optionally excluding one user.
    #[must_use]
    pub fn all_senders(&self, exclude: Option<i64>) -> Vec<(i64, FrameSender)> {
        self.inner
            .lock()
            .connections
            .iter()
            .filter(|(id, _)| Some(**id) != exclude)
            .map(|(id, entry)| (*id, entry.sender.clone()))
            .collect()
    }

    /// Snapshot the writers of an order's members, optionally excluding one.
    #[must_use]
    pub fn order_senders(&self, order_id: i64, exclude: Option<i64>) -> Vec<(i64, FrameSender)> {
        let inner = self.inner.lock();
        let Some(set) = inner.members.get(&order_id) else {
            return Vec::new();
        };
        set.iter()
            .filter(|id| Some(**id) != exclude)
            .filter_map(|id| inner.connections.get(id).map(|e| (*id, e.sender.clone())))
            .collect()
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.lock().connections.len()
    }

    /// Number of orders with at least one member.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.inner.lock().members.len()
    }

    /// Whether the user currently has a live connection.
    #[must_use]
    pub fn is_connected(&self, user_id: i64) -> bool {
        self.inner.lock().connections.contains_key(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> (FrameSender, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(8);
        (tx, rx)
    }

    #[test]
    fn connect_announces_only_first_time() {
        let registry = PresenceRegistry::new();
        let (tx1, _rx1) = sender();
        let first = registry.connect(1, "Ana", tx1);
        assert!(first.announce);
        assert!(first.replaced.is_none());

        let (tx2, _rx2) = sender();
        let second = registry.connect(1, "Ana", tx2);
        assert!(!second.announce);
        assert!(second.replaced.is_some());
        assert_eq!(registry.connection_count(), 1);
    }

    #[test]
    fn reconnect_preserves_membership() {
        let registry = PresenceRegistry::new();
        let (tx1, _rx1) = sender();
        registry.connect(1, "Ana", tx1);
        registry.join_order(1, 42);

        let (tx2, _rx2) = sender();
        registry.connect(1, "Ana", tx2);
        let members = registry.members_in_order(42);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, 1);
    }

    #[test]
    fn stale_epoch_disconnect_is_noop() {
        let registry = PresenceRegistry::new();
        let (tx1, _rx1) = sender();
        let first = registry.connect(1, "Ana", tx1);
        let (tx2, _rx2) = sender();
        registry.connect(1, "Ana", tx2);

        assert!(registry.disconnect(1, Some(first.epoch)).is_none());
        assert!(registry.is_connected(1));
    }

    #[test]
    fn join_is_idempotent() {
        let registry = PresenceRegistry::new();
        let (tx, _rx) = sender();
        registry.connect(1, "Ana", tx);

        let first = registry.join_order(1, 42).unwrap();
        assert!(first.newly_joined);
        let second = registry.join_order(1, 42).unwrap();
        assert!(!second.newly_joined);
        assert_eq!(registry.members_in_order(42).len(), 1);
    }

    #[test]
    fn joining_another_order_leaves_the_previous_one() {
        let registry = PresenceRegistry::new();
        let (tx, _rx) = sender();
        registry.connect(1, "Ana", tx);
        registry.join_order(1, 42);

        let outcome = registry.join_order(1, 43).unwrap();
        assert_eq!(outcome.left_previous, Some(42));
        assert!(registry.members_in_order(42).is_empty());
        assert_eq!(registry.members_in_order(43).len(), 1);
    }

    #[test]
    fn last_member_leaving_removes_the_bucket() {
        let registry = PresenceRegistry::new();
        let (tx, _rx) = sender();
        registry.connect(1, "Ana", tx);
        registry.join_order(1, 42);
        assert_eq!(registry.order_count(), 1);

        registry.leave_order(1, 42);
        assert_eq!(registry.order_count(), 0);
    }

    #[test]
    fn disconnect_reports_the_left_order() {
        let registry = PresenceRegistry::new();
        let (tx, _rx) = sender();
        registry.connect(1, "Ana", tx);
        registry.join_order(1, 42);

        let outcome = registry.disconnect(1, None).unwrap();
        assert_eq!(outcome.left_order, Some(42));
        assert_eq!(outcome.user_name, "Ana");
        assert!(!registry.is_connected(1));
        assert_eq!(registry.order_count(), 0);
    }

    #[test]
    fn snapshots_exclude_the_requested_user() {
        let registry = PresenceRegistry::new();
        let (tx1, _rx1) = sender();
        let (tx2, _rx2) = sender();
        registry.connect(1, "Ana", tx1);
        registry.connect(2, "Bia", tx2);
        registry.join_order(1, 42);
        registry.join_order(2, 42);

        let all = registry.all_senders(Some(1));
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0, 2);

        let order = registry.order_senders(42, Some(2));
        assert_eq!(order.len(), 1);
        assert_eq!(order[0].0, 1);
    }
}
