//! Order aggregate: counters, status lifecycle, derived progress.
//!
//! Status recomputation runs after every batch:
//! - no items → `Pending`
//! - every item separated or not-sent → `Completed` (stamps `completed_at`)
//! - any counter above zero → `InProgress`
//! - otherwise → `Pending`
//!
//! `completed_at` is set iff the status is `Completed`; leaving the completed
//! state (a facet reversal after completion) clears it again.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::item::OrderItem;
use super::progress;
use super::shipping::{LogisticsType, PackageType};

/// Order-level status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Confirmed, no item touched yet.
    Pending,
    /// At least one facet set somewhere.
    InProgress,
    /// Every item separated or not-sent (or manually completed).
    Completed,
    /// Withdrawn; never re-enters the active lifecycle.
    Cancelled,
}

impl OrderStatus {
    /// Parse the stored string form.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Storage/wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counter state after a recompute, plus whether the recompute crossed into
/// the completed state (drives the `order_completed` broadcast).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Total items on the order.
    pub items_count: u32,
    /// Items with the separated facet set.
    pub items_separated: u32,
    /// Items with the purchase facet set.
    pub items_in_purchase: u32,
    /// Items with the not-sent facet set.
    pub items_not_sent: u32,
    /// Status after the recompute.
    pub status: OrderStatus,
    /// Whether this recompute crossed into the completed state.
    pub newly_completed: bool,
}

/// A confirmed quotation undergoing picking.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    /// Internal handle.
    pub id: i64,
    /// Quotation number from the source document (unique).
    pub order_number: String,
    /// Client the order ships to.
    pub client_name: String,
    /// Seller who issued the quotation.
    pub seller_name: String,
    /// Quotation date.
    pub order_date: NaiveDate,
    /// Document total.
    pub total_value: Decimal,
    /// How the order leaves the warehouse.
    pub logistics_type: Option<LogisticsType>,
    /// Packaging choice.
    pub package_type: Option<PackageType>,
    /// Free text from the seller (≤500 chars).
    pub observations: Option<String>,

    /// Total items.
    pub items_count: u32,
    /// Items separated.
    pub items_separated: u32,
    /// Items in the purchase queue.
    pub items_in_purchase: u32,
    /// Items declared not sendable.
    pub items_not_sent: u32,

    /// Lifecycle status.
    pub status: OrderStatus,
    /// Confirmation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// Set iff `status` is [`OrderStatus::Completed`].
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Recount the facet counters from the item set and re-evaluate the
    /// status. Cancellation is sticky: a cancelled order never re-enters the
    /// active lifecycle through a recompute.
    pub fn recompute(&mut self, items: &[OrderItem], now: DateTime<Utc>) -> CounterSnapshot {
        let was_completed = self.status == OrderStatus::Completed;

        self.items_count = items.len() as u32;
        self.items_separated = items.iter().filter(|i| i.is_separated).count() as u32;
        self.items_in_purchase = items.iter().filter(|i| i.sent_to_purchase).count() as u32;
        self.items_not_sent = items.iter().filter(|i| i.not_sent).count() as u32;

        if self.status != OrderStatus::Cancelled {
            let processed = self.items_separated + self.items_not_sent;
            self.status = if self.items_count == 0 {
                OrderStatus::Pending
            } else if processed == self.items_count {
                OrderStatus::Completed
            } else if self.items_separated > 0
                || self.items_in_purchase > 0
                || self.items_not_sent > 0
            {
                OrderStatus::InProgress
            } else {
                OrderStatus::Pending
            };
        }

        if self.status == OrderStatus::Completed {
            if self.completed_at.is_none() {
                self.completed_at = Some(now);
            }
        } else {
            self.completed_at = None;
        }
        self.updated_at = now;

        CounterSnapshot {
            items_count: self.items_count,
            items_separated: self.items_separated,
            items_in_purchase: self.items_in_purchase,
            items_not_sent: self.items_not_sent,
            status: self.status,
            newly_completed: self.status == OrderStatus::Completed && !was_completed,
        }
    }

    /// Manual completion override (admin/separator path). Idempotence is
    /// checked by the caller so it can surface `ALREADY_COMPLETED`.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.status = OrderStatus::Completed;
        if self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        self.updated_at = now;
    }

    /// Current progress percentage under the separated-or-not-sent policy.
    #[must_use]
    pub fn progress_percentage(&self) -> f64 {
        progress::progress_percentage(self.items_separated, self.items_not_sent, self.items_count)
    }

    /// Whether every item has been processed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        progress::is_complete(self.items_separated, self.items_not_sent, self.items_count)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn order() -> Order {
        let now = Utc::now();
        Order {
            id: 1,
            order_number: "27820".to_string(),
            client_name: "MARCIO APARECIDO DE SANTANA".to_string(),
            seller_name: "NYCOLAS HENDRIGO MANCINI".to_string(),
            order_date: NaiveDate::from_ymd_opt(2025, 7, 11).unwrap(),
            total_value: dec!(2380.00),
            logistics_type: None,
            package_type: None,
            observations: None,
            items_count: 0,
            items_separated: 0,
            items_in_purchase: 0,
            items_not_sent: 0,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    fn items(n: u32) -> Vec<OrderItem> {
        (0..n)
            .map(|i| OrderItem {
                id: i64::from(i) + 1,
                order_id: 1,
                product_code: format!("{:05}", 800 + i),
                product_reference: "REF".to_string(),
                product_name: "PRODUTO".to_string(),
                quantity: 1,
                unit_price: dec!(1.00),
                total_price: dec!(1.00),
                is_separated: false,
                separated_at: None,
                separated_by: None,
                sent_to_purchase: false,
                sent_to_purchase_at: None,
                sent_to_purchase_by: None,
                not_sent: false,
                not_sent_at: None,
                not_sent_by: None,
                not_sent_reason: None,
            })
            .collect()
    }

    #[test]
    fn untouched_items_stay_pending() {
        let mut o = order();
        let snapshot = o.recompute(&items(4), Utc::now());
        assert_eq!(snapshot.status, OrderStatus::Pending);
        assert_eq!(snapshot.items_count, 4);
        assert!(!snapshot.newly_completed);
    }

    #[test]
    fn any_activity_moves_to_in_progress() {
        let mut o = order();
        let mut its = items(4);
        its[0].set_sent_to_purchase(true, 7, Utc::now());
        let snapshot = o.recompute(&its, Utc::now());
        assert_eq!(snapshot.status, OrderStatus::InProgress);
        assert_eq!(snapshot.items_in_purchase, 1);
    }

    #[test]
    fn purchase_never_completes() {
        let mut o = order();
        let mut its = items(2);
        let now = Utc::now();
        its[0].set_separated(true, 7, now);
        its[1].set_sent_to_purchase(true, 7, now);
        let snapshot = o.recompute(&its, now);
        assert_eq!(snapshot.status, OrderStatus::InProgress);
        assert!(o.completed_at.is_none());
    }

    #[test]
    fn separated_plus_not_sent_completes() {
        let mut o = order();
        let mut its = items(2);
        let now = Utc::now();
        its[0].set_separated(true, 7, now);
        its[1].set_not_sent(true, Some("em falta"), 7, now);
        let snapshot = o.recompute(&its, now);
        assert_eq!(snapshot.status, OrderStatus::Completed);
        assert!(snapshot.newly_completed);
        assert!(o.completed_at.is_some());
        assert_eq!(o.progress_percentage(), 100.0);
    }

    #[test]
    fn completion_fires_once() {
        let mut o = order();
        let mut its = items(1);
        let now = Utc::now();
        its[0].set_separated(true, 7, now);
        assert!(o.recompute(&its, now).newly_completed);
        assert!(!o.recompute(&its, now).newly_completed);
    }

    #[test]
    fn reversal_reopens_and_clears_completed_at() {
        let mut o = order();
        let mut its = items(1);
        let now = Utc::now();
        its[0].set_separated(true, 7, now);
        o.recompute(&its, now);
        assert_eq!(o.status, OrderStatus::Completed);

        its[0].set_separated(false, 7, now);
        let snapshot = o.recompute(&its, now);
        assert_eq!(snapshot.status, OrderStatus::Pending);
        assert!(o.completed_at.is_none());
    }

    #[test]
    fn cancelled_is_sticky() {
        let mut o = order();
        o.status = OrderStatus::Cancelled;
        let mut its = items(1);
        its[0].set_separated(true, 7, Utc::now());
        let snapshot = o.recompute(&its, Utc::now());
        assert_eq!(snapshot.status, OrderStatus::Cancelled);
    }

    #[test]
    fn empty_order_is_pending_at_zero() {
        let mut o = order();
        let snapshot = o.recompute(&[], Utc::now());
        assert_eq!(snapshot.status, OrderStatus::Pending);
        assert_eq!(o.progress_percentage(), 0.0);
    }
}
