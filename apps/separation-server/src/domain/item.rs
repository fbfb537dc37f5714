//! Order item and its three independent status facets.
//!
//! Each facet (`is_separated`, `sent_to_purchase`, `not_sent`) carries its
//! own timestamp and operator reference. Facets are structurally independent:
//! an item may be separated and in the purchase queue at the same time.
//! Setting a facet to its current value is a no-op and yields no transition.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A fact about one applied facet change, consumed by the event publisher
/// and the purchase-queue maintenance in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemTransition {
    /// `is_separated`: false → true.
    Separated,
    /// `is_separated`: true → false.
    SeparationReverted,
    /// `sent_to_purchase`: false → true (creates a purchase-queue entry).
    SentToPurchase,
    /// `sent_to_purchase`: true → false (removes the purchase-queue entry).
    PurchaseReverted,
    /// `not_sent`: false → true.
    NotSent,
    /// `not_sent`: true → false.
    NotSentReverted,
}

/// One per-item update inside a batch. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemUpdate {
    /// Target item handle.
    pub item_id: i64,
    /// Desired `is_separated` value.
    pub separated: Option<bool>,
    /// Desired `sent_to_purchase` value.
    pub sent_to_purchase: Option<bool>,
    /// Desired `not_sent` value.
    pub not_sent: Option<bool>,
    /// Reason recorded when `not_sent` is set.
    pub not_sent_reason: Option<String>,
}

/// One line of an order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    /// Internal handle.
    pub id: i64,
    /// Owning order handle.
    pub order_id: i64,
    /// Product code (unique within the order).
    pub product_code: String,
    /// Supplier reference.
    pub product_reference: String,
    /// Display name.
    pub product_name: String,
    /// Quantity ordered (positive).
    pub quantity: u32,
    /// Unit price.
    pub unit_price: Decimal,
    /// Line total (`quantity × unit_price` within one cent).
    pub total_price: Decimal,

    /// Picked from stock.
    pub is_separated: bool,
    /// When the item was picked.
    pub separated_at: Option<DateTime<Utc>>,
    /// Who picked it.
    pub separated_by: Option<i64>,

    /// Routed to the purchase queue.
    pub sent_to_purchase: bool,
    /// When it was routed.
    pub sent_to_purchase_at: Option<DateTime<Utc>>,
    /// Who routed it.
    pub sent_to_purchase_by: Option<i64>,

    /// Declared undeliverable.
    pub not_sent: bool,
    /// When it was declared.
    pub not_sent_at: Option<DateTime<Utc>>,
    /// Who declared it.
    pub not_sent_by: Option<i64>,
    /// Why it cannot be delivered.
    pub not_sent_reason: Option<String>,
}

impl OrderItem {
    /// Set the separation facet. Returns the transition, or `None` when the
    /// facet already holds the requested value.
    pub fn set_separated(
        &mut self,
        on: bool,
        actor_id: i64,
        now: DateTime<Utc>,
    ) -> Option<ItemTransition> {
        if self.is_separated == on {
            return None;
        }
        self.is_separated = on;
        if on {
            self.separated_at = Some(now);
            self.separated_by = Some(actor_id);
            Some(ItemTransition::Separated)
        } else {
            self.separated_at = None;
            self.separated_by = None;
            Some(ItemTransition::SeparationReverted)
        }
    }

    /// Set the purchase facet.
    pub fn set_sent_to_purchase(
        &mut self,
        on: bool,
        actor_id: i64,
        now: DateTime<Utc>,
    ) -> Option<ItemTransition> {
        if self.sent_to_purchase == on {
            return None;
        }
        self.sent_to_purchase = on;
        if on {
            self.sent_to_purchase_at = Some(now);
            self.sent_to_purchase_by = Some(actor_id);
            Some(ItemTransition::SentToPurchase)
        } else {
            self.sent_to_purchase_at = None;
            self.sent_to_purchase_by = None;
            Some(ItemTransition::PurchaseReverted)
        }
    }

    /// Set the not-sent facet. The reason is recorded only on the rising edge
    /// and cleared with the rest of the facet on reversal.
    pub fn set_not_sent(
        &mut self,
        on: bool,
        reason: Option<&str>,
        actor_id: i64,
        now: DateTime<Utc>,
    ) -> Option<ItemTransition> {
        if self.not_sent == on {
            return None;
        }
        self.not_sent = on;
        if on {
            self.not_sent_at = Some(now);
            self.not_sent_by = Some(actor_id);
            self.not_sent_reason = reason.map(str::to_owned);
            Some(ItemTransition::NotSent)
        } else {
            self.not_sent_at = None;
            self.not_sent_by = None;
            self.not_sent_reason = None;
            Some(ItemTransition::NotSentReverted)
        }
    }

    /// Apply a batch update record, returning the transitions it produced in
    /// facet order (separated, purchase, not-sent).
    pub fn apply(
        &mut self,
        update: &ItemUpdate,
        actor_id: i64,
        now: DateTime<Utc>,
    ) -> Vec<ItemTransition> {
        let mut transitions = Vec::new();
        if let Some(on) = update.separated {
            transitions.extend(self.set_separated(on, actor_id, now));
        }
        if let Some(on) = update.sent_to_purchase {
            transitions.extend(self.set_sent_to_purchase(on, actor_id, now));
        }
        if let Some(on) = update.not_sent {
            transitions.extend(self.set_not_sent(
                on,
                update.not_sent_reason.as_deref(),
                actor_id,
                now,
            ));
        }
        transitions
    }

    /// Whether `total_price` matches `quantity × unit_price` within one cent.
    #[must_use]
    pub fn arithmetic_ok(&self) -> bool {
        let expected = Decimal::from(self.quantity) * self.unit_price;
        (self.total_price - expected).abs() <= Decimal::new(1, 2)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn item() -> OrderItem {
        OrderItem {
            id: 1,
            order_id: 10,
            product_code: "00815".to_string(),
            product_reference: "CB-20".to_string(),
            product_name: "CABO USB 2M".to_string(),
            quantity: 10,
            unit_price: dec!(5.00),
            total_price: dec!(50.00),
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
        }
    }

    #[test]
    fn separate_stamps_fields() {
        let mut it = item();
        let now = Utc::now();
        assert_eq!(it.set_separated(true, 7, now), Some(ItemTransition::Separated));
        assert!(it.is_separated);
        assert_eq!(it.separated_at, Some(now));
        assert_eq!(it.separated_by, Some(7));
    }

    #[test]
    fn separate_twice_is_noop() {
        let mut it = item();
        let now = Utc::now();
        it.set_separated(true, 7, now);
        assert_eq!(it.set_separated(true, 8, now), None);
        assert_eq!(it.separated_by, Some(7));
    }

    #[test]
    fn reversal_clears_all_fields() {
        let mut it = item();
        let now = Utc::now();
        it.set_not_sent(true, Some("em falta"), 7, now);
        assert_eq!(it.not_sent_reason.as_deref(), Some("em falta"));

        assert_eq!(
            it.set_not_sent(false, None, 7, now),
            Some(ItemTransition::NotSentReverted)
        );
        assert!(!it.not_sent);
        assert!(it.not_sent_at.is_none());
        assert!(it.not_sent_by.is_none());
        assert!(it.not_sent_reason.is_none());
    }

    #[test]
    fn facets_are_independent() {
        let mut it = item();
        let now = Utc::now();
        it.set_separated(true, 7, now);
        it.set_sent_to_purchase(true, 7, now);
        assert!(it.is_separated);
        assert!(it.sent_to_purchase);
    }

    #[test]
    fn toggle_round_trip_matches_direct_set() {
        let now = Utc::now();
        let mut toggled = item();
        toggled.set_separated(true, 7, now);
        toggled.set_separated(false, 7, now);
        toggled.set_separated(true, 7, now);

        let mut direct = item();
        direct.set_separated(true, 7, now);

        assert_eq!(toggled.is_separated, direct.is_separated);
        assert_eq!(toggled.separated_at, direct.separated_at);
        assert_eq!(toggled.separated_by, direct.separated_by);
    }

    #[test]
    fn apply_reports_transitions_in_facet_order() {
        let mut it = item();
        let update = ItemUpdate {
            item_id: 1,
            separated: Some(true),
            sent_to_purchase: Some(true),
            not_sent: None,
            not_sent_reason: None,
        };
        let transitions = it.apply(&update, 7, Utc::now());
        assert_eq!(
            transitions,
            vec![ItemTransition::Separated, ItemTransition::SentToPurchase]
        );
    }

    #[test]
    fn arithmetic_tolerance_is_one_cent() {
        let mut it = item();
        it.total_price = dec!(50.01);
        assert!(it.arithmetic_ok());
        it.total_price = dec!(50.02);
        assert!(!it.arithmetic_ok());
    }
}
