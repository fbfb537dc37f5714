//! Order boundary orchestrator.
//!
//! Entry point for every external mutation: PDF preview, order confirmation,
//! batched item updates, single-item purchase dispatch, manual completion,
//! and the read paths that open access-log sessions. Per-order operations
//! serialize through a per-order mutex so interleaved batches from different
//! operators cannot corrupt counters or publish out-of-order completion. The
//! per-order mutex is never acquired while holding the presence lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::domain::{
    Actor, ItemUpdate, LogisticsType, Order, OrderItem, OrderStatus, PackageType,
};
use crate::error::{AppError, ErrorCode};
use crate::infrastructure::persistence::{AccessStats, PurchaseQueueEntry, Store};
use crate::parser::{self, ParseError, ParsedOrder, ValidationInfo};

use super::events::EventPublisher;

/// Snapshot of an order with its items, as returned by read and mutation
/// paths alike.
#[derive(Debug)]
pub struct OrderDetail {
    /// The order with current counters.
    pub order: Order,
    /// Its items, in insertion order.
    pub items: Vec<OrderItem>,
}

impl OrderDetail {
    /// Progress under the separated-or-not-sent policy.
    #[must_use]
    pub fn progress_percentage(&self) -> f64 {
        self.order.progress_percentage()
    }
}

/// Result of a single-item purchase dispatch.
#[derive(Debug)]
pub struct PurchaseDispatch {
    /// The dispatched item.
    pub item_id: i64,
    /// Order progress after the dispatch.
    pub progress_percentage: f64,
}

/// Dashboard statistics.
#[derive(Debug, Clone, Copy)]
pub struct OrderStats {
    /// All orders ever confirmed.
    pub total_orders: u32,
    /// Orders still pending.
    pub orders_pending: u32,
    /// Orders in progress.
    pub orders_in_progress: u32,
    /// Orders completed.
    pub orders_completed: u32,
    /// All items across orders.
    pub total_items: u32,
    /// Items currently separated.
    pub items_separated: u32,
    /// Items currently in the purchase queue.
    pub items_in_purchase: u32,
    /// Mean access-session duration over the last 30 days.
    pub average_separation_minutes: Option<f64>,
}

/// Coordinates parsing, state and fan-out for the separation workflow.
pub struct SeparationService {
    store: Arc<Store>,
    publisher: EventPublisher,
    order_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl SeparationService {
    /// Create the service.
    #[must_use]
    pub fn new(store: Arc<Store>, publisher: EventPublisher) -> Self {
        Self {
            store,
            publisher,
            order_locks: Mutex::new(HashMap::new()),
        }
    }

    fn order_lock(&self, order_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            self.order_locks
                .lock()
                .entry(order_id)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    /// Parse an uploaded PDF for preview. Extraction is CPU-bound and runs
    /// on the blocking pool so it never stalls the event loop.
    ///
    /// # Errors
    ///
    /// Returns the parse taxonomy; no order is created here.
    pub async fn preview_pdf(
        &self,
        bytes: Vec<u8>,
    ) -> Result<(ParsedOrder, ValidationInfo), ParseError> {
        tokio::task::spawn_blocking(move || parser::parse_quotation(&bytes))
            .await
            .map_err(|e| {
                warn!(error = %e, "pdf parse task failed");
                ParseError::ExtractionEmpty
            })?
    }

    /// Persist a confirmed parse result and announce it to the fleet.
    ///
    /// # Errors
    ///
    /// `DUPLICATE_ORDER_NUMBER` when the number is already taken.
    pub async fn confirm_order(
        &self,
        parsed: ParsedOrder,
        logistics_type: Option<LogisticsType>,
        package_type: Option<PackageType>,
        observations: Option<String>,
    ) -> Result<Order, AppError> {
        let order = self
            .store
            .create_order(
                &parsed,
                logistics_type,
                package_type,
                observations.as_deref(),
                Utc::now(),
            )
            .await?;

        info!(
            order_id = order.id,
            order_number = %order.order_number,
            items = order.items_count,
            "order confirmed"
        );
        self.publisher
            .publish_new_order(order.id, &order.order_number, &order.client_name);
        Ok(order)
    }

    /// Order summary.
    ///
    /// # Errors
    ///
    /// `ORDER_NOT_FOUND` when absent.
    pub async fn order_summary(&self, order_id: i64) -> Result<Order, AppError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| AppError::order_not_found(order_id))
    }

    /// Order detail with items. Opens an access-log session for the viewer.
    ///
    /// # Errors
    ///
    /// `ORDER_NOT_FOUND` when absent.
    pub async fn order_detail(&self, order_id: i64, actor: &Actor) -> Result<OrderDetail, AppError> {
        let (order, items) = self
            .store
            .get_order_with_items(order_id)
            .await?
            .ok_or_else(|| AppError::order_not_found(order_id))?;
        self.store.open_access(order_id, actor.id, Utc::now()).await?;
        Ok(OrderDetail { order, items })
    }

    /// Page through orders.
    ///
    /// # Errors
    ///
    /// `INVALID_REQUEST` on bad paging parameters.
    pub async fn list_orders(
        &self,
        page: u32,
        per_page: u32,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, AppError> {
        if page < 1 {
            return Err(AppError::invalid_request("page must be >= 1"));
        }
        if !(1..=100).contains(&per_page) {
            return Err(AppError::invalid_request("per_page must be between 1 and 100"));
        }
        let offset = (page - 1) * per_page;
        Ok(self.store.list_orders(offset, per_page, status).await?)
    }

    /// Apply a batch of item updates atomically and publish the events it
    /// produced, in order.
    ///
    /// # Errors
    ///
    /// `ORDER_NOT_FOUND`, `ITEM_NOT_IN_ORDER` (whole batch rolls back).
    pub async fn apply_batch(
        &self,
        order_id: i64,
        updates: Vec<ItemUpdate>,
        actor: &Actor,
    ) -> Result<OrderDetail, AppError> {
        let lock = self.order_lock(order_id);
        let _guard = lock.lock().await;

        let outcome = self
            .store
            .apply_item_updates(order_id, &updates, actor, Utc::now())
            .await?;

        info!(
            order_id,
            actor_id = actor.id,
            updates = updates.len(),
            transitions = outcome.events.len(),
            status = %outcome.order.status,
            "batch applied"
        );

        self.publisher.publish_batch(
            order_id,
            &outcome.events,
            outcome.order.progress_percentage(),
            outcome.newly_completed,
        );

        Ok(OrderDetail {
            order: outcome.order,
            items: outcome.items,
        })
    }

    /// Dispatch one item to the purchase queue.
    ///
    /// # Errors
    ///
    /// `ALREADY_SENT_TO_PURCHASE` when the item is already queued;
    /// `ORDER_NOT_FOUND` / `ITEM_NOT_FOUND` for missing handles.
    pub async fn send_item_to_purchase(
        &self,
        order_id: i64,
        item_id: i64,
        actor: &Actor,
    ) -> Result<PurchaseDispatch, AppError> {
        let lock = self.order_lock(order_id);
        let _guard = lock.lock().await;

        let (_, items) = self
            .store
            .get_order_with_items(order_id)
            .await?
            .ok_or_else(|| AppError::order_not_found(order_id))?;
        let item = items
            .iter()
            .find(|i| i.id == item_id)
            .ok_or_else(|| AppError::item_not_found(item_id))?;
        if item.sent_to_purchase {
            return Err(AppError::new(
                ErrorCode::AlreadySentToPurchase,
                "Item already sent to purchase",
            ));
        }

        let update = ItemUpdate {
            item_id,
            sent_to_purchase: Some(true),
            ..ItemUpdate::default()
        };
        let outcome = self
            .store
            .apply_item_updates(order_id, &[update], actor, Utc::now())
            .await?;

        let progress = outcome.order.progress_percentage();
        self.publisher
            .publish_batch(order_id, &outcome.events, progress, outcome.newly_completed);

        Ok(PurchaseDispatch {
            item_id,
            progress_percentage: progress,
        })
    }

    /// Manual completion override for admins and separators.
    ///
    /// # Errors
    ///
    /// `PERMISSION_DENIED` for other roles, `ALREADY_COMPLETED` when the
    /// order is already done, `ORDER_NOT_FOUND` when absent.
    pub async fn complete_order(&self, order_id: i64, actor: &Actor) -> Result<Order, AppError> {
        if !actor.role.can_complete_orders() {
            return Err(AppError::permission_denied(
                "Only admins and separators may complete orders",
            ));
        }

        let lock = self.order_lock(order_id);
        let _guard = lock.lock().await;

        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| AppError::order_not_found(order_id))?;
        if order.status == OrderStatus::Completed {
            return Err(AppError::new(
                ErrorCode::AlreadyCompleted,
                "Order is already completed",
            ));
        }

        let order = self.store.mark_order_completed(order_id, Utc::now()).await?;
        info!(order_id, actor_id = actor.id, "order completed manually");
        self.publisher.publish_order_completed(order_id);
        Ok(order)
    }

    /// Dashboard statistics: counters plus the average separation-session
    /// duration over the last 30 days.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn stats(&self) -> Result<OrderStats, AppError> {
        let counters = self.store.order_counters().await?;
        let access: AccessStats = self
            .store
            .separation_stats(None, None, 30, Utc::now())
            .await?;
        Ok(OrderStats {
            total_orders: counters.total_orders,
            orders_pending: counters.orders_pending,
            orders_in_progress: counters.orders_in_progress,
            orders_completed: counters.orders_completed,
            total_items: counters.total_items,
            items_separated: counters.items_separated,
            items_in_purchase: counters.items_in_purchase,
            average_separation_minutes: (access.total_accesses > 0).then_some(access.avg_minutes),
        })
    }

    /// The buyer's pending queue.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn purchase_queue(&self) -> Result<Vec<PurchaseQueueEntry>, AppError> {
        Ok(self.store.pending_purchase_items().await?)
    }

    /// Mark a purchase-queue entry fulfilled.
    ///
    /// # Errors
    ///
    /// `ITEM_NOT_FOUND` when the item has no queue entry,
    /// `ALREADY_COMPLETED` when it was fulfilled before.
    pub async fn complete_purchase(
        &self,
        item_id: i64,
        actor: &Actor,
        completion_notes: Option<String>,
    ) -> Result<(), AppError> {
        let completed = self
            .store
            .complete_purchase(item_id, actor.id, completion_notes.as_deref(), Utc::now())
            .await
            .map_err(|e| match e {
                crate::infrastructure::persistence::StoreError::NotFound => {
                    AppError::item_not_found(item_id)
                }
                other => other.into(),
            })?;
        if !completed {
            return Err(AppError::new(
                ErrorCode::AlreadyCompleted,
                "Purchase already completed",
            ));
        }
        info!(item_id, actor_id = actor.id, "purchase completed");
        Ok(())
    }
}
