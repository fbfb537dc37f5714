//! Order and order-item storage, including the transactional batch apply.

use chrono::{DateTime, Utc};
use turso::{Connection, Row, Value};

use crate::domain::{
    Actor, ItemTransition, ItemUpdate, LogisticsType, Order, OrderItem, OrderStatus, PackageType,
    progress,
};
use crate::parser::ParsedOrder;

use super::{
    Store, StoreError, bool_value, exec, fmt_datetime, opt_datetime, opt_datetime_value, opt_i64,
    opt_i64_value, opt_text, opt_text_value, req_bool, req_date, req_datetime, req_decimal,
    req_i64, req_text, req_u32, text_value,
};

const ORDER_COLUMNS: &str = "id, order_number, client_name, seller_name, order_date, total_value, \
     logistics_type, package_type, observations, items_count, items_separated, \
     items_in_purchase, items_not_sent, status, created_at, updated_at, completed_at";

const ITEM_COLUMNS: &str = "id, order_id, product_code, product_reference, product_name, quantity, \
     unit_price, total_price, is_separated, separated_at, separated_by, \
     sent_to_purchase, sent_to_purchase_at, sent_to_purchase_by, \
     not_sent, not_sent_at, not_sent_by, not_sent_reason";

/// Counter totals for the dashboard.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderCounters {
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
}

/// One applied facet change with the progress value observed right after it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionEvent {
    /// Item the transition applies to.
    pub item_id: i64,
    /// What changed.
    pub transition: ItemTransition,
    /// Progress percentage after this update landed.
    pub progress_after: f64,
}

/// Result of a committed batch.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Order with recomputed counters and status.
    pub order: Order,
    /// All items after the batch.
    pub items: Vec<OrderItem>,
    /// Transitions in application order.
    pub events: Vec<TransitionEvent>,
    /// Whether this batch crossed into the completed state.
    pub newly_completed: bool,
}

fn row_order(row: &Row) -> Result<Order, StoreError> {
    let status_text = req_text(row, 13, "status")?;
    Ok(Order {
        id: req_i64(row, 0, "id")?,
        order_number: req_text(row, 1, "order_number")?,
        client_name: req_text(row, 2, "client_name")?,
        seller_name: req_text(row, 3, "seller_name")?,
        order_date: req_date(row, 4, "order_date")?,
        total_value: req_decimal(row, 5, "total_value")?,
        logistics_type: opt_text(row, 6).as_deref().and_then(LogisticsType::parse),
        package_type: opt_text(row, 7).as_deref().and_then(PackageType::parse),
        observations: opt_text(row, 8),
        items_count: req_u32(row, 9, "items_count")?,
        items_separated: req_u32(row, 10, "items_separated")?,
        items_in_purchase: req_u32(row, 11, "items_in_purchase")?,
        items_not_sent: req_u32(row, 12, "items_not_sent")?,
        status: OrderStatus::from_str_case_insensitive(&status_text)
            .ok_or_else(|| StoreError::MissingField(format!("status: {status_text}")))?,
        created_at: req_datetime(row, 14, "created_at")?,
        updated_at: req_datetime(row, 15, "updated_at")?,
        completed_at: opt_datetime(row, 16),
    })
}

fn row_item(row: &Row) -> Result<OrderItem, StoreError> {
    Ok(OrderItem {
        id: req_i64(row, 0, "id")?,
        order_id: req_i64(row, 1, "order_id")?,
        product_code: req_text(row, 2, "product_code")?,
        product_reference: req_text(row, 3, "product_reference")?,
        product_name: req_text(row, 4, "product_name")?,
        quantity: req_u32(row, 5, "quantity")?,
        unit_price: req_decimal(row, 6, "unit_price")?,
        total_price: req_decimal(row, 7, "total_price")?,
        is_separated: req_bool(row, 8, "is_separated")?,
        separated_at: opt_datetime(row, 9),
        separated_by: opt_i64(row, 10),
        sent_to_purchase: req_bool(row, 11, "sent_to_purchase")?,
        sent_to_purchase_at: opt_datetime(row, 12),
        sent_to_purchase_by: opt_i64(row, 13),
        not_sent: req_bool(row, 14, "not_sent")?,
        not_sent_at: opt_datetime(row, 15),
        not_sent_by: opt_i64(row, 16),
        not_sent_reason: opt_text(row, 17),
    })
}

async fn query_order(
    conn: &Connection,
    sql: &str,
    params: Vec<Value>,
) -> Result<Option<Order>, StoreError> {
    let mut rows = conn
        .query(sql, params)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
    match rows.next().await.map_err(|e| StoreError::Query(e.to_string()))? {
        Some(row) => Ok(Some(row_order(&row)?)),
        None => Ok(None),
    }
}

async fn query_items(conn: &Connection, order_id: i64) -> Result<Vec<OrderItem>, StoreError> {
    let mut rows = conn
        .query(
            &format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ? ORDER BY id"),
            vec![Value::Integer(order_id)],
        )
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

    let mut items = Vec::new();
    while let Some(row) = rows.next().await.map_err(|e| StoreError::Query(e.to_string()))? {
        items.push(row_item(&row)?);
    }
    Ok(items)
}

async fn write_item(conn: &Connection, item: &OrderItem) -> Result<(), StoreError> {
    exec(
        conn,
        "UPDATE order_items SET
            is_separated = ?, separated_at = ?, separated_by = ?,
            sent_to_purchase = ?, sent_to_purchase_at = ?, sent_to_purchase_by = ?,
            not_sent = ?, not_sent_at = ?, not_sent_by = ?, not_sent_reason = ?
         WHERE id = ?",
        vec![
            bool_value(item.is_separated),
            opt_datetime_value(item.separated_at),
            opt_i64_value(item.separated_by),
            bool_value(item.sent_to_purchase),
            opt_datetime_value(item.sent_to_purchase_at),
            opt_i64_value(item.sent_to_purchase_by),
            bool_value(item.not_sent),
            opt_datetime_value(item.not_sent_at),
            opt_i64_value(item.not_sent_by),
            opt_text_value(item.not_sent_reason.as_deref()),
            Value::Integer(item.id),
        ],
    )
    .await?;
    Ok(())
}

async fn write_order_state(conn: &Connection, order: &Order) -> Result<(), StoreError> {
    exec(
        conn,
        "UPDATE orders SET
            items_count = ?, items_separated = ?, items_in_purchase = ?, items_not_sent = ?,
            status = ?, updated_at = ?, completed_at = ?
         WHERE id = ?",
        vec![
            Value::Integer(i64::from(order.items_count)),
            Value::Integer(i64::from(order.items_separated)),
            Value::Integer(i64::from(order.items_in_purchase)),
            Value::Integer(i64::from(order.items_not_sent)),
            text_value(order.status.as_str()),
            Value::Text(fmt_datetime(order.updated_at)),
            opt_datetime_value(order.completed_at),
            Value::Integer(order.id),
        ],
    )
    .await?;
    Ok(())
}

fn running_progress(items: &[OrderItem]) -> f64 {
    let separated = items.iter().filter(|i| i.is_separated).count() as u32;
    let not_sent = items.iter().filter(|i| i.not_sent).count() as u32;
    progress::progress_percentage(separated, not_sent, items.len() as u32)
}

impl Store {
    /// Persist a confirmed parse result as a new order with its items.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateOrderNumber`] when an order with the
    /// same number already exists.
    pub async fn create_order(
        &self,
        parsed: &ParsedOrder,
        logistics_type: Option<LogisticsType>,
        package_type: Option<PackageType>,
        observations: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        let conn = self.connect()?;
        exec(&conn, "BEGIN IMMEDIATE", Vec::new()).await?;

        let result = Self::create_order_tx(
            &conn,
            parsed,
            logistics_type,
            package_type,
            observations,
            now,
        )
        .await;
        match result {
            Ok(order) => {
                exec(&conn, "COMMIT", Vec::new()).await?;
                Ok(order)
            }
            Err(e) => {
                let _ = exec(&conn, "ROLLBACK", Vec::new()).await;
                Err(e)
            }
        }
    }

    async fn create_order_tx(
        conn: &Connection,
        parsed: &ParsedOrder,
        logistics_type: Option<LogisticsType>,
        package_type: Option<PackageType>,
        observations: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        let existing = query_order(
            conn,
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = ?"),
            vec![text_value(&parsed.order_number)],
        )
        .await?;
        if existing.is_some() {
            return Err(StoreError::DuplicateOrderNumber(parsed.order_number.clone()));
        }

        exec(
            conn,
            "INSERT INTO orders (
                order_number, client_name, seller_name, order_date, total_value,
                logistics_type, package_type, observations, items_count,
                status, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)",
            vec![
                text_value(&parsed.order_number),
                text_value(&parsed.client_name),
                text_value(&parsed.seller_name),
                Value::Text(parsed.order_date.to_string()),
                Value::Text(parsed.total_value.to_string()),
                opt_text_value(logistics_type.map(|l| l.as_str())),
                opt_text_value(package_type.map(|p| p.as_str())),
                opt_text_value(observations),
                Value::Integer(parsed.items.len() as i64),
                Value::Text(fmt_datetime(now)),
                Value::Text(fmt_datetime(now)),
            ],
        )
        .await?;

        let order = query_order(
            conn,
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = ?"),
            vec![text_value(&parsed.order_number)],
        )
        .await?
        .ok_or(StoreError::NotFound)?;

        for item in &parsed.items {
            exec(
                conn,
                "INSERT INTO order_items (
                    order_id, product_code, product_reference, product_name,
                    quantity, unit_price, total_price
                 ) VALUES (?, ?, ?, ?, ?, ?, ?)",
                vec![
                    Value::Integer(order.id),
                    text_value(&item.product_code),
                    text_value(&item.product_reference),
                    text_value(&item.product_name),
                    Value::Integer(i64::from(item.quantity)),
                    Value::Text(item.unit_price.to_string()),
                    Value::Text(item.total_price.to_string()),
                ],
            )
            .await?;
        }

        Ok(order)
    }

    /// Load one order by handle.
    pub async fn get_order(&self, order_id: i64) -> Result<Option<Order>, StoreError> {
        let conn = self.connect()?;
        query_order(
            &conn,
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"),
            vec![Value::Integer(order_id)],
        )
        .await
    }

    /// Load one order by its unique number.
    pub async fn get_order_by_number(&self, number: &str) -> Result<Option<Order>, StoreError> {
        let conn = self.connect()?;
        query_order(
            &conn,
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = ?"),
            vec![text_value(number)],
        )
        .await
    }

    /// Snapshot read of an order with its items. Everything the caller needs
    /// is loaded here; there are no lazy traversals afterwards.
    pub async fn get_order_with_items(
        &self,
        order_id: i64,
    ) -> Result<Option<(Order, Vec<OrderItem>)>, StoreError> {
        let conn = self.connect()?;
        let Some(order) = query_order(
            &conn,
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"),
            vec![Value::Integer(order_id)],
        )
        .await?
        else {
            return Ok(None);
        };
        let items = query_items(&conn, order_id).await?;
        Ok(Some((order, items)))
    }

    /// Page through orders, newest first, optionally filtered by status.
    pub async fn list_orders(
        &self,
        offset: u32,
        limit: u32,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, StoreError> {
        let conn = self.connect()?;
        let (sql, params) = match status {
            Some(status) => (
                format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE status = ? \
                     ORDER BY created_at DESC LIMIT ? OFFSET ?"
                ),
                vec![
                    text_value(status.as_str()),
                    Value::Integer(i64::from(limit)),
                    Value::Integer(i64::from(offset)),
                ],
            ),
            None => (
                format!(
                    "SELECT {ORDER_COLUMNS} FROM orders \
                     ORDER BY created_at DESC LIMIT ? OFFSET ?"
                ),
                vec![
                    Value::Integer(i64::from(limit)),
                    Value::Integer(i64::from(offset)),
                ],
            ),
        };

        let mut rows = conn
            .query(&sql, params)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        let mut orders = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| StoreError::Query(e.to_string()))? {
            orders.push(row_order(&row)?);
        }
        Ok(orders)
    }

    /// Apply a batch of item updates atomically: either every update lands
    /// and the counters advance, or nothing is persisted.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when the order is absent,
    /// [`StoreError::ItemNotInOrder`] when any update targets a foreign or
    /// missing item (the whole batch rolls back).
    pub async fn apply_item_updates(
        &self,
        order_id: i64,
        updates: &[ItemUpdate],
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<BatchOutcome, StoreError> {
        let conn = self.connect()?;
        exec(&conn, "BEGIN IMMEDIATE", Vec::new()).await?;

        let result = Self::apply_item_updates_tx(&conn, order_id, updates, actor, now).await;
        match result {
            Ok(outcome) => {
                exec(&conn, "COMMIT", Vec::new()).await?;
                Ok(outcome)
            }
            Err(e) => {
                let _ = exec(&conn, "ROLLBACK", Vec::new()).await;
                Err(e)
            }
        }
    }

    async fn apply_item_updates_tx(
        conn: &Connection,
        order_id: i64,
        updates: &[ItemUpdate],
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<BatchOutcome, StoreError> {
        let mut order = query_order(
            conn,
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"),
            vec![Value::Integer(order_id)],
        )
        .await?
        .ok_or(StoreError::NotFound)?;

        let mut items = query_items(conn, order_id).await?;

        let mut events = Vec::new();
        let mut touched: Vec<i64> = Vec::new();
        for update in updates {
            let idx = items
                .iter()
                .position(|i| i.id == update.item_id)
                .ok_or(StoreError::ItemNotInOrder(update.item_id))?;

            let transitions = items[idx].apply(update, actor.id, now);
            if !transitions.is_empty() && !touched.contains(&update.item_id) {
                touched.push(update.item_id);
            }
            let progress_after = running_progress(&items);
            for transition in transitions {
                events.push(TransitionEvent {
                    item_id: update.item_id,
                    transition,
                    progress_after,
                });
            }
        }

        for item_id in &touched {
            let item = items
                .iter()
                .find(|i| i.id == *item_id)
                .ok_or(StoreError::ItemNotInOrder(*item_id))?;
            write_item(conn, item).await?;
        }

        for event in &events {
            match event.transition {
                ItemTransition::SentToPurchase => {
                    exec(
                        conn,
                        "INSERT INTO purchase_items (order_item_id, requested_at, requested_by)
                         VALUES (?, ?, ?)",
                        vec![
                            Value::Integer(event.item_id),
                            Value::Text(fmt_datetime(now)),
                            Value::Integer(actor.id),
                        ],
                    )
                    .await?;
                }
                ItemTransition::PurchaseReverted => {
                    exec(
                        conn,
                        "DELETE FROM purchase_items WHERE order_item_id = ?",
                        vec![Value::Integer(event.item_id)],
                    )
                    .await?;
                }
                _ => {}
            }
        }

        let snapshot = order.recompute(&items, now);
        write_order_state(conn, &order).await?;

        Ok(BatchOutcome {
            order,
            items,
            events,
            newly_completed: snapshot.newly_completed,
        })
    }

    /// Manual completion override: stamp the completed status regardless of
    /// item facets. Counters are still recounted from the items.
    pub async fn mark_order_completed(
        &self,
        order_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        let conn = self.connect()?;
        let mut order = query_order(
            &conn,
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"),
            vec![Value::Integer(order_id)],
        )
        .await?
        .ok_or(StoreError::NotFound)?;

        let items = query_items(&conn, order_id).await?;
        order.recompute(&items, now);
        order.mark_completed(now);
        write_order_state(&conn, &order).await?;
        Ok(order)
    }

    /// Counter totals for the dashboard.
    pub async fn order_counters(&self) -> Result<OrderCounters, StoreError> {
        let conn = self.connect()?;
        let mut counters = OrderCounters::default();

        let mut rows = conn
            .query(
                "SELECT status, COUNT(*) FROM orders GROUP BY status",
                Vec::<Value>::new(),
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        while let Some(row) = rows.next().await.map_err(|e| StoreError::Query(e.to_string()))? {
            let status = req_text(&row, 0, "status")?;
            let count = req_u32(&row, 1, "count")?;
            counters.total_orders += count;
            match OrderStatus::from_str_case_insensitive(&status) {
                Some(OrderStatus::Pending) => counters.orders_pending = count,
                Some(OrderStatus::InProgress) => counters.orders_in_progress = count,
                Some(OrderStatus::Completed) => counters.orders_completed = count,
                _ => {}
            }
        }

        counters.total_items = self.scalar_count("SELECT COUNT(*) FROM order_items").await?;
        counters.items_separated = self
            .scalar_count("SELECT COUNT(*) FROM order_items WHERE is_separated = 1")
            .await?;
        counters.items_in_purchase = self
            .scalar_count("SELECT COUNT(*) FROM order_items WHERE sent_to_purchase = 1")
            .await?;
        Ok(counters)
    }

    pub(crate) async fn scalar_count(&self, sql: &str) -> Result<u32, StoreError> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(sql, Vec::<Value>::new())
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        match rows.next().await.map_err(|e| StoreError::Query(e.to_string()))? {
            Some(row) => req_u32(&row, 0, "count"),
            None => Ok(0),
        }
    }
}
