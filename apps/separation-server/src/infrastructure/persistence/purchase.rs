//! Purchase queue storage.
//!
//! Entries are created and deleted by the batch apply in `orders.rs`; this
//! module covers the buyer-facing queue listing and fulfilment.

use chrono::{DateTime, Utc};
use turso::{Row, Value};

use super::{
    Store, StoreError, exec, fmt_datetime, opt_datetime, opt_text_value, req_datetime, req_i64,
    req_text, req_u32,
};

/// One pending entry in the buyer's queue, joined with its item and order.
#[derive(Debug, Clone)]
pub struct PurchaseQueueEntry {
    /// Queue-entry handle.
    pub purchase_id: i64,
    /// Item awaiting procurement.
    pub item_id: i64,
    /// Owning order.
    pub order_id: i64,
    /// Order number, for the buyer's display.
    pub order_number: String,
    /// Client name, for the buyer's display.
    pub client_name: String,
    /// Product code.
    pub product_code: String,
    /// Product name.
    pub product_name: String,
    /// Quantity needed.
    pub quantity: u32,
    /// When the item was routed to the queue.
    pub requested_at: DateTime<Utc>,
    /// Fulfilment time, when completed.
    pub completed_at: Option<DateTime<Utc>>,
}

fn row_entry(row: &Row) -> Result<PurchaseQueueEntry, StoreError> {
    Ok(PurchaseQueueEntry {
        purchase_id: req_i64(row, 0, "purchase_id")?,
        item_id: req_i64(row, 1, "item_id")?,
        order_id: req_i64(row, 2, "order_id")?,
        order_number: req_text(row, 3, "order_number")?,
        client_name: req_text(row, 4, "client_name")?,
        product_code: req_text(row, 5, "product_code")?,
        product_name: req_text(row, 6, "product_name")?,
        quantity: req_u32(row, 7, "quantity")?,
        requested_at: req_datetime(row, 8, "requested_at")?,
        completed_at: opt_datetime(row, 9),
    })
}

impl Store {
    /// Pending (unfulfilled) queue entries, oldest request first.
    pub async fn pending_purchase_items(&self) -> Result<Vec<PurchaseQueueEntry>, StoreError> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT p.id, i.id, o.id, o.order_number, o.client_name,
                        i.product_code, i.product_name, i.quantity,
                        p.requested_at, p.completed_at
                 FROM purchase_items p
                 JOIN order_items i ON i.id = p.order_item_id
                 JOIN orders o ON o.id = i.order_id
                 WHERE p.is_completed = 0
                 ORDER BY p.requested_at",
                Vec::<Value>::new(),
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| StoreError::Query(e.to_string()))? {
            entries.push(row_entry(&row)?);
        }
        Ok(entries)
    }

    /// Mark a queue entry fulfilled. The entry stays on record; only the
    /// completion fields change.
    ///
    /// Returns `false` when the entry was already completed.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when the item has no queue entry.
    pub async fn complete_purchase(
        &self,
        item_id: i64,
        completed_by: i64,
        completion_notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT id, is_completed FROM purchase_items WHERE order_item_id = ?",
                vec![Value::Integer(item_id)],
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?
            .ok_or(StoreError::NotFound)?;
        let purchase_id = req_i64(&row, 0, "id")?;
        if req_i64(&row, 1, "is_completed")? != 0 {
            return Ok(false);
        }

        exec(
            &conn,
            "UPDATE purchase_items SET
                is_completed = 1, completed_at = ?, completed_by = ?, completion_notes = ?
             WHERE id = ?",
            vec![
                Value::Text(fmt_datetime(now)),
                Value::Integer(completed_by),
                opt_text_value(completion_notes),
                Value::Integer(purchase_id),
            ],
        )
        .await?;
        Ok(true)
    }

    /// Whether an item currently has a queue entry.
    pub async fn has_purchase_entry(&self, item_id: i64) -> Result<bool, StoreError> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT 1 FROM purchase_items WHERE order_item_id = ?",
                vec![Value::Integer(item_id)],
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(rows
            .next()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?
            .is_some())
    }
}
