//! Response payloads for the REST surface.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::application::{OrderDetail, OrderStats};
use crate::domain::{Order, OrderItem, OrderStatus};
use crate::infrastructure::persistence::PurchaseQueueEntry;
use crate::parser::{ParsedOrder, ValidationInfo};

/// `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process answers.
    pub status: &'static str,
    /// Application version.
    pub version: String,
}

/// Preview envelope for `POST /orders/upload`. Parse failures come back in
/// this envelope with `success = false`; only wrong type/size is an HTTP
/// error.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Whether the document parsed.
    pub success: bool,
    /// Short human-readable summary.
    pub message: String,
    /// Parsed order, present on success.
    pub data: Option<ParsedOrder>,
    /// Parse error codes and messages, present on failure.
    pub errors: Option<Vec<String>>,
    /// Arithmetic summary for seller confirmation, present on success.
    pub validation_info: Option<ValidationInfo>,
}

/// Order summary.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    /// Internal handle.
    pub id: i64,
    /// Quotation number.
    pub order_number: String,
    /// Client name.
    pub client_name: String,
    /// Seller name.
    pub seller_name: String,
    /// Quotation date.
    pub order_date: NaiveDate,
    /// Document total.
    pub total_value: Decimal,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Total items.
    pub items_count: u32,
    /// Progress percentage.
    pub progress_percentage: f64,
    /// Confirmation time.
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        let progress_percentage = order.progress_percentage();
        Self {
            id: order.id,
            order_number: order.order_number,
            client_name: order.client_name,
            seller_name: order.seller_name,
            order_date: order.order_date,
            total_value: order.total_value,
            status: order.status,
            items_count: order.items_count,
            progress_percentage,
            created_at: order.created_at,
        }
    }
}

/// One item inside the detail payload.
#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    /// Item handle.
    pub id: i64,
    /// Product code.
    pub product_code: String,
    /// Supplier reference.
    pub product_reference: String,
    /// Display name.
    pub product_name: String,
    /// Quantity ordered.
    pub quantity: u32,
    /// Unit price.
    pub unit_price: Decimal,
    /// Line total.
    pub total_price: Decimal,
    /// Separation facet.
    pub separated: bool,
    /// Purchase facet.
    pub sent_to_purchase: bool,
    /// Not-sent facet.
    pub not_sent: bool,
    /// When the item was picked.
    pub separated_at: Option<DateTime<Utc>>,
    /// When it was routed to the purchase queue.
    pub sent_to_purchase_at: Option<DateTime<Utc>>,
    /// When it was declared undeliverable.
    pub not_sent_at: Option<DateTime<Utc>>,
    /// Why it cannot be delivered.
    pub not_sent_reason: Option<String>,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            id: item.id,
            product_code: item.product_code,
            product_reference: item.product_reference,
            product_name: item.product_name,
            quantity: item.quantity,
            unit_price: item.unit_price,
            total_price: item.total_price,
            separated: item.is_separated,
            sent_to_purchase: item.sent_to_purchase,
            not_sent: item.not_sent,
            separated_at: item.separated_at,
            sent_to_purchase_at: item.sent_to_purchase_at,
            not_sent_at: item.not_sent_at,
            not_sent_reason: item.not_sent_reason,
        }
    }
}

/// Full detail with items.
#[derive(Debug, Serialize)]
pub struct OrderDetailResponse {
    /// Internal handle.
    pub id: i64,
    /// Quotation number.
    pub order_number: String,
    /// Client name.
    pub client_name: String,
    /// Seller name.
    pub seller_name: String,
    /// Quotation date.
    pub order_date: NaiveDate,
    /// Document total.
    pub total_value: Decimal,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Canonical logistics name, when chosen.
    pub logistics_type: Option<&'static str>,
    /// Canonical package name, when chosen.
    pub package_type: Option<&'static str>,
    /// Seller's free text.
    pub observations: Option<String>,
    /// Total items.
    pub items_count: u32,
    /// Items separated.
    pub items_separated: u32,
    /// Items in the purchase queue.
    pub items_in_purchase: u32,
    /// Items declared not sendable.
    pub items_not_sent: u32,
    /// Progress percentage.
    pub progress_percentage: f64,
    /// Confirmation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// Completion time, when completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// Items in insertion order.
    pub items: Vec<OrderItemResponse>,
}

impl From<OrderDetail> for OrderDetailResponse {
    fn from(detail: OrderDetail) -> Self {
        let progress_percentage = detail.progress_percentage();
        let OrderDetail { order, items } = detail;
        Self {
            id: order.id,
            order_number: order.order_number,
            client_name: order.client_name,
            seller_name: order.seller_name,
            order_date: order.order_date,
            total_value: order.total_value,
            status: order.status,
            logistics_type: order.logistics_type.map(|l| l.as_str()),
            package_type: order.package_type.map(|p| p.as_str()),
            observations: order.observations,
            items_count: order.items_count,
            items_separated: order.items_separated,
            items_in_purchase: order.items_in_purchase,
            items_not_sent: order.items_not_sent,
            progress_percentage,
            created_at: order.created_at,
            updated_at: order.updated_at,
            completed_at: order.completed_at,
            items: items.into_iter().map(OrderItemResponse::from).collect(),
        }
    }
}

/// `GET /orders/stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
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

impl From<OrderStats> for StatsResponse {
    fn from(stats: OrderStats) -> Self {
        Self {
            total_orders: stats.total_orders,
            orders_pending: stats.orders_pending,
            orders_in_progress: stats.orders_in_progress,
            orders_completed: stats.orders_completed,
            total_items: stats.total_items,
            items_separated: stats.items_separated,
            items_in_purchase: stats.items_in_purchase,
            average_separation_minutes: stats.average_separation_minutes,
        }
    }
}

/// One row of `GET /orders/purchase-items`.
#[derive(Debug, Serialize)]
pub struct PurchaseItemResponse {
    /// Item handle.
    pub id: i64,
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

impl From<PurchaseQueueEntry> for PurchaseItemResponse {
    fn from(entry: PurchaseQueueEntry) -> Self {
        Self {
            id: entry.item_id,
            order_id: entry.order_id,
            order_number: entry.order_number,
            client_name: entry.client_name,
            product_code: entry.product_code,
            product_name: entry.product_name,
            quantity: entry.quantity,
            requested_at: entry.requested_at,
            completed_at: entry.completed_at,
        }
    }
}

/// Acknowledgement for mutating endpoints that return no entity.
#[derive(Debug, Serialize)]
pub struct AckResponse {
    /// Always true; failures surface as error responses.
    pub success: bool,
    /// Short human-readable confirmation.
    pub message: &'static str,
}

/// Result of `PATCH /orders/{id}/items/{item_id}/purchase`.
#[derive(Debug, Serialize)]
pub struct PurchaseDispatchResponse {
    /// Always true; failures surface as error responses.
    pub success: bool,
    /// The dispatched item.
    pub item_id: i64,
    /// Order progress after the dispatch.
    pub progress_percentage: f64,
}
