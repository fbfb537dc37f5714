//! Request payloads for the REST surface.

use serde::Deserialize;

use crate::domain::ItemUpdate;
use crate::parser::ParsedOrder;

/// Body of `POST /orders/confirm`: the previewed parse result plus the
/// seller's shipping choices.
#[derive(Debug, Deserialize)]
pub struct ConfirmOrderRequest {
    /// Parse result returned by the upload preview.
    pub pdf_data: ParsedOrder,
    /// Display variant of the logistics type, normalized before storage.
    pub logistics_type: Option<String>,
    /// Display variant of the package type, normalized before storage.
    pub package_type: Option<String>,
    /// Free text, at most 500 characters.
    pub observations: Option<String>,
}

/// Query string of `GET /orders`.
#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Page size, at most 100.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Optional status filter.
    pub status: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

/// Body of `PATCH /orders/{id}/items`.
#[derive(Debug, Deserialize)]
pub struct BatchUpdateRequest {
    /// Per-item updates, applied atomically in order.
    pub updates: Vec<ItemUpdate>,
}

/// Body of `POST /orders/purchase-items/{item_id}/complete`.
#[derive(Debug, Default, Deserialize)]
pub struct CompletePurchaseRequest {
    /// Buyer's notes about the fulfilment.
    pub completion_notes: Option<String>,
}

/// Query string of the WebSocket endpoint.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Bearer token; the socket closes with 1008 when absent or invalid.
    pub token: Option<String>,
}
