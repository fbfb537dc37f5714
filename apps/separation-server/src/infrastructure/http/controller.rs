//! HTTP controller: the axum REST surface.
//!
//! Handlers stay thin: extract, authenticate, delegate to the separation
//! service, map the result. Error translation to status codes lives in
//! `crate::error`.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router, extract::FromRequestParts};
use tracing::warn;

use crate::application::SeparationService;
use crate::config::Settings;
use crate::domain::{Actor, LogisticsType, OrderStatus, PackageType};
use crate::error::AppError;
use crate::infrastructure::auth::{TokenVerifier, authenticate};
use crate::infrastructure::persistence::Store;
use crate::infrastructure::ws;
use crate::infrastructure::ws::PresenceRegistry;

use super::request::{
    BatchUpdateRequest, CompletePurchaseRequest, ConfirmOrderRequest, ListOrdersQuery,
};
use super::response::{
    AckResponse, HealthResponse, OrderDetailResponse, OrderResponse, PurchaseDispatchResponse,
    PurchaseItemResponse, StatsResponse, UploadResponse,
};

/// Maximum length of the free-text observations field.
const MAX_OBSERVATIONS_CHARS: usize = 500;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Orchestrator for every order operation.
    pub service: Arc<SeparationService>,
    /// Store, for auth lookups and the WebSocket access log.
    pub store: Arc<Store>,
    /// Bearer-token verifier.
    pub auth: Arc<TokenVerifier>,
    /// Presence registry, consumed by the WebSocket endpoint.
    pub registry: Arc<PresenceRegistry>,
    /// Fan-out router.
    pub fabric: Arc<ws::BroadcastFabric>,
    /// Server settings.
    pub settings: Arc<Settings>,
    /// Application version.
    pub version: String,
}

/// Authenticated operator, extracted from the `Authorization` header.
pub struct CurrentUser(pub Actor);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(AppError::unauthorized)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(AppError::unauthorized)?;
        let actor = authenticate(&state.auth, &state.store, token).await?;
        Ok(Self(actor))
    }
}

/// Create the HTTP router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let max_body = state.settings.upload.max_upload_bytes + 64 * 1024;
    Router::new()
        .route("/health", get(health))
        .route("/orders/upload", post(upload_pdf))
        .route("/orders/confirm", post(confirm_order))
        .route("/orders", get(list_orders))
        .route("/orders/stats", get(order_stats))
        .route("/orders/purchase-items", get(purchase_items))
        .route(
            "/orders/purchase-items/{item_id}/complete",
            post(complete_purchase),
        )
        .route("/orders/{id}", get(order_summary))
        .route("/orders/{id}/detail", get(order_detail))
        .route("/orders/{id}/items", patch(update_order_items))
        .route(
            "/orders/{id}/items/{item_id}/purchase",
            patch(send_item_to_purchase),
        )
        .route("/orders/{id}/complete", post(complete_order))
        .route("/ws/orders", get(ws::ws_orders))
        .layer(DefaultBodyLimit::max(max_body))
        .with_state(state)
}

/// Health check endpoint (unauthenticated).
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: state.version,
    })
}

/// Multipart PDF upload; returns the parse preview.
async fn upload_pdf(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::invalid_request(format!("malformed multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::invalid_request(format!("could not read upload: {e}")))?;
            file = Some((filename, bytes.to_vec()));
        }
    }
    let (filename, bytes) =
        file.ok_or_else(|| AppError::invalid_request("multipart field 'file' is required"))?;

    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(AppError::new(
            crate::error::ErrorCode::InvalidFile,
            "Only PDF files are allowed",
        ));
    }
    if bytes.len() > state.settings.upload.max_upload_bytes {
        return Err(AppError::new(
            crate::error::ErrorCode::InvalidFile,
            "File too large (max 10 MiB)",
        ));
    }

    match state.service.preview_pdf(bytes).await {
        Ok((parsed, info)) => {
            tracing::info!(
                actor_id = actor.id,
                order_number = %parsed.order_number,
                items = parsed.items.len(),
                "pdf parsed for preview"
            );
            Ok(Json(UploadResponse {
                success: true,
                message: "PDF parsed successfully".to_string(),
                data: Some(parsed),
                errors: None,
                validation_info: Some(info),
            }))
        }
        Err(e) => {
            warn!(actor_id = actor.id, code = e.code(), error = %e, "pdf parse failed");
            Ok(Json(UploadResponse {
                success: false,
                message: "Could not parse the PDF".to_string(),
                data: None,
                errors: Some(vec![format!("{}: {e}", e.code())]),
                validation_info: None,
            }))
        }
    }
}

/// Persist a previewed order.
async fn confirm_order(
    State(state): State<AppState>,
    CurrentUser(_actor): CurrentUser,
    Json(request): Json<ConfirmOrderRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    let logistics_type = parse_enum_field(request.logistics_type.as_deref(), LogisticsType::parse, "logistics_type")?;
    let package_type = parse_enum_field(request.package_type.as_deref(), PackageType::parse, "package_type")?;

    if let Some(obs) = &request.observations {
        if obs.chars().count() > MAX_OBSERVATIONS_CHARS {
            return Err(AppError::invalid_request(
                "observations must be at most 500 characters",
            ));
        }
    }

    let order = state
        .service
        .confirm_order(
            request.pdf_data,
            logistics_type,
            package_type,
            request.observations,
        )
        .await?;
    Ok(Json(order.into()))
}

fn parse_enum_field<T>(
    raw: Option<&str>,
    parse: impl Fn(&str) -> Option<T>,
    field: &str,
) -> Result<Option<T>, AppError> {
    match raw {
        None => Ok(None),
        Some(value) => parse(value)
            .map(Some)
            .ok_or_else(|| AppError::invalid_request(format!("invalid {field}: {value}"))),
    }
}

/// Paginated listing with optional status filter.
async fn list_orders(
    State(state): State<AppState>,
    CurrentUser(_actor): CurrentUser,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => Some(
            OrderStatus::from_str_case_insensitive(raw)
                .ok_or_else(|| AppError::invalid_request(format!("invalid status: {raw}")))?,
        ),
    };
    let orders = state
        .service
        .list_orders(query.page, query.per_page, status)
        .await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// Order summary.
async fn order_summary(
    State(state): State<AppState>,
    CurrentUser(_actor): CurrentUser,
    Path(order_id): Path<i64>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.service.order_summary(order_id).await?;
    Ok(Json(order.into()))
}

/// Order detail with items; opens an access-log session for the viewer.
async fn order_detail(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(order_id): Path<i64>,
) -> Result<Json<OrderDetailResponse>, AppError> {
    let detail = state.service.order_detail(order_id, &actor).await?;
    Ok(Json(detail.into()))
}

/// Batched item mutation.
async fn update_order_items(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(order_id): Path<i64>,
    Json(request): Json<BatchUpdateRequest>,
) -> Result<Json<OrderDetailResponse>, AppError> {
    if request.updates.is_empty() {
        return Err(AppError::invalid_request("updates cannot be empty"));
    }
    let detail = state
        .service
        .apply_batch(order_id, request.updates, &actor)
        .await?;
    Ok(Json(detail.into()))
}

/// Single-item purchase dispatch.
async fn send_item_to_purchase(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path((order_id, item_id)): Path<(i64, i64)>,
) -> Result<Json<PurchaseDispatchResponse>, AppError> {
    let dispatch = state
        .service
        .send_item_to_purchase(order_id, item_id, &actor)
        .await?;
    Ok(Json(PurchaseDispatchResponse {
        success: true,
        item_id: dispatch.item_id,
        progress_percentage: dispatch.progress_percentage,
    }))
}

/// Manual completion (admin/separator only).
async fn complete_order(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(order_id): Path<i64>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.service.complete_order(order_id, &actor).await?;
    Ok(Json(order.into()))
}

/// Dashboard statistics.
async fn order_stats(
    State(state): State<AppState>,
    CurrentUser(_actor): CurrentUser,
) -> Result<Json<StatsResponse>, AppError> {
    let stats = state.service.stats().await?;
    Ok(Json(stats.into()))
}

/// Pending purchase queue.
async fn purchase_items(
    State(state): State<AppState>,
    CurrentUser(_actor): CurrentUser,
) -> Result<Json<Vec<PurchaseItemResponse>>, AppError> {
    let entries = state.service.purchase_queue().await?;
    Ok(Json(
        entries.into_iter().map(PurchaseItemResponse::from).collect(),
    ))
}

/// Buyer fulfils a purchase-queue entry. The body is optional.
async fn complete_purchase(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(item_id): Path<i64>,
    body: axum::body::Bytes,
) -> Result<Json<AckResponse>, AppError> {
    let notes = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<CompletePurchaseRequest>(&body)
            .map_err(|e| AppError::invalid_request(format!("malformed body: {e}")))?
            .completion_notes
    };
    state.service.complete_purchase(item_id, &actor, notes).await?;
    Ok(Json(AckResponse {
        success: true,
        message: "Purchase completed",
    }))
}
