//! Error taxonomy and HTTP mapping.
//!
//! Every recoverable failure maps to a stable machine-readable code and an
//! HTTP status. Per-request errors surface as structured JSON responses and
//! never tear down connections; per-socket errors close only that socket.
//!
//! | Code | Status |
//! |------|--------|
//! | `INVALID_FILE`, `PATTERN_MISS`, `ITEM_ARITHMETIC`, `EXTRACTION_EMPTY` | 400 |
//! | `DUPLICATE_ORDER_NUMBER`, `ITEM_NOT_IN_ORDER`, `ALREADY_COMPLETED`, `ALREADY_SENT_TO_PURCHASE`, `INVALID_REQUEST` | 400 |
//! | `UNAUTHORIZED` | 401 |
//! | `PERMISSION_DENIED`, `USER_INACTIVE` | 403 |
//! | `ORDER_NOT_FOUND`, `ITEM_NOT_FOUND` | 404 |
//! | `INTERNAL_ERROR` | 500 |

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::infrastructure::persistence::StoreError;
use crate::parser::ParseError;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // PDF errors
    /// Not a PDF, or over the size limit.
    InvalidFile,
    /// Both extraction backends produced no text.
    ExtractionEmpty,
    /// A required header field matched no pattern.
    PatternMiss,
    /// An item total disagrees with quantity × unit price.
    ItemArithmetic,

    // State errors
    /// The order number is already taken.
    DuplicateOrderNumber,
    /// Order handle did not resolve.
    OrderNotFound,
    /// Item handle did not resolve.
    ItemNotFound,
    /// A batch referenced an item outside its order.
    ItemNotInOrder,
    /// The order (or purchase entry) is already completed.
    AlreadyCompleted,
    /// The item is already in the purchase queue.
    AlreadySentToPurchase,

    // Authorization errors
    /// Missing or invalid credentials.
    Unauthorized,
    /// Authenticated but not allowed.
    PermissionDenied,
    /// The account is deactivated.
    UserInactive,

    // Request shape
    /// Malformed request.
    InvalidRequest,

    // Everything else
    /// Unexpected server failure.
    InternalError,
}

impl ErrorCode {
    /// Stable reason string for response bodies.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidFile => "INVALID_FILE",
            Self::ExtractionEmpty => "EXTRACTION_EMPTY",
            Self::PatternMiss => "PATTERN_MISS",
            Self::ItemArithmetic => "ITEM_ARITHMETIC",
            Self::DuplicateOrderNumber => "DUPLICATE_ORDER_NUMBER",
            Self::OrderNotFound => "ORDER_NOT_FOUND",
            Self::ItemNotFound => "ITEM_NOT_FOUND",
            Self::ItemNotInOrder => "ITEM_NOT_IN_ORDER",
            Self::AlreadyCompleted => "ALREADY_COMPLETED",
            Self::AlreadySentToPurchase => "ALREADY_SENT_TO_PURCHASE",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::UserInactive => "USER_INACTIVE",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for this code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidFile
            | Self::ExtractionEmpty
            | Self::PatternMiss
            | Self::ItemArithmetic
            | Self::DuplicateOrderNumber
            | Self::ItemNotInOrder
            | Self::AlreadyCompleted
            | Self::AlreadySentToPurchase
            | Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied | Self::UserInactive => StatusCode::FORBIDDEN,
            Self::OrderNotFound | Self::ItemNotFound => StatusCode::NOT_FOUND,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.reason())
    }
}

/// Application error: a code plus a short human-readable detail.
#[derive(Debug, Error)]
#[error("[{}] {detail}", .code.reason())]
pub struct AppError {
    code: ErrorCode,
    detail: String,
}

impl AppError {
    /// Create an error with an explicit code.
    #[must_use]
    pub fn new(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }

    /// Get the code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the detail.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Missing or invalid credentials.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, "Invalid or missing token")
    }

    /// Authenticated but not allowed.
    #[must_use]
    pub fn permission_denied(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, detail)
    }

    /// Order handle did not resolve.
    #[must_use]
    pub fn order_not_found(order_id: i64) -> Self {
        Self::new(ErrorCode::OrderNotFound, format!("Order {order_id} not found"))
    }

    /// Item handle did not resolve within the order.
    #[must_use]
    pub fn item_not_found(item_id: i64) -> Self {
        Self::new(ErrorCode::ItemNotFound, format!("Item {item_id} not found"))
    }

    /// Malformed request.
    #[must_use]
    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, detail)
    }

    /// Unexpected failure; the detail is logged, not leaked.
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, detail)
    }
}

/// JSON body for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable code.
    pub code: &'static str,
    /// Short human-readable detail.
    pub detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(code = %self.code, detail = %self.detail, "internal error");
        }
        let detail = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal server error".to_string()
        } else {
            self.detail
        };
        (
            status,
            Json(ErrorBody {
                code: self.code.reason(),
                detail,
            }),
        )
            .into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::new(ErrorCode::OrderNotFound, "Not found"),
            StoreError::DuplicateOrderNumber(number) => Self::new(
                ErrorCode::DuplicateOrderNumber,
                format!("Order {number} already exists"),
            ),
            StoreError::ItemNotInOrder(item_id) => Self::new(
                ErrorCode::ItemNotInOrder,
                format!("Item {item_id} does not belong to this order"),
            ),
            StoreError::Connection(_) | StoreError::Query(_) | StoreError::MissingField(_) => {
                Self::internal(err.to_string())
            }
        }
    }
}

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        let code = match &err {
            ParseError::InvalidFile(_) => ErrorCode::InvalidFile,
            ParseError::ExtractionEmpty => ErrorCode::ExtractionEmpty,
            ParseError::PatternMiss(_) => ErrorCode::PatternMiss,
            ParseError::ItemArithmetic { .. } => ErrorCode::ItemArithmetic,
        };
        Self::new(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorCode::DuplicateOrderNumber.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::OrderNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::PermissionDenied.status(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::InternalError.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_display_includes_code_and_detail() {
        let err = AppError::permission_denied("Sem permissão para completar pedidos");
        assert_eq!(
            err.to_string(),
            "[PERMISSION_DENIED] Sem permissão para completar pedidos"
        );
    }

    #[test]
    fn test_store_error_conversion() {
        let err: AppError = StoreError::DuplicateOrderNumber("99999".to_string()).into();
        assert_eq!(err.code(), ErrorCode::DuplicateOrderNumber);
        assert!(err.detail().contains("99999"));

        let err: AppError = StoreError::ItemNotInOrder(5).into();
        assert_eq!(err.code(), ErrorCode::ItemNotInOrder);
    }

    #[test]
    fn test_parse_error_conversion() {
        let err: AppError = ParseError::ExtractionEmpty.into();
        assert_eq!(err.code(), ErrorCode::ExtractionEmpty);
        assert_eq!(err.code().status(), StatusCode::BAD_REQUEST);
    }
}
