// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::needless_pass_by_value
    )
)]

//! Separation Server - Library
//!
//! Real-time coordination of warehouse order picking. A printed quotation
//! PDF is parsed into a live order against which multiple operators mark
//! items picked, route them to the purchase queue, or declare them
//! undeliverable; every mutation recomputes progress and fans out to the
//! operators attached to that order.
//!
//! # Architecture
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: pure order/item state machine and progress policy
//!   - `order`: aggregate, counters, status lifecycle
//!   - `item`: independent status facets with transition facts
//!   - `progress`: percentage and completion predicate
//! - **Parser**: the PDF extraction pipeline
//!   - `extractor` → `normalize` → `sieve` → `{fields, items}` → `validate`
//! - **Application**: orchestration
//!   - `orchestrator`: per-order-serialized batch apply, confirm, queries
//!   - `events`: transition → broadcast event mapping
//! - **Infrastructure**: adapters
//!   - `persistence`: Turso store (orders, items, accesses, purchases, users)
//!   - `http`: axum REST surface
//!   - `ws`: presence registry, broadcast fabric, WebSocket endpoint
//!   - `auth`: bearer-token verification

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod parser;
pub mod telemetry;

pub use application::{EventPublisher, SeparationService};
pub use config::Settings;
pub use domain::{Actor, ItemUpdate, Order, OrderItem, OrderStatus, Role};
pub use error::{AppError, ErrorCode};
pub use infrastructure::auth::TokenVerifier;
pub use infrastructure::http::{AppState, create_router};
pub use infrastructure::persistence::Store;
pub use infrastructure::ws::{BroadcastFabric, PresenceRegistry};
pub use parser::{ParseError, ParsedOrder, parse_quotation};
