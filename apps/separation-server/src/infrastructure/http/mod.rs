//! HTTP Layer (Driver Adapter)
//!
//! Axum-based REST API that delegates to the separation service.

mod controller;
pub mod request;
pub mod response;

pub use controller::{AppState, CurrentUser, create_router};
