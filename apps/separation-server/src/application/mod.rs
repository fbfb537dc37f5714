//! Application layer: orchestration between the parser, the store, and the
//! broadcast fabric.

pub mod events;
pub mod orchestrator;

pub use events::EventPublisher;
pub use orchestrator::{OrderDetail, OrderStats, PurchaseDispatch, SeparationService};
