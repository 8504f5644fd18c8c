//! Orders
//!
//! Orders are placed from cart lines, mutated item by item while pending, and
//! settled by the payment state machine. Every item mutation goes through the
//! stock ledger first and rewrites the order totals from the live item set.

pub mod engine;
mod errors;
pub mod models;
mod repository;
pub mod store;

pub use engine::OrderLifecycleEngine;
pub use errors::OrdersError;
pub use repository::PgOrdersStore;
pub use store::*;
