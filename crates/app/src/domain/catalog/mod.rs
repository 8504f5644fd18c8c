//! Catalog

pub mod models;
mod repository;
pub mod store;

pub use repository::PgCatalogStore;
pub use store::*;
