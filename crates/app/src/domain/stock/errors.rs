//! Stock ledger errors.

use thiserror::Error;

use crate::{domain::catalog::models::ProductUuid, store::StoreError};

#[derive(Debug, Error)]
pub enum StockError {
    #[error("product {product} not found")]
    ProductNotFound { product: ProductUuid },

    #[error("insufficient stock: {available} available, {requested} requested")]
    InsufficientStock {
        product: ProductUuid,
        available: i64,
        requested: i64,
    },

    #[error("invalid quantity: {quantity}")]
    InvalidQuantity { quantity: i64 },

    #[error("stock for product {product} kept changing concurrently")]
    Contended { product: ProductUuid },

    #[error("stock storage error")]
    Store(#[source] StoreError),
}

impl StockError {
    pub(crate) fn from_store(product: ProductUuid, error: StoreError) -> Self {
        match error {
            StoreError::NotFound => Self::ProductNotFound { product },
            other => Self::Store(other),
        }
    }
}
