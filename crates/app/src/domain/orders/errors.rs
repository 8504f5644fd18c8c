//! Order errors.

use fornada::{money::AmountOverflow, promotions::PromoCodeError};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    domain::{
        catalog::models::ProductUuid,
        orders::models::{OrderStatus, PaymentStatus},
        stock::StockError,
    },
    store::StoreError,
};

#[derive(Debug, Error)]
pub enum OrdersError {
    #[error("order not found")]
    OrderNotFound,

    #[error("order item not found")]
    ItemNotFound,

    #[error("product {product} not found")]
    ProductNotFound { product: ProductUuid },

    #[error("address not found")]
    AddressNotFound,

    #[error("cannot place an order without items")]
    EmptyCart,

    #[error("invalid quantity: {quantity}")]
    InvalidQuantity { quantity: u32 },

    #[error("invalid unit price: {price}")]
    InvalidPrice { price: Decimal },

    #[error("order amounts are too large to price")]
    PriceOverflow(#[from] AmountOverflow),

    #[error("order is {status} with payment {payment_status}")]
    InvalidStateTransition {
        status: OrderStatus,
        payment_status: PaymentStatus,
    },

    #[error("insufficient stock: {available} available, {requested} requested")]
    InsufficientStock {
        product: ProductUuid,
        available: i64,
        requested: i64,
    },

    #[error(transparent)]
    PromoRejected(#[from] PromoCodeError),

    #[error("stock ledger error")]
    Stock(#[source] StockError),

    #[error("order storage error")]
    Store(#[source] StoreError),
}

impl OrdersError {
    /// Maps a store error, reporting a missing row as `missing`.
    pub(crate) fn from_store(error: StoreError, missing: Self) -> Self {
        match error {
            StoreError::NotFound => missing,
            other => Self::Store(other),
        }
    }
}

impl From<StockError> for OrdersError {
    fn from(error: StockError) -> Self {
        match error {
            StockError::InsufficientStock {
                product,
                available,
                requested,
            } => Self::InsufficientStock {
                product,
                available,
                requested,
            },
            StockError::ProductNotFound { product } => Self::ProductNotFound { product },
            other => Self::Stock(other),
        }
    }
}

impl From<StoreError> for OrdersError {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}
