//! Payment errors.

use jiff::Timestamp;
use thiserror::Error;

use crate::{
    domain::{
        orders::{
            OrdersError,
            models::{OrderStatus, PaymentStatus},
        },
        payments::pix::PixPayloadError,
    },
    store::StoreError,
};

#[derive(Debug, Error)]
pub enum PaymentsError {
    #[error("order not found")]
    OrderNotFound,

    #[error("payment already processed: order is {status} with payment {payment_status}")]
    AlreadyProcessed {
        status: OrderStatus,
        payment_status: PaymentStatus,
    },

    #[error("payment is not pending: order is {status} with payment {payment_status}")]
    NotPending {
        status: OrderStatus,
        payment_status: PaymentStatus,
    },

    #[error("order has nothing to pay")]
    EmptyOrder,

    #[error("no checkout was issued for this order")]
    CheckoutMissing,

    #[error("checkout expired at {expired_at}; the order was cancelled")]
    CheckoutExpired { expired_at: Timestamp },

    #[error("checkout expiry is out of range")]
    ExpiryOutOfRange(#[source] jiff::Error),

    #[error("failed to build pix payload")]
    Payload(#[from] PixPayloadError),

    #[error("payment storage error")]
    Store(#[source] StoreError),

    #[error(transparent)]
    Orders(OrdersError),
}

impl From<OrdersError> for PaymentsError {
    fn from(error: OrdersError) -> Self {
        match error {
            OrdersError::OrderNotFound => Self::OrderNotFound,
            other => Self::Orders(other),
        }
    }
}

impl From<StoreError> for PaymentsError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => Self::OrderNotFound,
            other => Self::Store(other),
        }
    }
}
