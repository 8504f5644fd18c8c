//! Address errors.

use thiserror::Error;

use crate::{
    domain::{
        addresses::models::AddressUuid,
        postal::PostalLookupError,
        users::UserUuid,
    },
    store::StoreError,
};

#[derive(Debug, Error)]
pub enum AddressesError {
    #[error("address not found")]
    NotFound,

    #[error("address is referenced by existing orders")]
    InUse { address: AddressUuid },

    #[error("address is missing {field}")]
    IncompleteAddress { field: &'static str },

    #[error("postal code {postal_code} belongs to {expected}, not {given}")]
    RegionMismatch {
        postal_code: String,
        expected: &'static str,
        given: String,
    },

    #[error(transparent)]
    PostalCode(#[from] PostalLookupError),

    #[error("user {user} has {defaults} default addresses across {addresses} addresses")]
    InvariantViolation {
        user: UserUuid,
        defaults: usize,
        addresses: usize,
    },

    #[error("address storage error")]
    Store(#[source] StoreError),
}

impl From<StoreError> for AddressesError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => Self::NotFound,
            other => Self::Store(other),
        }
    }
}
