//! Postal lookup errors.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PostalLookupError {
    #[error("invalid postal code: {0}")]
    InvalidPostalCode(String),

    #[error("postal code not found")]
    NotFound,

    #[error("postal lookup unavailable: {0}")]
    ExternalUnavailable(String),
}

impl From<reqwest::Error> for PostalLookupError {
    fn from(error: reqwest::Error) -> Self {
        Self::ExternalUnavailable(error.to_string())
    }
}
