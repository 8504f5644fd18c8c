//! Store errors.

use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record already exists")]
    AlreadyExists,

    #[error("record not found")]
    NotFound,

    #[error("related resource not found")]
    InvalidReference,

    #[error("record is referenced by another record")]
    InUse,

    #[error("missing required data")]
    MissingRequiredData,

    #[error("invalid data")]
    InvalidData,

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for StoreError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => Self::AlreadyExists,
            Some(ErrorKind::ForeignKeyViolation) => Self::InvalidReference,
            Some(ErrorKind::NotNullViolation) => Self::MissingRequiredData,
            Some(ErrorKind::CheckViolation) => Self::InvalidData,
            _ => Self::Sql(error),
        }
    }
}
