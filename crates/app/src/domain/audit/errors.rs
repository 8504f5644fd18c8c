//! Audit errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit recorder unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode audit event")]
    Encoding(#[from] serde_json::Error),
}
