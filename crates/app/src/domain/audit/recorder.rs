//! Audit recorders.

use async_trait::async_trait;
use mockall::automock;
use tracing::info;

use crate::domain::audit::{AuditError, models::AuditEvent};

/// Durable destination the dispatcher drains events into.
#[automock]
#[async_trait]
pub trait AuditRecorder: Send + Sync {
    async fn write(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Records events as structured log lines on the `audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditRecorder;

#[async_trait]
impl AuditRecorder for TracingAuditRecorder {
    async fn write(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let metadata = serde_json::to_string(&event.metadata)?;

        info!(
            target: "audit",
            kind = event.kind.as_str(),
            entity_uuid = %event.entity_uuid,
            recorded_at = %event.recorded_at,
            metadata = %metadata,
            "audit event"
        );

        Ok(())
    }
}
