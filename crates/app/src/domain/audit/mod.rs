//! Audit trail
//!
//! Successful state transitions are handed to a [`NotificationSink`] without
//! waiting. The default sink is an [`AuditDispatcher`] that queues events for a
//! background task; a full queue or a failing recorder is counted and logged,
//! never reported back to the operation that produced the event.

pub mod dispatcher;
mod errors;
pub mod models;
pub mod recorder;

pub use dispatcher::{AuditCounters, AuditDispatcher, AuditStats};
pub use errors::AuditError;
pub use models::{AuditEvent, AuditEventKind};
pub use recorder::*;

use mockall::automock;

/// Fire-and-forget destination for audit events.
#[automock]
pub trait NotificationSink: Send + Sync {
    /// Hands an event over. Must return promptly and never fail the caller.
    fn record(&self, event: AuditEvent);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn record(&self, _event: AuditEvent) {}
}
