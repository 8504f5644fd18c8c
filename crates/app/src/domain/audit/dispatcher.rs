//! Audit dispatcher
//!
//! Bounded queue between the engine and an [`AuditRecorder`]. Producers never
//! wait: when the queue is full or the drain task is gone the event is dropped
//! and counted.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::{
    sync::mpsc::{self, Receiver, Sender, error::TrySendError},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::domain::audit::{NotificationSink, models::AuditEvent, recorder::AuditRecorder};

/// Queue capacity used when none is configured.
pub const DEFAULT_AUDIT_QUEUE_CAPACITY: usize = 1_024;

/// Counters describing what happened to dispatched events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditStats {
    pub recorded: u64,
    pub dropped: u64,
    pub failed: u64,
}

/// Live counters shared by the dispatcher and its drain task.
#[derive(Debug, Default)]
pub struct AuditCounters {
    recorded: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct AuditDispatcher {
    sender: Sender<AuditEvent>,
    counters: Arc<AuditCounters>,
}

impl AuditDispatcher {
    /// Starts the drain task on the current runtime. The task ends once every
    /// dispatcher clone is dropped and the queue is empty.
    #[must_use]
    pub fn spawn(recorder: Arc<dyn AuditRecorder>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(AuditCounters::default());

        let handle = tokio::spawn(drain(receiver, recorder, Arc::clone(&counters)));

        (Self { sender, counters }, handle)
    }

    pub fn stats(&self) -> AuditStats {
        self.counters.snapshot()
    }

    /// Counters that outlive the dispatcher without keeping the queue open.
    pub fn counters(&self) -> Arc<AuditCounters> {
        Arc::clone(&self.counters)
    }
}

impl AuditCounters {
    pub fn snapshot(&self) -> AuditStats {
        AuditStats {
            recorded: self.recorded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

impl NotificationSink for AuditDispatcher {
    fn record(&self, event: AuditEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);

                warn!(
                    kind = event.kind.as_str(),
                    entity_uuid = %event.entity_uuid,
                    "audit queue full, dropping event"
                );
            }
            Err(TrySendError::Closed(event)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);

                warn!(
                    kind = event.kind.as_str(),
                    entity_uuid = %event.entity_uuid,
                    "audit queue closed, dropping event"
                );
            }
        }
    }
}

async fn drain(
    mut receiver: Receiver<AuditEvent>,
    recorder: Arc<dyn AuditRecorder>,
    counters: Arc<AuditCounters>,
) {
    while let Some(event) = receiver.recv().await {
        match recorder.write(&event).await {
            Ok(()) => {
                counters.recorded.fetch_add(1, Ordering::Relaxed);
            }
            Err(error) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);

                warn!(
                    kind = event.kind.as_str(),
                    entity_uuid = %event.entity_uuid,
                    error = %error,
                    "failed to record audit event"
                );
            }
        }
    }

    debug!("audit queue drained");
}
