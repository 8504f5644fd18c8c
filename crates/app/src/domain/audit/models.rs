//! Audit Models

use jiff::Timestamp;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    AddressCreated,
    AddressUpdated,
    AddressDeleted,
    DefaultAddressChanged,
    OrderPlaced,
    OrderItemAdded,
    OrderItemQuantityChanged,
    OrderItemRemoved,
    OrderCancelled,
    CheckoutIssued,
    PaymentConfirmed,
    PaymentFailed,
}

impl AuditEventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AddressCreated => "address_created",
            Self::AddressUpdated => "address_updated",
            Self::AddressDeleted => "address_deleted",
            Self::DefaultAddressChanged => "default_address_changed",
            Self::OrderPlaced => "order_placed",
            Self::OrderItemAdded => "order_item_added",
            Self::OrderItemQuantityChanged => "order_item_quantity_changed",
            Self::OrderItemRemoved => "order_item_removed",
            Self::OrderCancelled => "order_cancelled",
            Self::CheckoutIssued => "checkout_issued",
            Self::PaymentConfirmed => "payment_confirmed",
            Self::PaymentFailed => "payment_failed",
        }
    }
}

/// One recorded state transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub kind: AuditEventKind,
    pub entity_uuid: Uuid,
    pub metadata: Value,
    pub recorded_at: Timestamp,
}

impl AuditEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(kind: AuditEventKind, entity_uuid: impl Into<Uuid>, metadata: Value) -> Self {
        Self {
            kind,
            entity_uuid: entity_uuid.into(),
            metadata,
            recorded_at: Timestamp::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn kind_serializes_as_snake_case() -> TestResult {
        let encoded = serde_json::to_value(AuditEventKind::OrderItemQuantityChanged)?;

        assert_eq!(encoded, json!(AuditEventKind::OrderItemQuantityChanged.as_str()));

        Ok(())
    }
}
