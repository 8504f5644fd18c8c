//! Payment Models

use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::orders::models::OrderUuid;

/// Checkout artifact for a pending PIX payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PixCheckout {
    #[serde(serialize_with = "serialize_uuid")]
    pub order_uuid: OrderUuid,
    pub reference: String,
    pub amount: Decimal,
    /// Copy-and-paste PIX code.
    pub payload: String,
    pub expires_at: Timestamp,
}

fn serialize_uuid<S: serde::Serializer>(uuid: &OrderUuid, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(uuid)
}
