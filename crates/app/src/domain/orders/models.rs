//! Order Models

use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use fornada::{
    calculator::PricedLine, delivery::Destination, money::AmountOverflow, prelude::Totals,
};
use jiff::Timestamp;
use rust_decimal::Decimal;

use crate::{
    domain::{addresses::models::AddressUuid, catalog::models::ProductUuid, users::UserUuid},
    store::StoreError,
    uuids::TypedUuid,
};

/// Order UUID
pub type OrderUuid = TypedUuid<Order>;

/// Order Item UUID
pub type OrderItemUuid = TypedUuid<OrderItem>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl OrderStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Cancelled)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(StoreError::InvalidData),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Failed)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            _ => Err(StoreError::InvalidData),
        }
    }
}

/// Order status and payment status, which only ever change together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderState {
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
}

impl OrderState {
    /// Freshly placed order awaiting payment.
    pub const OPEN: Self = Self {
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Pending,
    };

    /// Paid and confirmed.
    pub const CONFIRMED: Self = Self {
        status: OrderStatus::Confirmed,
        payment_status: PaymentStatus::Paid,
    };

    /// Cancelled before payment was attempted.
    pub const CANCELLED: Self = Self {
        status: OrderStatus::Cancelled,
        payment_status: PaymentStatus::Pending,
    };

    /// Payment failed; the order is cancelled with it.
    pub const PAYMENT_FAILED: Self = Self {
        status: OrderStatus::Cancelled,
        payment_status: PaymentStatus::Failed,
    };
}

/// Order Model
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub uuid: OrderUuid,
    pub user_uuid: UserUuid,
    pub address_uuid: AddressUuid,
    pub destination: Destination,
    pub promo_code: Option<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub checkout_reference: Option<String>,
    pub checkout_expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub items: Vec<OrderItem>,
}

impl Order {
    #[must_use]
    pub const fn state(&self) -> OrderState {
        OrderState {
            status: self.status,
            payment_status: self.payment_status,
        }
    }

    /// Whether items may still change.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == OrderState::OPEN
    }

    /// Whether an issued checkout stopped being payable at `now`.
    #[must_use]
    pub fn checkout_expired(&self, now: Timestamp) -> bool {
        self.checkout_expires_at
            .is_some_and(|expires_at| expires_at <= now)
    }
}

/// Order Item Model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub uuid: OrderItemUuid,
    pub order_uuid: OrderUuid,
    pub product_uuid: ProductUuid,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub unit_weight_kg: Decimal,
    pub created_at: Timestamp,
}

impl PricedLine for OrderItem {
    fn unit_price(&self) -> Result<Decimal, AmountOverflow> {
        Ok(self.unit_price)
    }

    fn quantity(&self) -> u32 {
        self.quantity
    }

    fn unit_weight_kg(&self) -> Decimal {
        self.unit_weight_kg
    }
}

/// New Order Model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub uuid: OrderUuid,
    pub user_uuid: UserUuid,
    pub address_uuid: AddressUuid,
    pub destination: Destination,
    pub promo_code: Option<String>,
}

/// New Order Item Model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub uuid: OrderItemUuid,
    pub order_uuid: OrderUuid,
    pub product_uuid: ProductUuid,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub unit_weight_kg: Decimal,
}

impl PricedLine for NewOrderItem {
    fn unit_price(&self) -> Result<Decimal, AmountOverflow> {
        Ok(self.unit_price)
    }

    fn quantity(&self) -> u32 {
        self.quantity
    }

    fn unit_weight_kg(&self) -> Decimal {
        self.unit_weight_kg
    }
}

/// Stored money columns of an order, always derived from its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl From<&Totals> for OrderTotals {
    fn from(totals: &Totals) -> Self {
        Self {
            subtotal: totals.subtotal,
            delivery_fee: totals.delivery_fee,
            discount: totals.discount,
            total: totals.total,
        }
    }
}
