//! Orders store.
//!
//! Every item mutation carries the order totals recomputed for the resulting
//! item set, and implementations write both in one transaction.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;

use crate::{
    domain::orders::models::{
        NewOrder, NewOrderItem, Order, OrderItem, OrderItemUuid, OrderState, OrderTotals,
        OrderUuid,
    },
    store::StoreError,
};

#[automock]
#[async_trait]
pub trait OrdersStore: Send + Sync {
    /// Creates a pending order together with its items and totals.
    async fn create_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
        totals: OrderTotals,
    ) -> Result<Order, StoreError>;

    /// Retrieve an order with its items.
    async fn get_order(&self, order: OrderUuid) -> Result<Order, StoreError>;

    /// Retrieve a single item.
    async fn get_item(&self, item: OrderItemUuid) -> Result<OrderItem, StoreError>;

    /// Adds an item and stores the order's new totals.
    async fn insert_item(
        &self,
        item: NewOrderItem,
        totals: OrderTotals,
    ) -> Result<OrderItem, StoreError>;

    /// Changes an item's quantity and stores the order's new totals.
    async fn update_item_quantity(
        &self,
        item: OrderItemUuid,
        quantity: u32,
        totals: OrderTotals,
    ) -> Result<OrderItem, StoreError>;

    /// Deletes an item and stores the order's new totals.
    async fn delete_item(&self, item: OrderItemUuid, totals: OrderTotals)
    -> Result<(), StoreError>;

    /// Moves an order from `from` to `to` only if it is still in `from`.
    /// Returns whether the write happened.
    async fn transition(
        &self,
        order: OrderUuid,
        from: OrderState,
        to: OrderState,
    ) -> Result<bool, StoreError>;

    /// Records the checkout reference and expiry of an order still awaiting
    /// payment. Returns whether the write happened.
    async fn set_checkout(
        &self,
        order: OrderUuid,
        reference: String,
        expires_at: Timestamp,
    ) -> Result<bool, StoreError>;

    /// Orders awaiting payment whose checkout expired at or before `now`,
    /// oldest expiry first.
    async fn expired_checkouts(&self, now: Timestamp) -> Result<Vec<OrderUuid>, StoreError>;
}
