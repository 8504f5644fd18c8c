//! In-memory store
//!
//! Implements every store trait over process memory with the same constraints
//! the database schema enforces: non-negative stock, one default address per
//! user, addresses referenced by orders cannot be deleted, and item changes
//! land together with the order totals.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use jiff::Timestamp;
use tokio::sync::Mutex;

use crate::{
    domain::{
        addresses::{
            directory::AddressDirectory,
            models::{Address, AddressUuid},
        },
        catalog::{
            CatalogStore,
            models::{NewProduct, Product, ProductUuid},
        },
        orders::{
            models::{
                NewOrder, NewOrderItem, Order, OrderItem, OrderItemUuid, OrderState,
                OrderStatus, OrderTotals, OrderUuid, PaymentStatus,
            },
            store::OrdersStore,
        },
        users::UserUuid,
    },
    store::StoreError,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    products: DashMap<ProductUuid, Product>,
    addresses: DashMap<AddressUuid, Address>,
    address_writes: Mutex<()>,
    orders: Mutex<OrderTables>,
}

#[derive(Debug, Default)]
struct OrderTables {
    orders: HashMap<OrderUuid, Order>,
    item_orders: HashMap<OrderItemUuid, OrderUuid>,
}

impl OrderTables {
    fn order_mut(&mut self, order: OrderUuid) -> Result<&mut Order, StoreError> {
        self.orders.get_mut(&order).ok_or(StoreError::NotFound)
    }

    fn owner_of(&self, item: OrderItemUuid) -> Result<OrderUuid, StoreError> {
        self.item_orders.get(&item).copied().ok_or(StoreError::NotFound)
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn product_exists(&self, product: ProductUuid) -> bool {
        self.products.contains_key(&product)
    }

    /// Overwrites a product's catalog price.
    #[cfg(test)]
    pub fn set_product_price(&self, product: ProductUuid, price: rust_decimal::Decimal) {
        if let Some(mut entry) = self.products.get_mut(&product) {
            entry.price = price;
        }
    }
}

fn apply_totals(order: &mut Order, totals: OrderTotals) {
    order.subtotal = totals.subtotal;
    order.delivery_fee = totals.delivery_fee;
    order.discount = totals.discount;
    order.total = totals.total;
    order.updated_at = Timestamp::now();
}

fn item_row(item: NewOrderItem) -> Result<OrderItem, StoreError> {
    if item.quantity == 0 || item.unit_price.is_sign_negative() {
        return Err(StoreError::InvalidData);
    }

    Ok(OrderItem {
        uuid: item.uuid,
        order_uuid: item.order_uuid,
        product_uuid: item.product_uuid,
        quantity: item.quantity,
        unit_price: item.unit_price,
        unit_weight_kg: item.unit_weight_kg,
        created_at: Timestamp::now(),
    })
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        if product.stock < 0 || product.price.is_sign_negative() {
            return Err(StoreError::InvalidData);
        }

        let created = Product {
            uuid: product.uuid,
            name: product.name,
            price: product.price,
            stock: product.stock,
            weight_kg: product.weight_kg,
        };

        match self.products.entry(product.uuid) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::AlreadyExists),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(created.clone());

                Ok(created)
            }
        }
    }

    async fn get_product(&self, product: ProductUuid) -> Result<Product, StoreError> {
        self.products
            .get(&product)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound)
    }

    async fn get_stock(&self, product: ProductUuid) -> Result<i64, StoreError> {
        self.products
            .get(&product)
            .map(|entry| entry.stock)
            .ok_or(StoreError::NotFound)
    }

    async fn compare_and_set_stock(
        &self,
        product: ProductUuid,
        expected: i64,
        new: i64,
    ) -> Result<bool, StoreError> {
        if new < 0 {
            return Err(StoreError::InvalidData);
        }

        let mut entry = self.products.get_mut(&product).ok_or(StoreError::NotFound)?;

        if entry.stock != expected {
            return Ok(false);
        }

        entry.stock = new;

        Ok(true)
    }
}

#[async_trait]
impl AddressDirectory for MemoryStore {
    async fn list_by_user(&self, user: UserUuid) -> Result<Vec<Address>, StoreError> {
        let mut addresses: Vec<Address> = self
            .addresses
            .iter()
            .filter(|entry| entry.user_uuid == user)
            .map(|entry| entry.value().clone())
            .collect();

        addresses.sort_by(|a, b| (a.created_at, a.uuid).cmp(&(b.created_at, b.uuid)));

        Ok(addresses)
    }

    async fn get(&self, address: AddressUuid) -> Result<Address, StoreError> {
        self.addresses
            .get(&address)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound)
    }

    async fn upsert(&self, address: Address) -> Result<Address, StoreError> {
        let _writes = self.address_writes.lock().await;

        let existing = self.addresses.get(&address.uuid).map(|entry| entry.value().clone());

        if let Some(existing) = &existing
            && existing.user_uuid != address.user_uuid
        {
            return Err(StoreError::NotFound);
        }

        if address.is_default
            && self.addresses.iter().any(|entry| {
                entry.user_uuid == address.user_uuid
                    && entry.uuid != address.uuid
                    && entry.is_default
            })
        {
            return Err(StoreError::AlreadyExists);
        }

        let stored = Address {
            created_at: existing.map_or(address.created_at, |existing| existing.created_at),
            ..address
        };

        self.addresses.insert(stored.uuid, stored.clone());

        Ok(stored)
    }

    async fn delete(&self, address: AddressUuid) -> Result<(), StoreError> {
        let _writes = self.address_writes.lock().await;
        let tables = self.orders.lock().await;

        if tables
            .orders
            .values()
            .any(|order| order.address_uuid == address)
        {
            return Err(StoreError::InUse);
        }

        self.addresses
            .remove(&address)
            .map(|_removed| ())
            .ok_or(StoreError::NotFound)
    }

    async fn set_exclusive_default(
        &self,
        user: UserUuid,
        address: AddressUuid,
    ) -> Result<(), StoreError> {
        let _writes = self.address_writes.lock().await;

        let owned = self
            .addresses
            .get(&address)
            .is_some_and(|entry| entry.user_uuid == user);

        if !owned {
            return Err(StoreError::NotFound);
        }

        for mut entry in self.addresses.iter_mut() {
            if entry.user_uuid == user {
                entry.is_default = entry.uuid == address;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl OrdersStore for MemoryStore {
    async fn create_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
        totals: OrderTotals,
    ) -> Result<Order, StoreError> {
        let mut tables = self.orders.lock().await;

        if tables.orders.contains_key(&order.uuid) {
            return Err(StoreError::AlreadyExists);
        }

        if !self.addresses.contains_key(&order.address_uuid)
            || items.iter().any(|item| !self.product_exists(item.product_uuid))
        {
            return Err(StoreError::InvalidReference);
        }

        let items = items
            .into_iter()
            .map(item_row)
            .collect::<Result<Vec<_>, _>>()?;

        if items
            .iter()
            .any(|item| tables.item_orders.contains_key(&item.uuid))
        {
            return Err(StoreError::AlreadyExists);
        }

        let now = Timestamp::now();

        let created = Order {
            uuid: order.uuid,
            user_uuid: order.user_uuid,
            address_uuid: order.address_uuid,
            destination: order.destination,
            promo_code: order.promo_code,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            subtotal: totals.subtotal,
            delivery_fee: totals.delivery_fee,
            discount: totals.discount,
            total: totals.total,
            checkout_reference: None,
            checkout_expires_at: None,
            created_at: now,
            updated_at: now,
            items,
        };

        for item in &created.items {
            tables.item_orders.insert(item.uuid, created.uuid);
        }

        tables.orders.insert(created.uuid, created.clone());

        Ok(created)
    }

    async fn get_order(&self, order: OrderUuid) -> Result<Order, StoreError> {
        let tables = self.orders.lock().await;

        tables.orders.get(&order).cloned().ok_or(StoreError::NotFound)
    }

    async fn get_item(&self, item: OrderItemUuid) -> Result<OrderItem, StoreError> {
        let tables = self.orders.lock().await;
        let order = tables.owner_of(item)?;

        tables
            .orders
            .get(&order)
            .and_then(|order| order.items.iter().find(|line| line.uuid == item))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn insert_item(
        &self,
        item: NewOrderItem,
        totals: OrderTotals,
    ) -> Result<OrderItem, StoreError> {
        if !self.product_exists(item.product_uuid) {
            return Err(StoreError::InvalidReference);
        }

        let mut tables = self.orders.lock().await;

        if tables.item_orders.contains_key(&item.uuid) {
            return Err(StoreError::AlreadyExists);
        }

        let created = item_row(item)?;
        let order = tables
            .orders
            .get_mut(&created.order_uuid)
            .ok_or(StoreError::InvalidReference)?;

        order.items.push(created.clone());
        apply_totals(order, totals);

        tables.item_orders.insert(created.uuid, created.order_uuid);

        Ok(created)
    }

    async fn update_item_quantity(
        &self,
        item: OrderItemUuid,
        quantity: u32,
        totals: OrderTotals,
    ) -> Result<OrderItem, StoreError> {
        if quantity == 0 {
            return Err(StoreError::InvalidData);
        }

        let mut tables = self.orders.lock().await;
        let owner = tables.owner_of(item)?;
        let order = tables.order_mut(owner)?;

        let line = order
            .items
            .iter_mut()
            .find(|line| line.uuid == item)
            .ok_or(StoreError::NotFound)?;

        line.quantity = quantity;
        let updated = line.clone();

        apply_totals(order, totals);

        Ok(updated)
    }

    async fn delete_item(
        &self,
        item: OrderItemUuid,
        totals: OrderTotals,
    ) -> Result<(), StoreError> {
        let mut tables = self.orders.lock().await;
        let owner = tables.owner_of(item)?;
        let order = tables.order_mut(owner)?;

        order.items.retain(|line| line.uuid != item);
        apply_totals(order, totals);

        tables.item_orders.remove(&item);

        Ok(())
    }

    async fn transition(
        &self,
        order: OrderUuid,
        from: OrderState,
        to: OrderState,
    ) -> Result<bool, StoreError> {
        let mut tables = self.orders.lock().await;
        let current = tables.order_mut(order)?;

        if current.state() != from {
            return Ok(false);
        }

        current.status = to.status;
        current.payment_status = to.payment_status;
        current.updated_at = Timestamp::now();

        Ok(true)
    }

    async fn set_checkout(
        &self,
        order: OrderUuid,
        reference: String,
        expires_at: Timestamp,
    ) -> Result<bool, StoreError> {
        let mut tables = self.orders.lock().await;
        let current = tables.order_mut(order)?;

        if current.state() != OrderState::OPEN {
            return Ok(false);
        }

        current.checkout_reference = Some(reference);
        current.checkout_expires_at = Some(expires_at);
        current.updated_at = Timestamp::now();

        Ok(true)
    }

    async fn expired_checkouts(&self, now: Timestamp) -> Result<Vec<OrderUuid>, StoreError> {
        let tables = self.orders.lock().await;

        let mut expired: Vec<(Timestamp, OrderUuid)> = tables
            .orders
            .values()
            .filter(|order| order.is_open())
            .filter_map(|order| {
                order
                    .checkout_expires_at
                    .filter(|expires_at| *expires_at <= now)
                    .map(|expires_at| (expires_at, order.uuid))
            })
            .collect();

        expired.sort_unstable();

        Ok(expired.into_iter().map(|(_, order)| order).collect())
    }
}

#[cfg(test)]
mod tests {
    use fornada::delivery::Destination;
    use jiff::SignedDuration;
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use super::*;

    fn product(stock: i64) -> NewProduct {
        NewProduct {
            uuid: ProductUuid::new(),
            name: "Broa de milho".to_string(),
            price: Decimal::new(4_00, 2),
            stock,
            weight_kg: Decimal::new(2, 1),
        }
    }

    fn address(user: UserUuid, is_default: bool) -> Address {
        Address {
            uuid: AddressUuid::new(),
            user_uuid: user,
            label: "Casa".to_string(),
            street: "Rua Oscar Freire".to_string(),
            number: "100".to_string(),
            complement: None,
            neighborhood: "Jardins".to_string(),
            city: "São Paulo".to_string(),
            region: "SP".to_string(),
            postal_code: "01426001".to_string(),
            is_default,
            created_at: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn compare_and_set_only_writes_expected_value() -> TestResult {
        let store = MemoryStore::new();
        let created = store.insert_product(product(5)).await?;

        assert!(!store.compare_and_set_stock(created.uuid, 4, 3).await?);
        assert!(store.compare_and_set_stock(created.uuid, 5, 3).await?);
        assert_eq!(store.get_stock(created.uuid).await?, 3);

        Ok(())
    }

    #[tokio::test]
    async fn stock_cannot_be_set_negative() -> TestResult {
        let store = MemoryStore::new();
        let created = store.insert_product(product(1)).await?;

        let result = store.compare_and_set_stock(created.uuid, 1, -1).await;

        assert!(matches!(result, Err(StoreError::InvalidData)), "got {result:?}");

        Ok(())
    }

    #[tokio::test]
    async fn second_default_is_rejected_like_the_unique_index() -> TestResult {
        let store = MemoryStore::new();
        let user = UserUuid::new();

        store.upsert(address(user, true)).await?;

        let result = store.upsert(address(user, true)).await;

        assert!(matches!(result, Err(StoreError::AlreadyExists)), "got {result:?}");

        Ok(())
    }

    #[tokio::test]
    async fn exclusive_default_clears_the_others() -> TestResult {
        let store = MemoryStore::new();
        let user = UserUuid::new();

        let first = store.upsert(address(user, true)).await?;
        let second = store.upsert(address(user, false)).await?;

        store.set_exclusive_default(user, second.uuid).await?;

        assert!(!store.get(first.uuid).await?.is_default, "first lost default");
        assert!(store.get(second.uuid).await?.is_default, "second is default");

        let result = store.set_exclusive_default(UserUuid::new(), first.uuid).await;

        assert!(matches!(result, Err(StoreError::NotFound)), "got {result:?}");

        Ok(())
    }

    #[tokio::test]
    async fn referenced_address_is_in_use() -> TestResult {
        let store = MemoryStore::new();
        let user = UserUuid::new();
        let stored = store.upsert(address(user, true)).await?;
        let broa = store.insert_product(product(5)).await?;
        let order_uuid = OrderUuid::new();

        store
            .create_order(
                NewOrder {
                    uuid: order_uuid,
                    user_uuid: user,
                    address_uuid: stored.uuid,
                    destination: Destination::new("São Paulo", "SP"),
                    promo_code: None,
                },
                vec![NewOrderItem {
                    uuid: OrderItemUuid::new(),
                    order_uuid,
                    product_uuid: broa.uuid,
                    quantity: 1,
                    unit_price: broa.price,
                    unit_weight_kg: broa.weight_kg,
                }],
                OrderTotals {
                    subtotal: broa.price,
                    delivery_fee: Decimal::ZERO,
                    discount: Decimal::ZERO,
                    total: broa.price,
                },
            )
            .await?;

        let result = store.delete(stored.uuid).await;

        assert!(matches!(result, Err(StoreError::InUse)), "got {result:?}");

        Ok(())
    }

    async fn empty_order(store: &MemoryStore, user: UserUuid) -> TestResult<OrderUuid> {
        let stored = store.upsert(address(user, false)).await?;
        let order_uuid = OrderUuid::new();

        store
            .create_order(
                NewOrder {
                    uuid: order_uuid,
                    user_uuid: user,
                    address_uuid: stored.uuid,
                    destination: Destination::new("São Paulo", "SP"),
                    promo_code: None,
                },
                Vec::new(),
                OrderTotals {
                    subtotal: Decimal::ZERO,
                    delivery_fee: Decimal::ZERO,
                    discount: Decimal::ZERO,
                    total: Decimal::ZERO,
                },
            )
            .await?;

        Ok(order_uuid)
    }

    #[tokio::test]
    async fn transition_is_conditional() -> TestResult {
        let store = MemoryStore::new();
        let order_uuid = empty_order(&store, UserUuid::new()).await?;

        assert!(
            store
                .transition(order_uuid, OrderState::OPEN, OrderState::CONFIRMED)
                .await?,
            "open order should confirm"
        );
        assert!(
            !store
                .transition(order_uuid, OrderState::OPEN, OrderState::PAYMENT_FAILED)
                .await?,
            "confirmed order must not move"
        );
        assert!(
            !store
                .set_checkout(order_uuid, "FRN1".to_string(), Timestamp::now())
                .await?,
            "confirmed order takes no checkout"
        );

        Ok(())
    }

    #[tokio::test]
    async fn expired_checkouts_are_open_orders_past_expiry() -> TestResult {
        let store = MemoryStore::new();
        let user = UserUuid::new();
        let now = Timestamp::now();

        let stale = empty_order(&store, user).await?;
        let older = empty_order(&store, user).await?;
        let fresh = empty_order(&store, user).await?;
        let paid = empty_order(&store, user).await?;
        let _unissued = empty_order(&store, user).await?;

        store
            .set_checkout(stale, "FRN1".to_string(), now - SignedDuration::from_mins(1))
            .await?;
        store
            .set_checkout(older, "FRN2".to_string(), now - SignedDuration::from_mins(5))
            .await?;
        store
            .set_checkout(fresh, "FRN3".to_string(), now + SignedDuration::from_mins(5))
            .await?;
        store
            .set_checkout(paid, "FRN4".to_string(), now - SignedDuration::from_mins(5))
            .await?;
        store
            .transition(paid, OrderState::OPEN, OrderState::CONFIRMED)
            .await?;

        assert_eq!(store.expired_checkouts(now).await?, vec![older, stale]);

        Ok(())
    }
}
