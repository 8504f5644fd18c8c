//! Order lifecycle engine.
//!
//! Item mutations of an order are serialised by the order's lock. The stock
//! ledger is always called before the item row changes, and a store failure
//! after a successful ledger call is compensated with the inverse adjustment.

use std::{iter, sync::Arc};

use fornada::{
    calculator::{PricedLine, PricingCalculator},
    cart::CartLine,
    delivery::Destination,
    money::{AmountOverflow, round_money},
};
use jiff::Timestamp;
use rust_decimal::Decimal;
use serde_json::json;
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info};

use crate::{
    domain::{
        addresses::{directory::AddressDirectory, models::AddressUuid},
        audit::{AuditEvent, AuditEventKind, NotificationSink},
        catalog::{CatalogStore, models::ProductUuid},
        orders::{
            OrdersError,
            models::{
                NewOrder, NewOrderItem, Order, OrderItem, OrderItemUuid, OrderState,
                OrderTotals, OrderUuid,
            },
            store::OrdersStore,
        },
        stock::StockLedger,
        users::UserUuid,
    },
    locks::KeyedLocks,
};

pub struct OrderLifecycleEngine {
    orders: Arc<dyn OrdersStore>,
    catalog: Arc<dyn CatalogStore>,
    addresses: Arc<dyn AddressDirectory>,
    ledger: Arc<StockLedger>,
    calculator: Arc<PricingCalculator>,
    sink: Arc<dyn NotificationSink>,
    locks: KeyedLocks<OrderUuid>,
}

impl std::fmt::Debug for OrderLifecycleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderLifecycleEngine")
            .field("ledger", &self.ledger)
            .field("locked_orders", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl OrderLifecycleEngine {
    #[must_use]
    pub fn new(
        orders: Arc<dyn OrdersStore>,
        catalog: Arc<dyn CatalogStore>,
        addresses: Arc<dyn AddressDirectory>,
        ledger: Arc<StockLedger>,
        calculator: Arc<PricingCalculator>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            orders,
            catalog,
            addresses,
            ledger,
            calculator,
            sink,
            locks: KeyedLocks::new(),
        }
    }

    /// Retrieve an order with its items.
    ///
    /// # Errors
    ///
    /// Returns [`OrdersError::OrderNotFound`] for an unknown order.
    pub async fn get_order(&self, order: OrderUuid) -> Result<Order, OrdersError> {
        self.orders
            .get_order(order)
            .await
            .map_err(|error| OrdersError::from_store(error, OrdersError::OrderNotFound))
    }

    /// Places an order from cart lines.
    ///
    /// Unit prices are snapshotted from the current catalog price plus the
    /// line's customization surcharges. Base price and weight always come from
    /// the catalog; the surcharges are taken from the caller's line as given,
    /// within the per-option bound [`Surcharge`] enforces, so callers must only
    /// pass options priced by the storefront. Stock is reserved line by line;
    /// any failure releases what was already reserved and leaves no order
    /// behind.
    ///
    /// [`Surcharge`]: fornada::customizations::Surcharge
    ///
    /// # Errors
    ///
    /// - [`OrdersError::EmptyCart`] / [`OrdersError::InvalidQuantity`] for bad
    ///   lines.
    /// - [`OrdersError::PriceOverflow`] when the order cannot be priced.
    /// - [`OrdersError::AddressNotFound`] when the address is not the user's.
    /// - [`OrdersError::ProductNotFound`] for an unknown product.
    /// - [`OrdersError::PromoRejected`] when the promo code does not apply.
    /// - [`OrdersError::InsufficientStock`] when a line cannot be reserved.
    #[tracing::instrument(
        name = "orders.engine.place_order",
        skip(self, lines),
        fields(user_uuid = %user, address_uuid = %address, lines = lines.len()),
        err
    )]
    pub async fn place_order(
        &self,
        user: UserUuid,
        address: AddressUuid,
        lines: Vec<CartLine>,
        promo_code: Option<&str>,
    ) -> Result<Order, OrdersError> {
        if lines.is_empty() {
            return Err(OrdersError::EmptyCart);
        }

        if lines.iter().any(|line| line.quantity == 0) {
            return Err(OrdersError::InvalidQuantity { quantity: 0 });
        }

        let address = self
            .addresses
            .get(address)
            .await
            .map_err(|error| OrdersError::from_store(error, OrdersError::AddressNotFound))?;

        if address.user_uuid != user {
            return Err(OrdersError::AddressNotFound);
        }

        let order_uuid = OrderUuid::new();
        let mut items = Vec::with_capacity(lines.len());

        for line in lines {
            let product_uuid = ProductUuid::from_uuid(line.product_uuid);

            let product = self.catalog.get_product(product_uuid).await.map_err(|error| {
                OrdersError::from_store(error, OrdersError::ProductNotFound {
                    product: product_uuid,
                })
            })?;

            let priced = CartLine {
                base_price: product.price,
                unit_weight_kg: product.weight_kg,
                ..line
            };

            items.push(NewOrderItem {
                uuid: OrderItemUuid::new(),
                order_uuid,
                product_uuid,
                quantity: priced.quantity,
                unit_price: self.calculator.unit_price(&priced)?,
                unit_weight_kg: priced.unit_weight_kg,
            });
        }

        let now = Timestamp::now();

        let promo_code = match promo_code {
            Some(code) => Some(
                self.calculator
                    .apply_promo_code(code, self.calculator.subtotal(&items)?, now)?
                    .code,
            ),
            None => None,
        };

        let destination = Destination::new(address.city, address.region);
        let totals = self
            .calculator
            .totals(&items, &destination, promo_code.as_deref(), now)?;

        let mut reserved = Vec::with_capacity(items.len());

        for item in &items {
            if let Err(error) = self.ledger.reserve(item.product_uuid, item.quantity).await {
                self.release_reserved(&reserved).await;

                return Err(error.into());
            }

            reserved.push((item.product_uuid, item.quantity));
        }

        let new_order = NewOrder {
            uuid: order_uuid,
            user_uuid: user,
            address_uuid: address.uuid,
            destination,
            promo_code,
        };

        let order = match self
            .orders
            .create_order(new_order, items, OrderTotals::from(&totals))
            .await
        {
            Ok(order) => order,
            Err(error) => {
                self.release_reserved(&reserved).await;

                return Err(error.into());
            }
        };

        self.sink.record(AuditEvent::new(
            AuditEventKind::OrderPlaced,
            order.uuid,
            json!({
                "user_uuid": user.to_string(),
                "items": order.items.len(),
                "total": order.total.to_string(),
                "tier": totals.tier.as_str(),
            }),
        ));

        info!(
            order_uuid = %order.uuid,
            total = %order.total,
            items = order.items.len(),
            "placed order"
        );

        Ok(order)
    }

    /// Adds an item to an open order at the given snapshot price.
    ///
    /// # Errors
    ///
    /// - [`OrdersError::OrderNotFound`] / [`OrdersError::ProductNotFound`] for
    ///   unknown references.
    /// - [`OrdersError::InvalidStateTransition`] unless the order is pending
    ///   with payment pending.
    /// - [`OrdersError::InsufficientStock`] when the quantity cannot be
    ///   reserved; no item is created.
    #[tracing::instrument(
        name = "orders.engine.create_order_item",
        skip(self),
        fields(order_uuid = %order, product_uuid = %product),
        err
    )]
    pub async fn create_order_item(
        &self,
        order: OrderUuid,
        product: ProductUuid,
        quantity: u32,
        unit_price: Decimal,
    ) -> Result<OrderItem, OrdersError> {
        if quantity == 0 {
            return Err(OrdersError::InvalidQuantity { quantity });
        }

        if unit_price.is_sign_negative() {
            return Err(OrdersError::InvalidPrice { price: unit_price });
        }

        let _guard = self.locks.lock(order).await;

        let current = self.open_order(order).await?;

        let catalog_product = self
            .catalog
            .get_product(product)
            .await
            .map_err(|error| OrdersError::from_store(error, OrdersError::ProductNotFound { product }))?;

        let item = NewOrderItem {
            uuid: OrderItemUuid::new(),
            order_uuid: order,
            product_uuid: product,
            quantity,
            unit_price: round_money(unit_price),
            unit_weight_kg: catalog_product.weight_kg,
        };

        let totals = self.totals_for(
            &current,
            current
                .items
                .iter()
                .map(PricedRow::from)
                .chain(iter::once(PricedRow::from(&item))),
        )?;

        self.ledger.reserve(product, quantity).await?;

        let created = match self.orders.insert_item(item, totals).await {
            Ok(created) => created,
            Err(error) => {
                self.release_reserved(&[(product, quantity)]).await;

                return Err(OrdersError::from_store(error, OrdersError::OrderNotFound));
            }
        };

        self.sink.record(AuditEvent::new(
            AuditEventKind::OrderItemAdded,
            created.uuid,
            json!({
                "order_uuid": order.to_string(),
                "product_uuid": product.to_string(),
                "quantity": quantity,
            }),
        ));

        info!(order_uuid = %order, item_uuid = %created.uuid, quantity, "added order item");

        Ok(created)
    }

    /// Changes an item's quantity. The stock difference is reserved or
    /// released first; if that fails the item is left unchanged.
    ///
    /// # Errors
    ///
    /// - [`OrdersError::ItemNotFound`] for an unknown item.
    /// - [`OrdersError::InvalidQuantity`] for a zero quantity.
    /// - [`OrdersError::InvalidStateTransition`] unless the order is open.
    /// - [`OrdersError::InsufficientStock`] when an increase cannot be reserved.
    #[tracing::instrument(
        name = "orders.engine.update_quantity",
        skip(self),
        fields(item_uuid = %item),
        err
    )]
    pub async fn update_quantity(
        &self,
        item: OrderItemUuid,
        new_quantity: u32,
    ) -> Result<Order, OrdersError> {
        if new_quantity == 0 {
            return Err(OrdersError::InvalidQuantity { quantity: 0 });
        }

        let (_guard, current, existing) = self.lock_item(item).await?;

        let delta = i64::from(new_quantity) - i64::from(existing.quantity);

        if delta == 0 {
            return Ok(current);
        }

        let totals = self.totals_for(
            &current,
            current.items.iter().map(|line| {
                let row = PricedRow::from(line);

                if line.uuid == item {
                    PricedRow {
                        quantity: new_quantity,
                        ..row
                    }
                } else {
                    row
                }
            }),
        )?;

        self.ledger.adjust(existing.product_uuid, delta).await?;

        if let Err(error) = self
            .orders
            .update_item_quantity(item, new_quantity, totals)
            .await
        {
            self.compensate(existing.product_uuid, -delta).await;

            return Err(OrdersError::from_store(error, OrdersError::ItemNotFound));
        }

        self.sink.record(AuditEvent::new(
            AuditEventKind::OrderItemQuantityChanged,
            item,
            json!({
                "order_uuid": current.uuid.to_string(),
                "from": existing.quantity,
                "to": new_quantity,
            }),
        ));

        info!(
            order_uuid = %current.uuid,
            item_uuid = %item,
            from = existing.quantity,
            to = new_quantity,
            "changed order item quantity"
        );

        self.get_order(current.uuid).await
    }

    /// Releases an item's stock, then deletes the item.
    ///
    /// # Errors
    ///
    /// - [`OrdersError::ItemNotFound`] for an unknown item.
    /// - [`OrdersError::InvalidStateTransition`] unless the order is open.
    #[tracing::instrument(
        name = "orders.engine.remove_order_item",
        skip(self),
        fields(item_uuid = %item),
        err
    )]
    pub async fn remove_order_item(&self, item: OrderItemUuid) -> Result<Order, OrdersError> {
        let (_guard, current, existing) = self.lock_item(item).await?;

        let totals = self.totals_for(
            &current,
            current
                .items
                .iter()
                .filter(|line| line.uuid != item)
                .map(PricedRow::from),
        )?;

        self.ledger
            .release(existing.product_uuid, existing.quantity)
            .await?;

        if let Err(error) = self.orders.delete_item(item, totals).await {
            self.compensate(existing.product_uuid, i64::from(existing.quantity))
                .await;

            return Err(OrdersError::from_store(error, OrdersError::ItemNotFound));
        }

        self.sink.record(AuditEvent::new(
            AuditEventKind::OrderItemRemoved,
            item,
            json!({
                "order_uuid": current.uuid.to_string(),
                "quantity": existing.quantity,
            }),
        ));

        info!(order_uuid = %current.uuid, item_uuid = %item, "removed order item");

        self.get_order(current.uuid).await
    }

    /// Cancels an open order and returns its items' stock.
    ///
    /// # Errors
    ///
    /// - [`OrdersError::OrderNotFound`] for an unknown order.
    /// - [`OrdersError::InvalidStateTransition`] unless the order is open.
    #[tracing::instrument(
        name = "orders.engine.cancel_order",
        skip(self),
        fields(order_uuid = %order),
        err
    )]
    pub async fn cancel_order(&self, order: OrderUuid) -> Result<Order, OrdersError> {
        let _guard = self.locks.lock(order).await;

        let current = self.open_order(order).await?;

        if !self
            .orders
            .transition(order, OrderState::OPEN, OrderState::CANCELLED)
            .await?
        {
            let latest = self.get_order(order).await?;

            return Err(OrdersError::InvalidStateTransition {
                status: latest.status,
                payment_status: latest.payment_status,
            });
        }

        self.release_items(&current.items).await;

        self.sink.record(AuditEvent::new(
            AuditEventKind::OrderCancelled,
            order,
            json!({ "items": current.items.len() }),
        ));

        info!(order_uuid = %order, "cancelled order");

        self.get_order(order).await
    }

    /// Exclusive access to an order's items and state.
    pub(crate) async fn lock_order(&self, order: OrderUuid) -> OwnedMutexGuard<()> {
        self.locks.lock(order).await
    }

    /// Returns the stock of every item. Failures are logged; the items of a
    /// settled order cannot be reserved again.
    pub(crate) async fn release_items(&self, items: &[OrderItem]) {
        for item in items {
            if let Err(error) = self.ledger.release(item.product_uuid, item.quantity).await {
                error!(
                    order_uuid = %item.order_uuid,
                    item_uuid = %item.uuid,
                    product_uuid = %item.product_uuid,
                    quantity = item.quantity,
                    %error,
                    "failed to release order item stock"
                );
            }
        }
    }

    async fn open_order(&self, order: OrderUuid) -> Result<Order, OrdersError> {
        let current = self.get_order(order).await?;

        if !current.is_open() {
            return Err(OrdersError::InvalidStateTransition {
                status: current.status,
                payment_status: current.payment_status,
            });
        }

        Ok(current)
    }

    /// Locks the item's order and returns the open order with the item.
    async fn lock_item(
        &self,
        item: OrderItemUuid,
    ) -> Result<(OwnedMutexGuard<()>, Order, OrderItem), OrdersError> {
        let order = self
            .orders
            .get_item(item)
            .await
            .map_err(|error| OrdersError::from_store(error, OrdersError::ItemNotFound))?
            .order_uuid;

        let guard = self.locks.lock(order).await;

        let current = self.open_order(order).await?;

        // The item may have been removed while waiting for the lock.
        let existing = current
            .items
            .iter()
            .find(|line| line.uuid == item)
            .cloned()
            .ok_or(OrdersError::ItemNotFound)?;

        Ok((guard, current, existing))
    }

    fn totals_for(
        &self,
        order: &Order,
        lines: impl Iterator<Item = PricedRow>,
    ) -> Result<OrderTotals, OrdersError> {
        let lines: Vec<PricedRow> = lines.collect();

        let totals = self.calculator.totals(
            &lines,
            &order.destination,
            order.promo_code.as_deref(),
            Timestamp::now(),
        )?;

        Ok(OrderTotals::from(&totals))
    }

    async fn release_reserved(&self, reserved: &[(ProductUuid, u32)]) {
        for (product, quantity) in reserved {
            self.compensate(*product, -i64::from(*quantity)).await;
        }
    }

    async fn compensate(&self, product: ProductUuid, delta: i64) {
        if let Err(error) = self.ledger.adjust(product, delta).await {
            error!(product_uuid = %product, delta, %error, "failed to compensate stock");
        }
    }
}

/// Pricing inputs of one line, detached from its storage shape.
#[derive(Debug, Clone, Copy)]
struct PricedRow {
    unit_price: Decimal,
    quantity: u32,
    unit_weight_kg: Decimal,
}

impl From<&OrderItem> for PricedRow {
    fn from(item: &OrderItem) -> Self {
        Self {
            unit_price: item.unit_price,
            quantity: item.quantity,
            unit_weight_kg: item.unit_weight_kg,
        }
    }
}

impl From<&NewOrderItem> for PricedRow {
    fn from(item: &NewOrderItem) -> Self {
        Self {
            unit_price: item.unit_price,
            quantity: item.quantity,
            unit_weight_kg: item.unit_weight_kg,
        }
    }
}

impl PricedLine for PricedRow {
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
