//! Orders Repository

use async_trait::async_trait;
use fornada::delivery::Destination;
use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, PgConnection, Postgres, Row, postgres::PgRow, query, query_as, query_scalar};
use uuid::Uuid;

use crate::{
    database::Db,
    domain::{
        addresses::models::AddressUuid,
        catalog::models::ProductUuid,
        orders::{
            models::{
                NewOrder, NewOrderItem, Order, OrderItem, OrderItemUuid, OrderState,
                OrderTotals, OrderUuid,
            },
            store::OrdersStore,
        },
        users::UserUuid,
    },
    store::StoreError,
};

const INSERT_ORDER_SQL: &str = include_str!("sql/insert_order.sql");
const GET_ORDER_SQL: &str = include_str!("sql/get_order.sql");
const INSERT_ORDER_ITEM_SQL: &str = include_str!("sql/insert_order_item.sql");
const GET_ORDER_ITEM_SQL: &str = include_str!("sql/get_order_item.sql");
const LIST_ORDER_ITEMS_SQL: &str = include_str!("sql/list_order_items.sql");
const LIST_EXPIRED_CHECKOUTS_SQL: &str = include_str!("sql/list_expired_checkouts.sql");
const UPDATE_ORDER_ITEM_QUANTITY_SQL: &str = include_str!("sql/update_order_item_quantity.sql");
const DELETE_ORDER_ITEM_SQL: &str = include_str!("sql/delete_order_item.sql");
const UPDATE_ORDER_TOTALS_SQL: &str = include_str!("sql/update_order_totals.sql");
const TRANSITION_ORDER_SQL: &str = include_str!("sql/transition_order.sql");
const SET_CHECKOUT_SQL: &str = include_str!("sql/set_checkout.sql");

#[derive(Debug, Clone)]
pub struct PgOrdersStore {
    db: Db,
}

impl PgOrdersStore {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    async fn insert_item_row(
        conn: &mut PgConnection,
        item: NewOrderItem,
    ) -> Result<OrderItem, StoreError> {
        let quantity = i32::try_from(item.quantity).map_err(|_err| StoreError::InvalidData)?;

        let created = query_as::<Postgres, OrderItem>(INSERT_ORDER_ITEM_SQL)
            .bind(item.uuid.into_uuid())
            .bind(item.order_uuid.into_uuid())
            .bind(item.product_uuid.into_uuid())
            .bind(quantity)
            .bind(item.unit_price)
            .bind(item.unit_weight_kg)
            .fetch_one(conn)
            .await?;

        Ok(created)
    }

    async fn save_totals(
        conn: &mut PgConnection,
        order: Uuid,
        totals: OrderTotals,
    ) -> Result<(), StoreError> {
        let rows_affected = query(UPDATE_ORDER_TOTALS_SQL)
            .bind(order)
            .bind(totals.subtotal)
            .bind(totals.delivery_fee)
            .bind(totals.discount)
            .bind(totals.total)
            .execute(conn)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }
}

#[async_trait]
impl OrdersStore for PgOrdersStore {
    async fn create_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
        totals: OrderTotals,
    ) -> Result<Order, StoreError> {
        let mut tx = self.db.begin().await?;

        let mut created = query_as::<Postgres, Order>(INSERT_ORDER_SQL)
            .bind(order.uuid.into_uuid())
            .bind(order.user_uuid.into_uuid())
            .bind(order.address_uuid.into_uuid())
            .bind(order.destination.city)
            .bind(order.destination.region)
            .bind(order.promo_code)
            .bind(totals.subtotal)
            .bind(totals.delivery_fee)
            .bind(totals.discount)
            .bind(totals.total)
            .fetch_one(&mut *tx)
            .await?;

        for item in items {
            let item = Self::insert_item_row(&mut *tx, item).await?;
            created.items.push(item);
        }

        tx.commit().await?;

        Ok(created)
    }

    async fn get_order(&self, order: OrderUuid) -> Result<Order, StoreError> {
        let mut tx = self.db.begin().await?;

        let mut found = query_as::<Postgres, Order>(GET_ORDER_SQL)
            .bind(order.into_uuid())
            .fetch_one(&mut *tx)
            .await?;

        let items = query_as::<Postgres, OrderItem>(LIST_ORDER_ITEMS_SQL)
            .bind(order.into_uuid())
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        found.items.extend(items);

        Ok(found)
    }

    async fn get_item(&self, item: OrderItemUuid) -> Result<OrderItem, StoreError> {
        let item = query_as::<Postgres, OrderItem>(GET_ORDER_ITEM_SQL)
            .bind(item.into_uuid())
            .fetch_one(self.db.pool())
            .await?;

        Ok(item)
    }

    async fn insert_item(
        &self,
        item: NewOrderItem,
        totals: OrderTotals,
    ) -> Result<OrderItem, StoreError> {
        let mut tx = self.db.begin().await?;

        let order = item.order_uuid.into_uuid();
        let created = Self::insert_item_row(&mut *tx, item).await?;

        Self::save_totals(&mut *tx, order, totals).await?;

        tx.commit().await?;

        Ok(created)
    }

    async fn update_item_quantity(
        &self,
        item: OrderItemUuid,
        quantity: u32,
        totals: OrderTotals,
    ) -> Result<OrderItem, StoreError> {
        let quantity = i32::try_from(quantity).map_err(|_err| StoreError::InvalidData)?;

        let mut tx = self.db.begin().await?;

        let updated = query_as::<Postgres, OrderItem>(UPDATE_ORDER_ITEM_QUANTITY_SQL)
            .bind(item.into_uuid())
            .bind(quantity)
            .fetch_one(&mut *tx)
            .await?;

        Self::save_totals(&mut *tx, updated.order_uuid.into_uuid(), totals).await?;

        tx.commit().await?;

        Ok(updated)
    }

    async fn delete_item(
        &self,
        item: OrderItemUuid,
        totals: OrderTotals,
    ) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;

        let order = query_scalar::<Postgres, Uuid>(DELETE_ORDER_ITEM_SQL)
            .bind(item.into_uuid())
            .fetch_one(&mut *tx)
            .await?;

        Self::save_totals(&mut *tx, order, totals).await?;

        tx.commit().await?;

        Ok(())
    }

    async fn transition(
        &self,
        order: OrderUuid,
        from: OrderState,
        to: OrderState,
    ) -> Result<bool, StoreError> {
        let rows_affected = query(TRANSITION_ORDER_SQL)
            .bind(order.into_uuid())
            .bind(from.status.as_str())
            .bind(from.payment_status.as_str())
            .bind(to.status.as_str())
            .bind(to.payment_status.as_str())
            .execute(self.db.pool())
            .await?
            .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn set_checkout(
        &self,
        order: OrderUuid,
        reference: String,
        expires_at: Timestamp,
    ) -> Result<bool, StoreError> {
        let rows_affected = query(SET_CHECKOUT_SQL)
            .bind(order.into_uuid())
            .bind(reference)
            .bind(SqlxTimestamp::from(expires_at))
            .execute(self.db.pool())
            .await?
            .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn expired_checkouts(&self, now: Timestamp) -> Result<Vec<OrderUuid>, StoreError> {
        let orders = query_scalar::<Postgres, Uuid>(LIST_EXPIRED_CHECKOUTS_SQL)
            .bind(SqlxTimestamp::from(now))
            .fetch_all(self.db.pool())
            .await?;

        Ok(orders.into_iter().map(OrderUuid::from_uuid).collect())
    }
}

impl<'r> FromRow<'r, PgRow> for Order {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let status: String = row.try_get("status")?;
        let payment_status: String = row.try_get("payment_status")?;

        Ok(Self {
            uuid: OrderUuid::from_uuid(row.try_get("uuid")?),
            user_uuid: UserUuid::from_uuid(row.try_get("user_uuid")?),
            address_uuid: AddressUuid::from_uuid(row.try_get("address_uuid")?),
            destination: Destination::new(
                row.try_get::<String, _>("destination_city")?,
                row.try_get::<String, _>("destination_region")?,
            ),
            promo_code: row.try_get("promo_code")?,
            status: status.parse().map_err(|error| decode_error("status", error))?,
            payment_status: payment_status
                .parse()
                .map_err(|error| decode_error("payment_status", error))?,
            subtotal: row.try_get("subtotal")?,
            delivery_fee: row.try_get("delivery_fee")?,
            discount: row.try_get("discount")?,
            total: row.try_get("total")?,
            checkout_reference: row.try_get("checkout_reference")?,
            checkout_expires_at: row
                .try_get::<Option<SqlxTimestamp>, _>("checkout_expires_at")?
                .map(SqlxTimestamp::to_jiff),
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
            items: Vec::new(),
        })
    }
}

impl<'r> FromRow<'r, PgRow> for OrderItem {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let quantity: i32 = row.try_get("quantity")?;

        Ok(Self {
            uuid: OrderItemUuid::from_uuid(row.try_get("uuid")?),
            order_uuid: OrderUuid::from_uuid(row.try_get("order_uuid")?),
            product_uuid: ProductUuid::from_uuid(row.try_get("product_uuid")?),
            quantity: u32::try_from(quantity)
                .map_err(|error| decode_error("quantity", error))?,
            unit_price: row.try_get("unit_price")?,
            unit_weight_kg: row.try_get("unit_weight_kg")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}

fn decode_error(
    column: &str,
    error: impl std::error::Error + Send + Sync + 'static,
) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(error),
    }
}
