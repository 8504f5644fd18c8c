//! Catalog Repository

use async_trait::async_trait;
use sqlx::{FromRow, Postgres, Row, postgres::PgRow, query, query_as, query_scalar};

use crate::{
    database::Db,
    domain::catalog::{
        models::{NewProduct, Product, ProductUuid},
        store::CatalogStore,
    },
    store::StoreError,
};

const INSERT_PRODUCT_SQL: &str = include_str!("sql/insert_product.sql");
const GET_PRODUCT_SQL: &str = include_str!("sql/get_product.sql");
const GET_STOCK_SQL: &str = include_str!("sql/get_stock.sql");
const COMPARE_AND_SET_STOCK_SQL: &str = include_str!("sql/compare_and_set_stock.sql");

#[derive(Debug, Clone)]
pub struct PgCatalogStore {
    db: Db,
}

impl PgCatalogStore {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        let created = query_as::<Postgres, Product>(INSERT_PRODUCT_SQL)
            .bind(product.uuid.into_uuid())
            .bind(product.name)
            .bind(product.price)
            .bind(product.stock)
            .bind(product.weight_kg)
            .fetch_one(self.db.pool())
            .await?;

        Ok(created)
    }

    async fn get_product(&self, product: ProductUuid) -> Result<Product, StoreError> {
        let product = query_as::<Postgres, Product>(GET_PRODUCT_SQL)
            .bind(product.into_uuid())
            .fetch_one(self.db.pool())
            .await?;

        Ok(product)
    }

    async fn get_stock(&self, product: ProductUuid) -> Result<i64, StoreError> {
        let stock = query_scalar::<Postgres, i64>(GET_STOCK_SQL)
            .bind(product.into_uuid())
            .fetch_one(self.db.pool())
            .await?;

        Ok(stock)
    }

    async fn compare_and_set_stock(
        &self,
        product: ProductUuid,
        expected: i64,
        new: i64,
    ) -> Result<bool, StoreError> {
        let rows_affected = query(COMPARE_AND_SET_STOCK_SQL)
            .bind(product.into_uuid())
            .bind(expected)
            .bind(new)
            .execute(self.db.pool())
            .await?
            .rows_affected();

        Ok(rows_affected == 1)
    }
}

impl<'r> FromRow<'r, PgRow> for Product {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: ProductUuid::from_uuid(row.try_get("uuid")?),
            name: row.try_get("name")?,
            price: row.try_get("price")?,
            stock: row.try_get("stock")?,
            weight_kg: row.try_get("weight_kg")?,
        })
    }
}
