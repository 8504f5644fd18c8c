//! Catalog store.
//!
//! The engine reads prices and stock from the catalog and writes nothing but
//! stock, through compare-and-set.

use async_trait::async_trait;
use mockall::automock;

use crate::{
    domain::catalog::models::{NewProduct, Product, ProductUuid},
    store::StoreError,
};

#[automock]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Adds a product to the catalog.
    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError>;

    /// Retrieve a single product.
    async fn get_product(&self, product: ProductUuid) -> Result<Product, StoreError>;

    /// Current stock of a product.
    async fn get_stock(&self, product: ProductUuid) -> Result<i64, StoreError>;

    /// Sets stock to `new` only if it is still `expected`. Returns whether the
    /// write happened.
    async fn compare_and_set_stock(
        &self,
        product: ProductUuid,
        expected: i64,
        new: i64,
    ) -> Result<bool, StoreError>;
}
