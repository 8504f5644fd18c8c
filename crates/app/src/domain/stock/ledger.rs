//! Stock ledger.
//!
//! The only sanctioned write path for product stock. Every call for a product
//! runs under that product's lock, and every write is a compare-and-set so a
//! writer outside this process is detected instead of overwritten.

use std::{cmp::Ordering, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
    domain::{
        catalog::{CatalogStore, models::ProductUuid},
        stock::StockError,
    },
    locks::KeyedLocks,
};

/// Compare-and-set attempts before giving up on a contended product.
const MAX_CAS_ATTEMPTS: usize = 8;

pub struct StockLedger {
    catalog: Arc<dyn CatalogStore>,
    locks: KeyedLocks<ProductUuid>,
}

impl std::fmt::Debug for StockLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockLedger")
            .field("locked_products", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl StockLedger {
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self {
            catalog,
            locks: KeyedLocks::new(),
        }
    }

    /// Current stock for a product.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::ProductNotFound`] for an unknown product.
    pub async fn available(&self, product: ProductUuid) -> Result<i64, StockError> {
        self.catalog
            .get_stock(product)
            .await
            .map_err(|error| StockError::from_store(product, error))
    }

    /// Takes `quantity` units out of stock, or nothing at all.
    ///
    /// Returns the stock left after the reservation.
    ///
    /// # Errors
    ///
    /// - [`StockError::InsufficientStock`] when fewer than `quantity` units remain.
    /// - [`StockError::InvalidQuantity`] when `quantity` is zero.
    /// - [`StockError::ProductNotFound`] for an unknown product.
    #[tracing::instrument(
        name = "stock.ledger.reserve",
        skip(self),
        fields(product_uuid = %product),
        err
    )]
    pub async fn reserve(&self, product: ProductUuid, quantity: u32) -> Result<i64, StockError> {
        let requested = i64::from(quantity);

        if requested == 0 {
            return Err(StockError::InvalidQuantity { quantity: 0 });
        }

        let remaining = self
            .apply(product, |available| {
                if available < requested {
                    return Err(StockError::InsufficientStock {
                        product,
                        available,
                        requested,
                    });
                }

                Ok(available - requested)
            })
            .await?;

        info!(product_uuid = %product, quantity, remaining, "reserved stock");

        Ok(remaining)
    }

    /// Puts `quantity` units back into stock. Calls are not deduplicated.
    ///
    /// Returns the stock after the release.
    ///
    /// # Errors
    ///
    /// - [`StockError::InvalidQuantity`] when `quantity` is zero or the stock
    ///   would overflow.
    /// - [`StockError::ProductNotFound`] for an unknown product.
    #[tracing::instrument(
        name = "stock.ledger.release",
        skip(self),
        fields(product_uuid = %product),
        err
    )]
    pub async fn release(&self, product: ProductUuid, quantity: u32) -> Result<i64, StockError> {
        let returned = i64::from(quantity);

        if returned == 0 {
            return Err(StockError::InvalidQuantity { quantity: 0 });
        }

        let remaining = self
            .apply(product, |available| {
                available
                    .checked_add(returned)
                    .ok_or(StockError::InvalidQuantity { quantity: returned })
            })
            .await?;

        info!(product_uuid = %product, quantity, remaining, "released stock");

        Ok(remaining)
    }

    /// Signed adjustment: positive consumes stock, negative returns it, zero is a
    /// no-op. A rejected positive adjustment applies nothing.
    ///
    /// # Errors
    ///
    /// See [`StockLedger::reserve`] and [`StockLedger::release`].
    pub async fn adjust(&self, product: ProductUuid, delta: i64) -> Result<i64, StockError> {
        let quantity = u32::try_from(delta.unsigned_abs())
            .map_err(|_err| StockError::InvalidQuantity { quantity: delta })?;

        match delta.cmp(&0) {
            Ordering::Greater => self.reserve(product, quantity).await,
            Ordering::Less => self.release(product, quantity).await,
            Ordering::Equal => self.available(product).await,
        }
    }

    /// Read-compute-CAS loop under the product lock.
    async fn apply<F>(&self, product: ProductUuid, next: F) -> Result<i64, StockError>
    where
        F: Fn(i64) -> Result<i64, StockError> + Send,
    {
        let _guard = self.locks.lock(product).await;

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self.available(product).await?;
            let target = next(current)?;

            let written = self
                .catalog
                .compare_and_set_stock(product, current, target)
                .await
                .map_err(|error| StockError::from_store(product, error))?;

            if written {
                return Ok(target);
            }

            debug!(product_uuid = %product, attempt, "stock changed underneath, retrying");
        }

        warn!(product_uuid = %product, "giving up on contended stock update");

        Err(StockError::Contended { product })
    }
}
