//! App Context

use std::sync::Arc;

use fornada::prelude::{PricingCalculator, PricingConfig, PricingConfigError};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    database::{self, Db},
    domain::{
        addresses::{AddressDefaultManager, AddressDirectory, PgAddressDirectory},
        audit::{AuditDispatcher, AuditStats, TracingAuditRecorder},
        catalog::{CatalogStore, PgCatalogStore},
        orders::{OrderLifecycleEngine, OrdersStore, PgOrdersStore},
        payments::{PaymentStateMachine, pix::PixSettings},
        postal::{HttpPostalCodeLookup, PostalCodeResolver},
        stock::StockLedger,
    },
    store::MemoryStore,
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to connect to database")]
    Database(#[source] sqlx::Error),

    #[error("a database URL is required unless running in memory")]
    MissingDatabaseUrl,

    #[error("failed to load pricing configuration")]
    Pricing(#[from] PricingConfigError),
}

/// The three stores every service reads and writes through.
#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<dyn CatalogStore>,
    pub addresses: Arc<dyn AddressDirectory>,
    pub orders: Arc<dyn OrdersStore>,
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

impl Stores {
    /// `PostgreSQL` repositories sharing one pool.
    #[must_use]
    pub fn postgres(db: &Db) -> Self {
        Self {
            catalog: Arc::new(PgCatalogStore::new(db.clone())),
            addresses: Arc::new(PgAddressDirectory::new(db.clone())),
            orders: Arc::new(PgOrdersStore::new(db.clone())),
        }
    }

    /// A fresh in-memory store behind every trait.
    #[must_use]
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());

        Self {
            catalog: store.clone(),
            addresses: store.clone(),
            orders: store,
        }
    }
}

/// Fully wired services over one set of stores.
pub struct AppContext {
    pub stores: Stores,
    pub calculator: Arc<PricingCalculator>,
    pub resolver: PostalCodeResolver,
    pub ledger: Arc<StockLedger>,
    pub addresses: Arc<AddressDefaultManager>,
    pub orders: Arc<OrderLifecycleEngine>,
    pub payments: Arc<PaymentStateMachine>,
    pub audit: AuditDispatcher,
    audit_task: JoinHandle<()>,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("resolver", &self.resolver)
            .field("audit", &self.audit.stats())
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Build application context from configuration: `PostgreSQL` unless the
    /// in-memory backend was requested.
    ///
    /// # Errors
    ///
    /// Returns an error when the pricing configuration cannot be loaded, or
    /// when no database URL is configured or the connection fails.
    pub async fn from_config(config: &AppConfig) -> Result<Self, AppInitError> {
        let pricing = config.pricing.load()?;

        let stores = if config.storage.in_memory {
            Stores::memory()
        } else {
            let url = config
                .storage
                .database_url
                .as_deref()
                .ok_or(AppInitError::MissingDatabaseUrl)?;

            let pool = database::connect(url)
                .await
                .map_err(AppInitError::Database)?;

            Stores::postgres(&Db::new(pool))
        };

        let resolver = PostalCodeResolver::new(
            Arc::new(HttpPostalCodeLookup::new(&config.postal.postal_lookup_url)),
            config.postal.timeout(),
        );

        Ok(Self::assemble(
            stores,
            pricing,
            resolver,
            PixSettings::from(&config.pix),
            config.audit.audit_queue_capacity,
        ))
    }

    /// Wire services over the given stores. Spawns the audit drain task on the
    /// current runtime.
    #[must_use]
    pub fn assemble(
        stores: Stores,
        pricing: PricingConfig,
        resolver: PostalCodeResolver,
        pix: PixSettings,
        audit_queue_capacity: usize,
    ) -> Self {
        let (audit, audit_task) =
            AuditDispatcher::spawn(Arc::new(TracingAuditRecorder), audit_queue_capacity);
        let sink = Arc::new(audit.clone());

        let calculator = Arc::new(PricingCalculator::new(pricing));
        let ledger = Arc::new(StockLedger::new(Arc::clone(&stores.catalog)));

        let addresses = Arc::new(AddressDefaultManager::new(
            Arc::clone(&stores.addresses),
            resolver.clone(),
            sink.clone(),
        ));

        let orders = Arc::new(OrderLifecycleEngine::new(
            Arc::clone(&stores.orders),
            Arc::clone(&stores.catalog),
            Arc::clone(&stores.addresses),
            Arc::clone(&ledger),
            Arc::clone(&calculator),
            sink.clone(),
        ));

        let payments = Arc::new(PaymentStateMachine::new(
            Arc::clone(&stores.orders),
            Arc::clone(&orders),
            sink,
            pix,
        ));

        Self {
            stores,
            calculator,
            resolver,
            ledger,
            addresses,
            orders,
            payments,
            audit,
            audit_task,
        }
    }

    /// Drop every service and wait for queued audit events to be recorded.
    pub async fn shutdown(self) -> AuditStats {
        let Self {
            stores,
            calculator,
            resolver,
            ledger,
            addresses,
            orders,
            payments,
            audit,
            audit_task,
        } = self;

        let counters = audit.counters();

        drop((stores, calculator, resolver, ledger, addresses, orders, payments, audit));

        if let Err(error) = audit_task.await {
            warn!("audit task ended abnormally: {error}");
        }

        let stats = counters.snapshot();

        info!(
            recorded = stats.recorded,
            dropped = stats.dropped,
            failed = stats.failed,
            "audit queue drained"
        );

        stats
    }
}
