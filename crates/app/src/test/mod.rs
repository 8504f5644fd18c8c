//! Test context wiring every service over the in-memory store.

use std::{
    str::FromStr,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use fornada::prelude::*;
use rust_decimal::Decimal;
use testresult::TestResult;

use crate::{
    domain::{
        addresses::{
            AddressDefaultManager,
            models::{Address, AddressUuid, NewAddress},
        },
        audit::{AuditEvent, AuditEventKind, NotificationSink},
        catalog::{
            CatalogStore,
            models::{NewProduct, ProductUuid},
        },
        orders::{OrderLifecycleEngine, models::Order},
        payments::{PaymentStateMachine, pix::PixSettings},
        postal::{
            PostalCodeLookup, PostalCodeResolver, PostalLookupError,
            models::{PostalAddress, PostalCode},
        },
        stock::StockLedger,
        users::UserUuid,
    },
    store::MemoryStore,
};

const LOOKUP_TIMEOUT: Duration = Duration::from_millis(200);

/// Parses a money literal such as `"45.00"`.
pub fn money(amount: &str) -> Result<Decimal, rust_decimal::Error> {
    Decimal::from_str(amount)
}

/// A complete address on Avenida Paulista.
pub fn new_address(label: &str) -> NewAddress {
    NewAddress {
        label: label.to_string(),
        street: "Avenida Paulista".to_string(),
        number: "1578".to_string(),
        complement: None,
        neighborhood: "Bela Vista".to_string(),
        city: "São Paulo".to_string(),
        region: "SP".to_string(),
        postal_code: "01310100".to_string(),
        is_default: false,
    }
}

/// Knows a single postal code and nothing else.
#[derive(Debug)]
struct StaticLookup;

#[async_trait]
impl PostalCodeLookup for StaticLookup {
    async fn lookup(&self, postal_code: &PostalCode) -> Result<PostalAddress, PostalLookupError> {
        if postal_code.as_str() != "01310100" {
            return Err(PostalLookupError::NotFound);
        }

        Ok(PostalAddress {
            postal_code: postal_code.clone(),
            street: "Avenida Paulista".to_string(),
            neighborhood: "Bela Vista".to_string(),
            city: "São Paulo".to_string(),
            region: "SP".to_string(),
        })
    }
}

/// Keeps every event kind it receives, in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AuditEventKind>>,
}

impl NotificationSink for RecordingSink {
    fn record(&self, event: AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.kind);
    }
}

impl RecordingSink {
    pub fn kinds(&self) -> Vec<AuditEventKind> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

pub struct TestContext {
    pub user: UserUuid,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<RecordingSink>,
    pub ledger: Arc<StockLedger>,
    pub addresses: AddressDefaultManager,
    pub orders: Arc<OrderLifecycleEngine>,
    pub payments: PaymentStateMachine,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_lookup(Arc::new(StaticLookup))
    }

    pub fn with_lookup(lookup: Arc<dyn PostalCodeLookup>) -> Self {
        Self::build(lookup, PixSettings::default())
    }

    pub fn with_pix(pix: PixSettings) -> Self {
        Self::build(Arc::new(StaticLookup), pix)
    }

    fn build(lookup: Arc<dyn PostalCodeLookup>, pix: PixSettings) -> Self {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let ledger = Arc::new(StockLedger::new(store.clone()));

        let addresses = AddressDefaultManager::new(
            store.clone(),
            PostalCodeResolver::new(lookup, LOOKUP_TIMEOUT),
            sink.clone(),
        );

        let orders = Arc::new(OrderLifecycleEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::clone(&ledger),
            Arc::new(PricingCalculator::new(fixture_pricing())),
            sink.clone(),
        ));

        let payments = PaymentStateMachine::new(
            store.clone(),
            Arc::clone(&orders),
            sink.clone(),
            pix,
        );

        Self {
            user: UserUuid::new(),
            store,
            sink,
            ledger,
            addresses,
            orders,
            payments,
        }
    }

    /// Event kinds recorded so far.
    pub fn events(&self) -> Vec<AuditEventKind> {
        self.sink.kinds()
    }

    /// Adds a catalog product weighing 500g.
    pub async fn product(&self, name: &str, price: &str, stock: i64) -> TestResult<ProductUuid> {
        let product = self
            .store
            .insert_product(NewProduct {
                uuid: ProductUuid::new(),
                name: name.to_string(),
                price: money(price)?,
                stock,
                weight_kg: Decimal::new(5, 1),
            })
            .await?;

        Ok(product.uuid)
    }

    /// The user's default address, created on first use.
    pub async fn default_address(&self) -> TestResult<Address> {
        let existing = self
            .addresses
            .list_addresses(self.user)
            .await?
            .into_iter()
            .find(|address| address.is_default);

        match existing {
            Some(address) => Ok(address),
            None => Ok(self
                .addresses
                .create_address(self.user, new_address("Casa"))
                .await?),
        }
    }

    pub async fn place_order(
        &self,
        address: AddressUuid,
        product: ProductUuid,
        quantity: u32,
    ) -> TestResult<Order> {
        let order = self
            .orders
            .place_order(
                self.user,
                address,
                vec![CartLine::new(product.into_uuid(), quantity, Decimal::ZERO)],
                None,
            )
            .await?;

        Ok(order)
    }

    /// An open order for `quantity` units of a fresh product stocked with 4.
    pub async fn seeded_order(&self, quantity: u32) -> TestResult<Order> {
        let address = self.default_address().await?;
        let product = self.product("Pão de mel", "12.50", 4).await?;

        self.place_order(address.uuid, product, quantity).await
    }
}

#[expect(clippy::expect_used, reason = "Bundled fixture is compiled in")]
fn fixture_pricing() -> PricingConfig {
    PricingConfig::bundled().expect("bundled pricing config should parse")
}
