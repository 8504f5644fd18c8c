//! Database connection management

use sqlx::{PgPool, Postgres, Transaction, migrate::MigrateError};

#[derive(Debug, Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Begin a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error when a connection cannot be acquired or the transaction
    /// cannot be started.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }
}

/// Connect to `PostgreSQL`.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPool::connect(database_url).await
}

/// Apply pending schema migrations.
///
/// # Errors
///
/// Returns an error if a migration fails to apply.
pub async fn migrate(pool: &PgPool) -> Result<(), MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}
