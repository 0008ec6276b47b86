//! Verdant Database Layer
//!
//! PostgreSQL persistence for the negotiation and settlement engine.
//!
//! # Repository Pattern
//!
//! Each table has its own repository implementing the storage traits from
//! `verdant-types`. Every state transition is a single conditional
//! `UPDATE ... WHERE status = ...` statement; the repositories never
//! read-then-write, so concurrent callers race on the database row and
//! exactly one wins. Finalize idempotency is anchored by a unique index on
//! `transactions.provider_order_id`.

pub mod config;
pub mod error;
pub mod models;
pub mod repos;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

pub use config::DatabaseConfig;
pub use error::{DbError, DbResult};
pub use models::*;
pub use repos::*;

/// Database connection pool
pub struct Database {
    /// PostgreSQL connection pool
    pub pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        info!("Connecting to PostgreSQL: {}", config.postgres_url_masked());

        let pool = PgPoolOptions::new()
            .max_connections(config.pg_max_connections)
            .min_connections(config.pg_min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.pg_acquire_timeout_secs))
            .connect(&config.postgres_url)
            .await
            .map_err(|e| DbError::Connection(format!("PostgreSQL: {}", e)))?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> DbResult<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;
        info!("Migrations complete");
        Ok(())
    }

    pub fn listings(&self) -> ListingRepo {
        ListingRepo::new(self.pool.clone())
    }

    pub fn offers(&self) -> OfferRepo {
        OfferRepo::new(self.pool.clone())
    }

    pub fn transactions(&self) -> TransactionRepo {
        TransactionRepo::new(self.pool.clone())
    }

    pub fn settings(&self) -> SettingsRepo {
        SettingsRepo::new(self.pool.clone())
    }
}
