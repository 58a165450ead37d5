use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

pub(crate) mod error;
pub(crate) mod memory;
pub(crate) mod models;
pub(crate) mod postgres;
pub(crate) mod repositories;

use error::DbError;
use memory::{MemOrderLedgerRepo, MemWatermarkRepo};
use postgres::{order_ledger::PgOrderLedgerRepo, watermarks::PgWatermarkRepo};
use repositories::{OrderLedgerRepository, WatermarkRepository};

/// Persistence handle aggregating the watermark store and the order ledger.
///
/// [`Database::connect`] backs both with Postgres; [`Database::in_memory`]
/// keeps them in process memory, which is what backtests (and live runs that
/// opt out of durable state) use.
#[derive(Clone)]
pub struct Database {
    pub(crate) watermarks: Arc<dyn WatermarkRepository>,
    pub(crate) orders: Arc<dyn OrderLedgerRepository>,
}

impl Database {
    /// Connects to Postgres and returns a database handle over it.
    pub async fn connect(url: &str, max_connections: u32) -> std::result::Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(DbError::Connect)?;

        let pool = Arc::new(pool);

        Ok(Self {
            watermarks: Arc::new(PgWatermarkRepo::new(pool.clone())),
            orders: Arc::new(PgOrderLedgerRepo::new(pool)),
        })
    }

    /// Returns a database handle backed by process memory.
    pub fn in_memory() -> Self {
        Self {
            watermarks: Arc::new(MemWatermarkRepo::default()),
            orders: Arc::new(MemOrderLedgerRepo::default()),
        }
    }

    pub(crate) fn watermarks(&self) -> Arc<dyn WatermarkRepository> {
        self.watermarks.clone()
    }

    pub(crate) fn orders(&self) -> Arc<dyn OrderLedgerRepository> {
        self.orders.clone()
    }
}
