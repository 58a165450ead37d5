use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::order::OrderState;

use super::{
    error::{DbError, Result},
    models::{OrderEventRow, OrderRow, WatermarkRow},
    repositories::{OrderLedgerRepository, WatermarkRepository},
};

/// In-memory watermark store, used by backtests and by live runs without a
/// configured database.
#[derive(Debug, Default)]
pub(crate) struct MemWatermarkRepo {
    rows: Mutex<HashMap<String, WatermarkRow>>,
}

impl MemWatermarkRepo {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, WatermarkRow>> {
        self.rows
            .lock()
            .expect("`MemWatermarkRepo` mutex can't be poisoned")
    }
}

#[async_trait]
impl WatermarkRepository for MemWatermarkRepo {
    async fn get(&self, source: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.lock().get(source).map(|row| row.time))
    }

    async fn set(&self, source: &str, time: DateTime<Utc>) -> Result<()> {
        self.lock().insert(
            source.to_string(),
            WatermarkRow {
                source: source.to_string(),
                time,
                updated_at: Utc::now(),
            },
        );

        Ok(())
    }

    async fn all(&self) -> Result<Vec<WatermarkRow>> {
        let mut rows: Vec<_> = self.lock().values().cloned().collect();
        rows.sort_by(|a, b| a.source.cmp(&b.source));

        Ok(rows)
    }
}

#[derive(Debug, Default)]
struct MemLedger {
    orders: HashMap<Uuid, OrderRow>,
    events: Vec<OrderEventRow>,
}

/// In-memory order ledger, used by backtests and tests.
#[derive(Debug, Default)]
pub(crate) struct MemOrderLedgerRepo {
    inner: Mutex<MemLedger>,
}

impl MemOrderLedgerRepo {
    fn lock(&self) -> MutexGuard<'_, MemLedger> {
        self.inner
            .lock()
            .expect("`MemOrderLedgerRepo` mutex can't be poisoned")
    }
}

#[async_trait]
impl OrderLedgerRepository for MemOrderLedgerRepo {
    async fn insert_order(&self, row: &OrderRow) -> Result<()> {
        self.lock().orders.insert(row.client_order_id, row.clone());

        Ok(())
    }

    async fn update_order(
        &self,
        client_order_id: Uuid,
        state: OrderState,
        filled_quantity: u64,
        event: &OrderEventRow,
    ) -> Result<()> {
        let mut guard = self.lock();

        let row = guard
            .orders
            .get_mut(&client_order_id)
            .ok_or(DbError::OrderNotFound { client_order_id })?;

        row.state = state;
        row.filled_quantity = filled_quantity;
        row.updated_at = event.time;

        guard.events.push(event.clone());

        Ok(())
    }

    async fn append_event(&self, event: &OrderEventRow) -> Result<()> {
        self.lock().events.push(event.clone());

        Ok(())
    }

    async fn get_order(&self, client_order_id: Uuid) -> Result<Option<OrderRow>> {
        Ok(self.lock().orders.get(&client_order_id).cloned())
    }

    async fn non_terminal_orders(&self) -> Result<Vec<OrderRow>> {
        let mut rows: Vec<_> = self
            .lock()
            .orders
            .values()
            .filter(|row| !row.state.is_terminal())
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.created_at);

        Ok(rows)
    }

    async fn events(&self, client_order_id: Uuid) -> Result<Vec<OrderEventRow>> {
        Ok(self
            .lock()
            .events
            .iter()
            .filter(|ev| ev.client_order_id == client_order_id)
            .cloned()
            .collect())
    }
}
