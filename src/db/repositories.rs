use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::order::OrderState;

use super::{
    error::Result,
    models::{OrderEventRow, OrderRow, WatermarkRow},
};

/// Persisted watermark per producer, enabling the merger to resume after a
/// crash without reprocessing.
#[async_trait]
pub trait WatermarkRepository: Send + Sync + 'static {
    /// Returns the persisted watermark for `source`, if any.
    async fn get(&self, source: &str) -> Result<Option<DateTime<Utc>>>;

    /// Persists `time` as the watermark for `source`, replacing any previous
    /// value.
    async fn set(&self, source: &str, time: DateTime<Utc>) -> Result<()>;

    /// Returns all persisted watermarks.
    async fn all(&self) -> Result<Vec<WatermarkRow>>;
}

/// Order ledger: every request, its latest state, and an append-only event
/// log for audit and crash recovery.
#[async_trait]
pub trait OrderLedgerRepository: Send + Sync + 'static {
    /// Inserts a freshly created order.
    async fn insert_order(&self, row: &OrderRow) -> Result<()>;

    /// Updates the latest state and filled quantity of an order, appending
    /// the given event in the same transaction.
    async fn update_order(
        &self,
        client_order_id: Uuid,
        state: OrderState,
        filled_quantity: u64,
        event: &OrderEventRow,
    ) -> Result<()>;

    /// Appends an event without changing order state (reconcile queries and
    /// similar audit entries).
    async fn append_event(&self, event: &OrderEventRow) -> Result<()>;

    /// Returns the order with the given id, if present.
    async fn get_order(&self, client_order_id: Uuid) -> Result<Option<OrderRow>>;

    /// Returns all orders not in a terminal state, used by crash recovery to
    /// decide which orders need broker reconciliation.
    async fn non_terminal_orders(&self) -> Result<Vec<OrderRow>>;

    /// Returns all events for one order, oldest first.
    async fn events(&self, client_order_id: Uuid) -> Result<Vec<OrderEventRow>>;
}
