use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    order::{OrderRequest, OrderState},
    shared::Symbol,
};

/// Persisted watermark: last successfully processed timestamp for one
/// producer, used for resumable replay.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkRow {
    pub source: String,
    pub time: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted order record: the original request plus the latest lifecycle
/// state and cumulative filled quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub client_order_id: Uuid,
    pub symbol: Symbol,
    pub request: OrderRequest,
    pub state: OrderState,
    pub filled_quantity: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRow {
    pub fn new(request: OrderRequest, created_at: DateTime<Utc>) -> Self {
        Self {
            client_order_id: request.client_order_id,
            symbol: request.symbol.clone(),
            request,
            state: OrderState::Pending,
            filled_quantity: 0,
            created_at,
            updated_at: created_at,
        }
    }
}

/// One entry of the append-only order event log, kept for audit and crash
/// recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEventRow {
    pub event_id: Uuid,
    pub client_order_id: Uuid,
    pub time: DateTime<Utc>,
    pub kind: OrderEventKind,
    pub details: serde_json::Value,
}

impl OrderEventRow {
    pub fn new(
        client_order_id: Uuid,
        time: DateTime<Utc>,
        kind: OrderEventKind,
        details: serde_json::Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            client_order_id,
            time,
            kind,
            details,
        }
    }
}

/// Kinds of order ledger events.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderEventKind {
    Created,
    Transition,
    Fill,
    ReconcileQuery,
}
