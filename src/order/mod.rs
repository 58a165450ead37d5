use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::shared::{Quantity, Symbol};

pub(crate) mod error;
pub(crate) mod manager;
mod position;

pub use error::{BrokerError, OrderError};
pub use manager::{OrderLifecycleManager, OrderManagerConfig, OrderUpdate};
pub use position::{Position, PositionBook};

/// Order direction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    GoodTilCancelled,
    ImmediateOrCancel,
    Day,
}

/// A bounded, risk-approved order request.
///
/// `client_order_id` is the idempotency key for the entire lifecycle:
/// resubmitting with the same id never creates a second live order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_order_id: Uuid,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub quantity: Quantity,
    pub order_type: OrderType,
    pub limit_price: Option<f64>,
    pub time_in_force: TimeInForce,
}

impl OrderRequest {
    /// Creates a market order request with a fresh client order id.
    pub fn market(symbol: Symbol, side: OrderSide, quantity: Quantity) -> Self {
        Self {
            client_order_id: Uuid::new_v4(),
            symbol,
            side,
            quantity,
            order_type: OrderType::Market,
            limit_price: None,
            time_in_force: TimeInForce::GoodTilCancelled,
        }
    }
}

impl fmt::Display for OrderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} x{} ({})",
            self.client_order_id, self.side, self.symbol, self.quantity, self.order_type
        )
    }
}

/// Lifecycle state of one order.
///
/// Owned exclusively by the order lifecycle manager; mutated only in response
/// to broker acknowledgements, fills, or timeouts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Pending,
    Submitted,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    /// Submission outcome unknown (network failure or timeout). The broker's
    /// true state must be reconciled before any further action.
    Error,
}

impl OrderState {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Rejected)
    }
}

/// One broker fill notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillNotice {
    pub client_order_id: Uuid,
    pub time: DateTime<Utc>,
    pub quantity: u64,
    pub price: f64,
}

/// Broker acknowledgement of a submission or cancellation.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerAck {
    pub client_order_id: Uuid,
    pub broker_order_id: Option<String>,
}

/// Authoritative broker-side view of one order, returned by status queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerOrderStatus {
    /// The broker has no record of this client order id; resubmission is
    /// safe.
    Unknown,
    /// The broker accepted the order and it is still working.
    Accepted { filled_quantity: u64 },
    Filled { filled_quantity: u64 },
    Cancelled { filled_quantity: u64 },
    Rejected,
}

/// Broker order API: submit/cancel/query primitives plus the asynchronous
/// fill stream.
///
/// Every call may fail with a [`BrokerError`]; the caller wraps calls in a
/// bounded deadline and treats deadline expiry as transient.
#[async_trait]
pub trait Broker: Send + Sync + 'static {
    async fn submit(&self, request: &OrderRequest) -> Result<BrokerAck, BrokerError>;

    /// Idempotent status query by client order id, the reconciliation
    /// primitive after an ambiguous submission failure.
    async fn query_status(&self, client_order_id: Uuid)
    -> Result<BrokerOrderStatus, BrokerError>;

    async fn cancel(&self, client_order_id: Uuid) -> Result<BrokerAck, BrokerError>;

    /// Subscribes to fill notifications across all orders.
    fn fill_notifications(&self) -> broadcast::Receiver<FillNotice>;

    /// Complete fill history for one order, used by crash recovery.
    async fn fill_history(&self, client_order_id: Uuid)
    -> Result<Vec<FillNotice>, BrokerError>;
}
