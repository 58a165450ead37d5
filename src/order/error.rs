use thiserror::Error;
use uuid::Uuid;

use crate::{db::error::DbError, shared::Symbol};

/// Broker call failure, split by whether a retry can ever help.
///
/// Transient failures (timeouts, connection resets, 5xx-equivalents) are
/// retried with backoff; permanent failures (invalid symbol, insufficient
/// buying power) are surfaced as rejections and never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("transient broker failure: {0}")]
    Transient(String),
    #[error("permanent broker failure: {0}")]
    Permanent(String),
}

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order ledger failure: {0}")]
    Db(#[from] DbError),
    #[error("broker call failed: {0}")]
    Broker(#[from] BrokerError),
    #[error("no order with client id `{client_order_id}` is known")]
    UnknownOrder { client_order_id: Uuid },
    #[error(
        "order `{client_order_id}` could not be reconciled with the broker; \
         submissions for `{symbol}` are halted"
    )]
    ReconcileExhausted {
        client_order_id: Uuid,
        symbol: Symbol,
    },
    #[error("submissions for `{symbol}` are halted pending reconciliation")]
    SubmissionHalted { symbol: Symbol },
    #[error("order `{client_order_id}` is in state `{state}`, which forbids `{action}`")]
    InvalidTransition {
        client_order_id: Uuid,
        state: crate::order::OrderState,
        action: &'static str,
    },
}

pub(crate) type Result<T> = std::result::Result<T, OrderError>;
