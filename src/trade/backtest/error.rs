use thiserror::Error;

use crate::{
    merge::error::MergeError, order::OrderError, risk::error::RiskConfigError,
    strategy::error::StrategyConfigError,
};

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("invalid strategy configuration: {0}")]
    StrategyConfig(#[from] StrategyConfigError),
    #[error("invalid risk configuration: {0}")]
    RiskConfig(#[from] RiskConfigError),
    #[error("event merge failed: {0}")]
    Merge(#[from] MergeError),
    #[error("order processing failed: {0}")]
    Order(#[from] OrderError),
}

pub(super) type Result<T> = std::result::Result<T, BacktestError>;
