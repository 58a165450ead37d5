#![doc = include_str!("../README.md")]

mod db;
mod shared;
/// Exports [`MarketBar`], [`NewsEvent`], producer traits, and the sentiment
/// scoring seam.
///
/// [`MarketBar`]: crate::event::MarketBar
/// [`NewsEvent`]: crate::event::NewsEvent
pub mod event;
/// Exports [`EventStreamMerger`] and other types related to time-ordered
/// stream merging.
///
/// [`EventStreamMerger`]: crate::merge::EventStreamMerger
pub mod merge;
/// Exports [`OrderLifecycleManager`], the [`Broker`] interface, and order
/// domain types.
///
/// [`OrderLifecycleManager`]: crate::order::OrderLifecycleManager
/// [`Broker`]: crate::order::Broker
pub mod order;
/// Exports [`RiskFilter`] and other types related to intent sizing and
/// suppression.
///
/// [`RiskFilter`]: crate::risk::RiskFilter
pub mod risk;
/// Exports [`StrategyStateMachine`] and other types related to signal
/// generation.
///
/// [`StrategyStateMachine`]: crate::strategy::StrategyStateMachine
pub mod strategy;
/// Exports [`BacktestEngine`], [`LiveTradeEngine`], and other types related
/// to running the pipeline.
///
/// [`BacktestEngine`]: crate::trade::BacktestEngine
/// [`LiveTradeEngine`]: crate::trade::LiveTradeEngine
pub mod trade;
mod util;

pub use db::Database;

/// Error types returned by `sentiq`.
pub mod error {
    pub use super::db::error::DbError;
    pub use super::event::error::{MarketDataError, ScoringError};
    pub use super::merge::error::MergeError;
    pub use super::order::error::{BrokerError, OrderError};
    pub use super::risk::error::RiskConfigError;
    pub use super::shared::error::{
        HalfLifeValidationError, QuantityValidationError, SentimentScoreValidationError,
        SentimentThresholdValidationError, SymbolValidationError,
    };
    pub use super::strategy::error::StrategyConfigError;
    pub use super::trade::{
        backtest::error::BacktestError,
        live::{
            error::LiveError,
            process::error::{LiveProcessError, LiveProcessFatalError, LiveProcessRecoverableError},
        },
    };
    pub use super::util::PanicPayload;

    /// Convenience general-purpose Result type alias.
    pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
}

/// Exports shared domain primitives and persistence models.
pub mod models {
    pub use super::db::models::{OrderEventRow, OrderRow, WatermarkRow};
    pub use super::shared::{HalfLife, Quantity, SentimentScore, SentimentThreshold, Symbol};
}
