pub(crate) mod broker;
pub(crate) mod config;
pub(crate) mod engine;
pub(crate) mod error;
pub(crate) mod report;

pub use broker::SimulatedBroker;
pub use config::BacktestConfig;
pub use engine::BacktestEngine;
pub use error::BacktestError;
pub use report::{BacktestReport, BacktestSummary, EquityPoint, TradeRecord};

#[cfg(test)]
mod tests;
