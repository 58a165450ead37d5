pub mod backtest;
pub mod live;

pub(crate) mod core;

pub use backtest::{BacktestConfig, BacktestEngine, BacktestReport};
pub use live::{LiveTradeConfig, LiveTradeController, LiveTradeEngine, LiveTradeStatus};
