mod config;
mod engine;
mod state;

pub(crate) mod error;
pub(crate) mod process;

pub use config::LiveTradeConfig;
pub use engine::{LiveTradeController, LiveTradeEngine};
pub use state::{LiveTradeReader, LiveTradeReceiver, LiveTradeStatus, LiveTradeUpdate};

#[cfg(test)]
mod tests;
