use tokio::time;

use crate::{
    merge::MergeConfig, order::OrderManagerConfig, risk::RiskConfig, strategy::StrategyConfig,
};

/// Configuration for the backtest engine.
#[derive(Clone, Debug)]
pub struct BacktestConfig {
    strategy: StrategyConfig,
    risk: RiskConfig,
    order_manager: OrderManagerConfig,
    merge: MergeConfig,
    slippage_bps: f64,
    fee_bps: f64,
    initial_equity: f64,
    scoring_timeout: time::Duration,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyConfig::default(),
            risk: RiskConfig::default(),
            order_manager: OrderManagerConfig::default(),
            merge: MergeConfig::default(),
            slippage_bps: 0.0,
            fee_bps: 0.0,
            initial_equity: 100_000.0,
            scoring_timeout: time::Duration::from_secs(2),
        }
    }
}

impl BacktestConfig {
    /// Returns the strategy configuration.
    pub fn strategy(&self) -> &StrategyConfig {
        &self.strategy
    }

    /// Returns the risk configuration.
    pub fn risk(&self) -> &RiskConfig {
        &self.risk
    }

    /// Returns the order manager configuration.
    pub fn order_manager(&self) -> &OrderManagerConfig {
        &self.order_manager
    }

    /// Returns the merger configuration.
    pub fn merge(&self) -> &MergeConfig {
        &self.merge
    }

    /// Returns the simulated slippage applied to fills, in basis points.
    pub fn slippage_bps(&self) -> f64 {
        self.slippage_bps
    }

    /// Returns the simulated fee charged on fills, in basis points of
    /// notional.
    pub fn fee_bps(&self) -> f64 {
        self.fee_bps
    }

    /// Returns the starting equity of the simulated account.
    pub fn initial_equity(&self) -> f64 {
        self.initial_equity
    }

    /// Returns the bounded deadline for sentiment scoring calls.
    pub fn scoring_timeout(&self) -> time::Duration {
        self.scoring_timeout
    }

    /// Sets the strategy configuration.
    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the risk configuration.
    pub fn with_risk(mut self, risk: RiskConfig) -> Self {
        self.risk = risk;
        self
    }

    /// Sets the order manager configuration.
    pub fn with_order_manager(mut self, order_manager: OrderManagerConfig) -> Self {
        self.order_manager = order_manager;
        self
    }

    /// Sets the merger configuration.
    pub fn with_merge(mut self, merge: MergeConfig) -> Self {
        self.merge = merge;
        self
    }

    /// Sets the simulated slippage.
    ///
    /// Default: `0`
    pub fn with_slippage_bps(mut self, bps: f64) -> Self {
        self.slippage_bps = bps;
        self
    }

    /// Sets the simulated fee.
    ///
    /// Default: `0`
    pub fn with_fee_bps(mut self, bps: f64) -> Self {
        self.fee_bps = bps;
        self
    }

    /// Sets the starting equity.
    ///
    /// Default: `100_000`
    pub fn with_initial_equity(mut self, equity: f64) -> Self {
        self.initial_equity = equity;
        self
    }

    /// Sets the sentiment scoring deadline.
    ///
    /// Default: `2` seconds
    pub fn with_scoring_timeout(mut self, timeout: time::Duration) -> Self {
        self.scoring_timeout = timeout;
        self
    }
}
