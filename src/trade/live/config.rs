use tokio::time;

use crate::{
    merge::MergeConfig, order::OrderManagerConfig, risk::RiskConfig, strategy::StrategyConfig,
};

/// Configuration for the [`LiveTradeEngine`](crate::trade::LiveTradeEngine)
/// controlling stream merging, signal generation, risk, order management, and
/// session lifecycle.
#[derive(Clone, Debug)]
pub struct LiveTradeConfig {
    merge: MergeConfig,
    strategy: StrategyConfig,
    risk: RiskConfig,
    order_manager: OrderManagerConfig,
    scoring_timeout: time::Duration,
    restart_interval: time::Duration,
    shutdown_timeout: time::Duration,
    update_capacity: usize,
}

impl Default for LiveTradeConfig {
    fn default() -> Self {
        Self {
            merge: MergeConfig::default(),
            strategy: StrategyConfig::default(),
            risk: RiskConfig::default(),
            order_manager: OrderManagerConfig::default(),
            scoring_timeout: time::Duration::from_secs(2),
            restart_interval: time::Duration::from_secs(10),
            shutdown_timeout: time::Duration::from_secs(6),
            update_capacity: 1_000,
        }
    }
}

impl LiveTradeConfig {
    /// Returns the merger configuration.
    pub fn merge(&self) -> &MergeConfig {
        &self.merge
    }

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

    /// Returns the bounded deadline for sentiment scoring calls.
    pub fn scoring_timeout(&self) -> time::Duration {
        self.scoring_timeout
    }

    /// Returns the interval for restarting the live process after recoverable
    /// errors.
    pub fn restart_interval(&self) -> time::Duration {
        self.restart_interval
    }

    /// Returns the timeout duration for graceful shutdown operations.
    pub fn shutdown_timeout(&self) -> time::Duration {
        self.shutdown_timeout
    }

    /// Returns the capacity of the live update broadcast channel.
    pub fn update_capacity(&self) -> usize {
        self.update_capacity
    }

    /// Sets the merger configuration.
    pub fn with_merge(mut self, merge: MergeConfig) -> Self {
        self.merge = merge;
        self
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

    /// Sets the sentiment scoring deadline.
    ///
    /// Default: `2` seconds
    pub fn with_scoring_timeout(mut self, timeout: time::Duration) -> Self {
        self.scoring_timeout = timeout;
        self
    }

    /// Sets the interval for restarting the live process after recoverable
    /// errors.
    ///
    /// Default: `10` seconds
    pub fn with_restart_interval(mut self, secs: u64) -> Self {
        self.restart_interval = time::Duration::from_secs(secs);
        self
    }

    /// Sets the timeout duration for graceful shutdown operations.
    ///
    /// Default: `6` seconds
    pub fn with_shutdown_timeout(mut self, secs: u64) -> Self {
        self.shutdown_timeout = time::Duration::from_secs(secs);
        self
    }

    /// Sets the capacity of the live update broadcast channel.
    ///
    /// Default: `1000`
    pub fn with_update_capacity(mut self, capacity: usize) -> Self {
        self.update_capacity = capacity.max(1);
        self
    }
}

#[derive(Debug)]
pub(super) struct LiveTradeControllerConfig {
    shutdown_timeout: time::Duration,
}

impl LiveTradeControllerConfig {
    pub fn shutdown_timeout(&self) -> time::Duration {
        self.shutdown_timeout
    }
}

impl From<&LiveTradeConfig> for LiveTradeControllerConfig {
    fn from(value: &LiveTradeConfig) -> Self {
        Self {
            shutdown_timeout: value.shutdown_timeout(),
        }
    }
}

#[derive(Debug)]
pub(super) struct LiveProcessConfig {
    restart_interval: time::Duration,
}

impl LiveProcessConfig {
    pub fn restart_interval(&self) -> time::Duration {
        self.restart_interval
    }
}

impl From<&LiveTradeConfig> for LiveProcessConfig {
    fn from(value: &LiveTradeConfig) -> Self {
        Self {
            restart_interval: value.restart_interval(),
        }
    }
}
