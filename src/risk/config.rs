use chrono::Duration;

use crate::shared::Quantity;

use super::error::RiskConfigError;

/// Configuration for the risk and sizing filter.
#[derive(Clone, Debug)]
pub struct RiskConfig {
    max_position_per_symbol: Quantity,
    max_gross_exposure: u64,
    bucket_capacity: u32,
    refill_interval: Duration,
    hedging_enabled: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_per_symbol: Quantity::try_from(100u64)
                .expect("default position limit is valid"),
            max_gross_exposure: 500,
            bucket_capacity: 5,
            refill_interval: Duration::seconds(60),
            hedging_enabled: false,
        }
    }
}

impl RiskConfig {
    /// Returns the absolute position cap per symbol.
    pub fn max_position_per_symbol(&self) -> Quantity {
        self.max_position_per_symbol
    }

    /// Returns the cap on summed absolute net quantities across symbols.
    pub fn max_gross_exposure(&self) -> u64 {
        self.max_gross_exposure
    }

    /// Returns the token bucket capacity (maximum order burst).
    pub fn bucket_capacity(&self) -> u32 {
        self.bucket_capacity
    }

    /// Returns the event-time interval at which one token refills.
    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }

    /// Returns whether position flips without flattening are allowed.
    pub fn hedging_enabled(&self) -> bool {
        self.hedging_enabled
    }

    /// Sets the per-symbol position cap.
    ///
    /// Default: `100`
    pub fn with_max_position_per_symbol(mut self, quantity: Quantity) -> Self {
        self.max_position_per_symbol = quantity;
        self
    }

    /// Sets the gross exposure cap.
    ///
    /// Default: `500`
    pub fn with_max_gross_exposure(mut self, quantity: u64) -> Self {
        self.max_gross_exposure = quantity;
        self
    }

    /// Sets the token bucket capacity.
    ///
    /// Default: `5`
    pub fn with_bucket_capacity(mut self, capacity: u32) -> Self {
        self.bucket_capacity = capacity;
        self
    }

    /// Sets the token refill interval.
    ///
    /// Default: `60` seconds
    pub fn with_refill_interval(mut self, interval: Duration) -> Self {
        self.refill_interval = interval;
        self
    }

    /// Enables or disables hedging.
    ///
    /// Default: `false`
    pub fn with_hedging_enabled(mut self, enabled: bool) -> Self {
        self.hedging_enabled = enabled;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), RiskConfigError> {
        if self.max_gross_exposure == 0 {
            return Err(RiskConfigError::NonPositiveGrossExposure);
        }

        if self.bucket_capacity == 0 {
            return Err(RiskConfigError::NonPositiveBucketCapacity);
        }

        if self.refill_interval <= Duration::zero() {
            return Err(RiskConfigError::NonPositiveRefillInterval);
        }

        Ok(())
    }
}
