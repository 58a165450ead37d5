use tokio::time;

/// Configuration for the order lifecycle manager.
#[derive(Clone, Debug)]
pub struct OrderManagerConfig {
    max_submit_attempts: u32,
    max_reconcile_attempts: u32,
    backoff_base: time::Duration,
    backoff_cap: time::Duration,
    broker_deadline: time::Duration,
    update_capacity: usize,
}

impl Default for OrderManagerConfig {
    fn default() -> Self {
        Self {
            max_submit_attempts: 3,
            max_reconcile_attempts: 3,
            backoff_base: time::Duration::from_millis(500),
            backoff_cap: time::Duration::from_secs(10),
            broker_deadline: time::Duration::from_secs(5),
            update_capacity: 256,
        }
    }
}

impl OrderManagerConfig {
    /// Returns the bounded submission attempt count for transient failures.
    pub fn max_submit_attempts(&self) -> u32 {
        self.max_submit_attempts
    }

    /// Returns how many times a status query is attempted before the symbol
    /// is halted fail-safe.
    pub fn max_reconcile_attempts(&self) -> u32 {
        self.max_reconcile_attempts
    }

    /// Returns the base delay of the exponential backoff.
    pub fn backoff_base(&self) -> time::Duration {
        self.backoff_base
    }

    /// Returns the backoff delay cap.
    pub fn backoff_cap(&self) -> time::Duration {
        self.backoff_cap
    }

    /// Returns the deadline carried by every broker call.
    pub fn broker_deadline(&self) -> time::Duration {
        self.broker_deadline
    }

    /// Returns the order update broadcast channel capacity.
    pub fn update_capacity(&self) -> usize {
        self.update_capacity
    }

    /// Sets the bounded submission attempt count.
    ///
    /// Default: `3`
    pub fn with_max_submit_attempts(mut self, attempts: u32) -> Self {
        self.max_submit_attempts = attempts.max(1);
        self
    }

    /// Sets the bounded reconciliation attempt count.
    ///
    /// Default: `3`
    pub fn with_max_reconcile_attempts(mut self, attempts: u32) -> Self {
        self.max_reconcile_attempts = attempts.max(1);
        self
    }

    /// Sets the base backoff delay.
    ///
    /// Default: `500` ms
    pub fn with_backoff_base(mut self, base: time::Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Sets the backoff delay cap.
    ///
    /// Default: `10` seconds
    pub fn with_backoff_cap(mut self, cap: time::Duration) -> Self {
        self.backoff_cap = cap;
        self
    }

    /// Sets the broker call deadline.
    ///
    /// Default: `5` seconds
    pub fn with_broker_deadline(mut self, deadline: time::Duration) -> Self {
        self.broker_deadline = deadline;
        self
    }

    /// Sets the order update broadcast channel capacity.
    ///
    /// Default: `256`
    pub fn with_update_capacity(mut self, capacity: usize) -> Self {
        self.update_capacity = capacity.max(1);
        self
    }
}
