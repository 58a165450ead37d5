use chrono::Duration;
use tokio::time;

/// Configuration for the event stream merger.
#[derive(Clone, Debug)]
pub struct MergeConfig {
    staleness_tolerance: Duration,
    source_wait_timeout: time::Duration,
    queue_capacity: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            staleness_tolerance: Duration::seconds(30),
            source_wait_timeout: time::Duration::from_secs(10),
            queue_capacity: 1_024,
        }
    }
}

impl MergeConfig {
    /// Returns how far (in event time) the merged output may run ahead of a
    /// stalled source's last known timestamp before that source stops
    /// gating emission.
    pub fn staleness_tolerance(&self) -> Duration {
        self.staleness_tolerance
    }

    /// Returns how long (in wall-clock time) the merger waits on a stalled
    /// source before declaring it timed out and proceeding without it.
    pub fn source_wait_timeout(&self) -> time::Duration {
        self.source_wait_timeout
    }

    /// Returns the per-source queue capacity used by producer workers.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Sets the staleness tolerance.
    ///
    /// Default: `30` seconds
    pub fn with_staleness_tolerance(mut self, secs: u64) -> Self {
        self.staleness_tolerance = Duration::seconds(secs as i64);
        self
    }

    /// Sets the wall-clock wait bound for a stalled source.
    ///
    /// Default: `10` seconds
    pub fn with_source_wait_timeout(mut self, secs: u64) -> Self {
        self.source_wait_timeout = time::Duration::from_secs(secs);
        self
    }

    /// Sets the per-source queue capacity.
    ///
    /// Default: `1024`
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }
}
