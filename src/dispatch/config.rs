//! Dispatcher configuration

use std::time::Duration;

/// Dispatcher configuration options
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum number of events waiting in the queue
    pub queue_capacity: usize,

    /// Upper bound on a single delivery; exceeding it counts as a failure
    pub delivery_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            delivery_timeout: Duration::from_secs(5),
        }
    }
}

impl DispatcherConfig {
    /// Set the queue capacity (at least 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the per-delivery timeout
    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }
}
