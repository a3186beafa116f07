//! Statistics for event dispatch

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters updated by the dispatcher
///
/// Shared behind an `Arc`; every counter is a relaxed atomic so readers never
/// contend with the dispatch loop.
#[derive(Debug)]
pub struct DispatchStats {
    started_at: Instant,
    events_received: AtomicU64,
    events_dropped: AtomicU64,
    deliveries: AtomicU64,
    delivery_failures: AtomicU64,
    delivery_timeouts: AtomicU64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            events_received: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            delivery_timeouts: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_event(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivery(&self) {
        self.deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.delivery_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            uptime: self.started_at.elapsed(),
            events_received: self.events_received.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            delivery_timeouts: self.delivery_timeouts.load(Ordering::Relaxed),
        }
    }
}

impl Default for DispatchStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy of the dispatch counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSnapshot {
    /// Time since the stats were created
    pub uptime: Duration,
    /// Events taken off the queue
    pub events_received: u64,
    /// Events dropped before fanout (resolver or encoding failure)
    pub events_dropped: u64,
    /// Frames handed to a connection successfully
    pub deliveries: u64,
    /// Deliveries that failed because the connection was gone
    pub delivery_failures: u64,
    /// Deliveries that exceeded the delivery timeout
    pub delivery_timeouts: u64,
}

impl DispatchSnapshot {
    /// Deliveries attempted, successful or not
    pub fn attempted(&self) -> u64 {
        self.deliveries + self.delivery_failures + self.delivery_timeouts
    }

    /// Average successful deliveries per received event
    pub fn fanout_ratio(&self) -> f64 {
        if self.events_received > 0 {
            self.deliveries as f64 / self.events_received as f64
        } else {
            0.0
        }
    }
}
