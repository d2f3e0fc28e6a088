//! Run statistics

use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters incremented by the engine while it runs.
///
/// Atomic so stream workers can share one instance.
#[derive(Debug, Default)]
pub struct RunStats {
    events: AtomicUsize,
    grains: AtomicUsize,
    filterings: AtomicUsize,
    convolutions: AtomicUsize,
}

/// Plain copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub events: usize,
    pub grains: usize,
    pub filterings: usize,
    pub convolutions: usize,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_events(&self, count: usize) {
        self.events.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_grain(&self) {
        self.grains.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filtering(&self) {
        self.filterings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_convolution(&self) {
        self.convolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events: self.events.load(Ordering::Relaxed),
            grains: self.grains.load(Ordering::Relaxed),
            filterings: self.filterings.load(Ordering::Relaxed),
            convolutions: self.convolutions.load(Ordering::Relaxed),
        }
    }
}
