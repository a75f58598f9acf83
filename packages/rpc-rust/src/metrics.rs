//! [`Counters`] sink that forwards to the `metrics` facade.
//!
//! Whatever recorder the application installs (Prometheus, statsd, ...)
//! receives the same counter names as [`svcwire_core::MemoryCounters`].
//! Interval counters become histograms in milliseconds.

use std::time::Duration;

use svcwire_core::Counters;

#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsCounters;

impl MetricsCounters {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Counters for MetricsCounters {
    fn increment(&self, name: &str, value: u64) {
        ::metrics::counter!(name.to_string()).increment(value);
    }

    fn timing(&self, name: &str, elapsed: Duration) {
        ::metrics::histogram!(name.to_string()).record(elapsed.as_secs_f64() * 1000.0);
    }
}
