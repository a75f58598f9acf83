//! Performance counters consumed by instrumented components.
//!
//! Components only see the [`Counters`] trait. [`MemoryCounters`] keeps the
//! values in process so tests and status pages can read them back; other
//! sinks (for example the `metrics` facade) live next to the transport code.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Sink for increment and interval counters.
pub trait Counters: Send + Sync {
    /// Adds `value` to the counter `name`.
    fn increment(&self, name: &str, value: u64);

    /// Records one interval measurement for the counter `name`.
    fn timing(&self, name: &str, elapsed: Duration);
}

/// Running timer for one interval counter. Reports on [`CounterTiming::end_timing`].
pub struct CounterTiming {
    counters: Arc<dyn Counters>,
    name: String,
    start: Instant,
}

impl CounterTiming {
    /// Starts timing `name`.
    #[must_use]
    pub fn begin(counters: Arc<dyn Counters>, name: impl Into<String>) -> Self {
        Self {
            counters,
            name: name.into(),
            start: Instant::now(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops the timer and records the elapsed time.
    pub fn end_timing(self) -> Duration {
        let elapsed = self.start.elapsed();
        self.counters.timing(&self.name, elapsed);
        elapsed
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCounters;

impl Counters for NullCounters {
    fn increment(&self, _name: &str, _value: u64) {}

    fn timing(&self, _name: &str, _elapsed: Duration) {}
}

// ---------------------------------------------------------------------------
// MemoryCounters
// ---------------------------------------------------------------------------

/// Kind of a recorded counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterType {
    Increment,
    Interval,
}

/// Snapshot of one counter.
#[derive(Debug, Clone, PartialEq)]
pub struct Counter {
    pub name: String,
    pub kind: CounterType,
    /// Sum of increments, or number of recorded intervals.
    pub count: u64,
    /// Interval statistics in milliseconds; zero for increment counters.
    pub last: f64,
    pub min: f64,
    pub max: f64,
    pub average: f64,
}

#[derive(Debug, Clone)]
struct Slot {
    kind: CounterType,
    count: u64,
    last: f64,
    min: f64,
    max: f64,
    total: f64,
}

impl Slot {
    fn new(kind: CounterType) -> Self {
        Self {
            kind,
            count: 0,
            last: 0.0,
            min: f64::MAX,
            max: 0.0,
            total: 0.0,
        }
    }
}

/// In-process counters with snapshots, safe to share between tasks.
#[derive(Debug, Default)]
pub struct MemoryCounters {
    slots: DashMap<String, Slot>,
}

impl MemoryCounters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one counter, if it has been touched.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Counter> {
        self.slots.get(name).map(|slot| snapshot(name, &slot))
    }

    /// Current count of `name`, zero when unknown.
    #[must_use]
    pub fn count(&self, name: &str) -> u64 {
        self.slots.get(name).map_or(0, |slot| slot.count)
    }

    /// Snapshots of all counters sorted by name.
    #[must_use]
    pub fn all(&self) -> Vec<Counter> {
        let mut counters: Vec<Counter> = self
            .slots
            .iter()
            .map(|entry| snapshot(entry.key(), entry.value()))
            .collect();
        counters.sort_by(|a, b| a.name.cmp(&b.name));
        counters
    }

    pub fn clear(&self) {
        self.slots.clear();
    }
}

fn snapshot(name: &str, slot: &Slot) -> Counter {
    let (min, average) = if slot.kind == CounterType::Interval && slot.count > 0 {
        #[allow(clippy::cast_precision_loss)]
        let average = slot.total / slot.count as f64;
        (slot.min, average)
    } else {
        (0.0, 0.0)
    };
    Counter {
        name: name.to_string(),
        kind: slot.kind,
        count: slot.count,
        last: slot.last,
        min,
        max: slot.max,
        average,
    }
}

impl Counters for MemoryCounters {
    fn increment(&self, name: &str, value: u64) {
        let mut slot = self
            .slots
            .entry(name.to_string())
            .or_insert_with(|| Slot::new(CounterType::Increment));
        slot.count = slot.count.saturating_add(value);
    }

    fn timing(&self, name: &str, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        let mut slot = self
            .slots
            .entry(name.to_string())
            .or_insert_with(|| Slot::new(CounterType::Interval));
        slot.count += 1;
        slot.last = ms;
        slot.min = slot.min.min(ms);
        slot.max = slot.max.max(ms);
        slot.total += ms;
    }
}
