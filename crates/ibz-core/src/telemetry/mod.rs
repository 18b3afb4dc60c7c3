//! Metric recording for stages and runs.
//!
//! Recording functions are always callable. Values are only retained when the
//! `telemetry` feature is enabled; otherwise they compile to nothing and
//! [`snapshot`] stays empty.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod stage;
pub mod tags;

pub use stage::{DefaultStageTelemetry, StageTelemetry};

/// Aggregated samples of one histogram metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub total: u64,
    pub min: u64,
    pub max: u64,
}

impl HistogramSnapshot {
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total as f64 / self.count as f64
        }
    }
}

/// Point-in-time copy of every metric recorded in this process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, u64>,
    pub histograms: BTreeMap<String, HistogramSnapshot>,
}

impl TelemetrySnapshot {
    /// Counter value, zero when the counter was never touched.
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn gauge(&self, name: &str) -> Option<u64> {
        self.gauges.get(name).copied()
    }

    pub fn histogram(&self, name: &str) -> Option<HistogramSnapshot> {
        self.histograms.get(name).copied()
    }
}

pub fn increment_counter(name: &'static str, value: u64) {
    #[cfg(feature = "telemetry")]
    registry::with(|metrics| metrics.increment(name, value));

    let _ = (name, value);
}

pub fn record_histogram(name: &'static str, value: u64) {
    #[cfg(feature = "telemetry")]
    registry::with(|metrics| metrics.sample(name, value));

    let _ = (name, value);
}

pub fn set_gauge(name: &'static str, value: u64) {
    #[cfg(feature = "telemetry")]
    registry::with(|metrics| metrics.adjust_gauge(name, |_| value));

    let _ = (name, value);
}

pub fn add_gauge(name: &'static str, delta: u64) {
    #[cfg(feature = "telemetry")]
    registry::with(|metrics| metrics.adjust_gauge(name, |current| current.saturating_add(delta)));

    let _ = (name, delta);
}

/// Lowers a gauge by `delta`, stopping at zero.
pub fn sub_gauge_saturating(name: &'static str, delta: u64) {
    #[cfg(feature = "telemetry")]
    registry::with(|metrics| metrics.adjust_gauge(name, |current| current.saturating_sub(delta)));

    let _ = (name, delta);
}

pub fn snapshot() -> TelemetrySnapshot {
    #[cfg(feature = "telemetry")]
    let snapshot = registry::with(|metrics| metrics.snapshot());
    #[cfg(not(feature = "telemetry"))]
    let snapshot = TelemetrySnapshot::default();

    snapshot
}

#[cfg(feature = "telemetry")]
mod registry {
    use std::collections::BTreeMap;
    use std::sync::{Mutex, OnceLock, PoisonError};

    use super::{HistogramSnapshot, TelemetrySnapshot};

    #[derive(Default)]
    pub(super) struct Metrics {
        counters: BTreeMap<&'static str, u64>,
        gauges: BTreeMap<&'static str, u64>,
        histograms: BTreeMap<&'static str, HistogramSnapshot>,
    }

    impl Metrics {
        pub(super) fn increment(&mut self, name: &'static str, value: u64) {
            let counter = self.counters.entry(name).or_default();
            *counter = counter.saturating_add(value);
        }

        pub(super) fn adjust_gauge(&mut self, name: &'static str, update: impl FnOnce(u64) -> u64) {
            let gauge = self.gauges.entry(name).or_default();
            *gauge = update(*gauge);
        }

        pub(super) fn sample(&mut self, name: &'static str, value: u64) {
            let histogram = self.histograms.entry(name).or_default();
            if histogram.count == 0 {
                histogram.min = value;
                histogram.max = value;
            } else {
                histogram.min = histogram.min.min(value);
                histogram.max = histogram.max.max(value);
            }
            histogram.count = histogram.count.saturating_add(1);
            histogram.total = histogram.total.saturating_add(value);
        }

        pub(super) fn snapshot(&self) -> TelemetrySnapshot {
            fn owned<V: Copy>(map: &BTreeMap<&'static str, V>) -> BTreeMap<String, V> {
                map.iter().map(|(name, value)| (name.to_string(), *value)).collect()
            }

            TelemetrySnapshot {
                counters: owned(&self.counters),
                gauges: owned(&self.gauges),
                histograms: owned(&self.histograms),
            }
        }
    }

    pub(super) fn with<R>(f: impl FnOnce(&mut Metrics) -> R) -> R {
        static METRICS: OnceLock<Mutex<Metrics>> = OnceLock::new();
        let mut metrics = METRICS
            .get_or_init(Mutex::default)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut metrics)
    }
}
