//! Poll tick metrics tracking using OpenTelemetry.

use crate::core::TickReport;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use std::time::Instant;

/// Metrics collector for poll ticks.
///
/// Tracks tick counts, detected changes, callback failures, tick latency and
/// the number of active watches using OpenTelemetry metrics.
///
/// # Examples
///
/// ```rust,no_run
/// use deepwatch::core::TickReport;
/// use deepwatch::metrics::WatchMetrics;
/// use opentelemetry::global;
///
/// let meter = global::meter("deepwatch");
/// let metrics = WatchMetrics::new(meter);
///
/// let timer = metrics.start_tick();
/// // ... run a poll pass ...
/// metrics.record_tick(timer, &TickReport::default(), 0);
/// ```
#[derive(Clone)]
pub struct WatchMetrics {
    ticks: Counter<u64>,
    changes: Counter<u64>,
    callback_failures: Counter<u64>,
    pruned: Counter<u64>,
    tick_duration: Histogram<f64>,
    active_watches: Gauge<i64>,
}

impl WatchMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let ticks = meter
            .u64_counter("deepwatch.ticks")
            .with_description("Total number of poll ticks")
            .build();

        let changes = meter
            .u64_counter("deepwatch.changes")
            .with_description("Number of detected changes")
            .build();

        let callback_failures = meter
            .u64_counter("deepwatch.callback.failures")
            .with_description("Number of failed change callbacks and skipped comparisons")
            .build();

        let pruned = meter
            .u64_counter("deepwatch.watches.pruned")
            .with_description("Number of watches removed after their subject was dropped")
            .build();

        let tick_duration = meter
            .f64_histogram("deepwatch.tick.duration")
            .with_description("Duration of poll ticks in seconds, callbacks included")
            .with_unit("s")
            .build();

        let active_watches = meter
            .i64_gauge("deepwatch.watches.active")
            .with_description("Number of registered watches")
            .build();

        Self {
            ticks,
            changes,
            callback_failures,
            pruned,
            tick_duration,
            active_watches,
        }
    }

    /// Start a tick timer.
    ///
    /// Returns an `Instant` that should be passed to `record_tick` when the
    /// pass completes.
    pub fn start_tick(&self) -> Instant {
        Instant::now()
    }

    /// Record a completed tick.
    ///
    /// # Arguments
    ///
    /// * `start` - The `Instant` returned from `start_tick()`
    /// * `report` - The outcome of the pass
    /// * `active` - Number of watches registered after the pass
    pub fn record_tick(&self, start: Instant, report: &TickReport, active: usize) {
        self.ticks.add(1, &[]);
        self.tick_duration.record(start.elapsed().as_secs_f64(), &[]);
        self.changes.add(report.changed as u64, &[]);
        self.callback_failures.add(report.failed as u64, &[]);
        self.pruned.add(report.pruned as u64, &[]);
        self.active_watches.record(active as i64, &[]);
    }

    /// Update the number of registered watches outside of a tick.
    pub fn update_watch_count(&self, count: usize) {
        self.active_watches.record(count as i64, &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::global;

    #[test]
    fn test_metrics_creation() {
        let meter = global::meter("test");
        let metrics = WatchMetrics::new(meter);

        // Test basic operations don't panic
        let timer = metrics.start_tick();
        let report = TickReport {
            checked: 3,
            changed: 1,
            failed: 1,
            pruned: 0,
        };
        metrics.record_tick(timer, &report, 3);
        metrics.update_watch_count(2);
    }

    #[test]
    fn test_metrics_clone() {
        let metrics = WatchMetrics::new(global::meter("test"));
        let metrics2 = metrics.clone();

        let timer1 = metrics.start_tick();
        let timer2 = metrics2.start_tick();

        metrics.record_tick(timer1, &TickReport::default(), 0);
        metrics2.record_tick(timer2, &TickReport::default(), 0);
    }
}
