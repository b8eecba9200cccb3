//! Builder for constructing Watcher instances.

use crate::core::Watcher;
use crate::core::watcher::WatcherParts;
use crate::error::Result;
use crate::settings::{self, DEFAULT_POLL_INTERVAL, WatcherSettings};
use crate::value::{DEFAULT_MAX_DEPTH, Equality};
use std::time::Duration;

#[cfg(feature = "metrics")]
use crate::metrics::WatchMetrics;

/// Builder for constructing a `Watcher` instance.
///
/// Provides a fluent interface over the poll period, the equality mode and
/// the depth limit.
///
/// # Examples
///
/// ```rust
/// use deepwatch::prelude::*;
/// use std::time::Duration;
///
/// # fn example() -> Result<()> {
/// let watcher = Watcher::builder()
///     .with_poll_interval(Duration::from_millis(250))
///     .with_equality(Equality::Loose)
///     .with_max_depth(64)
///     .build()?;
///
/// assert_eq!(watcher.poll_interval(), Duration::from_millis(250));
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub struct WatcherBuilder {
    poll_interval: Duration,
    equality: Equality,
    max_depth: usize,
    #[cfg(feature = "metrics")]
    metrics: Option<WatchMetrics>,
}

impl WatcherBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            equality: Equality::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Set the period between poll ticks.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set how scalar leaves are compared.
    pub fn with_equality(mut self, equality: Equality) -> Self {
        self.equality = equality;
        self
    }

    /// Set the nesting limit for clone and comparison.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Apply loaded settings, replacing every value set so far.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use deepwatch::prelude::*;
    ///
    /// # fn example() -> Result<()> {
    /// let settings = WatcherSettings::loader()
    ///     .with_file("config/watch.yaml")
    ///     .load()?;
    ///
    /// let watcher = Watcher::builder().with_settings(&settings).build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_settings(mut self, settings: &WatcherSettings) -> Self {
        self.poll_interval = settings.poll_interval();
        self.equality = settings.equality;
        self.max_depth = settings.max_depth;
        self
    }

    /// Record tick metrics with the given meter.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.metrics = Some(WatchMetrics::new(meter));
        self
    }

    /// Build the watcher.
    ///
    /// The poller is not started; call [`Watcher::start`] or drive ticks
    /// with [`Watcher::poll_once`].
    ///
    /// # Errors
    ///
    /// Returns `WatchError::InvalidArgument` for a zero poll interval or a
    /// zero depth limit.
    pub fn build(self) -> Result<Watcher> {
        settings::validate(self.poll_interval, self.max_depth)?;

        Ok(Watcher::from_parts(WatcherParts {
            poll_interval: self.poll_interval,
            equality: self.equality,
            max_depth: self.max_depth,
            #[cfg(feature = "metrics")]
            metrics: self.metrics,
        }))
    }
}

impl Default for WatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WatchError;

    #[test]
    fn test_builder_defaults() {
        let builder = WatcherBuilder::new();

        assert_eq!(builder.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(builder.equality, Equality::Strict);
        assert_eq!(builder.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_builder_with_settings() {
        let settings = WatcherSettings {
            poll_interval_ms: Some(40),
            equality: Equality::Loose,
            max_depth: 8,
        };
        let watcher = WatcherBuilder::new().with_settings(&settings).build().unwrap();

        assert_eq!(watcher.poll_interval(), Duration::from_millis(40));
        assert_eq!(watcher.equality(), Equality::Loose);
        assert_eq!(watcher.max_depth(), 8);
    }

    #[test]
    fn test_builder_rejects_zero_interval() {
        let result = WatcherBuilder::new().with_poll_interval(Duration::ZERO).build();
        assert!(matches!(result, Err(WatchError::InvalidArgument(_))));
    }

    #[test]
    fn test_builder_rejects_zero_depth() {
        let result = WatcherBuilder::new().with_max_depth(0).build();
        assert!(matches!(result, Err(WatchError::InvalidArgument(_))));
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_builder_with_metrics() {
        use crate::core::Subject;
        use serde_json::json;

        let watcher = WatcherBuilder::new()
            .with_metrics(opentelemetry::global::meter("test"))
            .build()
            .unwrap();
        let subject = Subject::new(json!({ "a": 1 }));
        watcher.watch(&subject, |_| {}).unwrap();

        subject.update(|v| v.insert("a", 2));
        assert_eq!(watcher.poll_once().changed, 1);
    }
}
