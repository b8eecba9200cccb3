//! Built-in metrics for poll ticks.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Poll ticks and tick duration
//! - Detected changes
//! - Callback failures
//! - Active and pruned watches
//!
//! # Examples
//!
//! ```rust,no_run
//! use deepwatch::prelude::*;
//! use opentelemetry::global;
//!
//! # fn example() -> Result<()> {
//! let meter = global::meter("my-app");
//!
//! let watcher = Watcher::builder()
//!     .with_metrics(meter)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod watch_metrics;

pub use watch_metrics::WatchMetrics;
