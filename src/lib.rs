//! # deepwatch
//!
//! Polling-based deep change detection for structured values.
//!
//! ## Overview
//!
//! `deepwatch` watches values by comparison rather than by notification:
//! - Register a [`Subject`](core::Subject) with a callback
//! - A poller deep-compares each subject against a saved snapshot at a fixed rate
//! - On a difference the snapshot is refreshed and the callback runs
//!
//! There is no diff output, only a changed/unchanged signal per tick.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deepwatch::prelude::*;
//! use serde_json::json;
//!
//! # async fn example() -> Result<()> {
//! let watcher = Watcher::new();
//! let settings = Subject::new(json!({ "server": { "port": 8080 } }));
//!
//! watcher.watch(&settings, |subject| {
//!     println!("settings changed: {:?}", subject.read());
//! })?;
//! watcher.start()?;
//!
//! // Mutate from anywhere; the next tick reports it
//! settings.update(|value| {
//!     if let Some(port) = value.pointer_mut("/server/port") {
//!         *port = Value::from(9090);
//!     }
//! });
//!
//! // Stop the poller and drop every watch
//! watcher.dispose();
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Deep clone and deep equality** over maps, lists and scalars, with a depth limit
//! - **Strict or loose** scalar comparison
//! - **One watch per subject**: re-watching replaces the callback
//! - **Failure isolation**: a failing callback never stops the tick
//! - **Explicit lifecycle**: `start` / `stop` / `dispose`, no global state
//! - **Settings** loaded from YAML/TOML/JSON files and environment variables
//! - **Metrics** via OpenTelemetry (`metrics` feature)
//!
//! ## Feature Flags
//!
//! ```toml
//! [dependencies]
//! deepwatch = { version = "0.1", features = ["metrics"] }
//! ```
//!
//! `poller` (default) enables the tokio-driven background poller. Without it,
//! ticks are driven by calling [`Watcher::poll_once`](core::Watcher::poll_once).

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod settings;
pub mod value;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{Subject, TickReport, WeakWatcher, Watcher, WatcherBuilder};
    pub use crate::error::{CallbackError, Result, WatchError};
    pub use crate::settings::WatcherSettings;
    pub use crate::value::{Equality, Value};
}
