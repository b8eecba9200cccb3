//! Watcher settings and their loading from files and environment variables.

use crate::error::{Result, WatchError};
use crate::value::{DEFAULT_MAX_DEPTH, Equality};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default poll period: twelve ticks per second.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / 12);

/// Tunable watcher settings.
///
/// Every field has a default, so a settings file only needs the keys it
/// changes.
///
/// ```yaml
/// poll_interval_ms: 250
/// equality: loose
/// max_depth: 64
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherSettings {
    /// Poll period in milliseconds; `None` means [`DEFAULT_POLL_INTERVAL`].
    pub poll_interval_ms: Option<u64>,
    /// Scalar comparison mode.
    pub equality: Equality,
    /// Nesting limit for clone and comparison.
    pub max_depth: usize,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: None,
            equality: Equality::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl WatcherSettings {
    /// Create a loader that merges settings from files and the environment.
    pub fn loader() -> SettingsLoader {
        SettingsLoader::new()
    }

    /// The effective poll period.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval_ms
            .map_or(DEFAULT_POLL_INTERVAL, Duration::from_millis)
    }

    /// Check that the settings describe a usable watcher.
    ///
    /// # Errors
    ///
    /// Returns `WatchError::InvalidArgument` for a zero poll interval or a
    /// zero depth limit.
    pub fn validate(&self) -> Result<()> {
        validate(self.poll_interval(), self.max_depth)
    }
}

pub(crate) fn validate(poll_interval: Duration, max_depth: usize) -> Result<()> {
    if poll_interval.is_zero() {
        return Err(WatchError::InvalidArgument(
            "poll interval must be greater than zero".to_string(),
        ));
    }
    if max_depth == 0 {
        return Err(WatchError::InvalidArgument(
            "max depth must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Loads [`WatcherSettings`] from settings files and environment variables.
///
/// Files are merged in the order they are added, later files overriding
/// earlier ones; environment variables override every file.
///
/// # Examples
///
/// ```rust,no_run
/// use deepwatch::settings::WatcherSettings;
///
/// # fn example() -> deepwatch::error::Result<()> {
/// // WATCH_POLL_INTERVAL_MS=250 -> poll_interval_ms = 250
/// let settings = WatcherSettings::loader()
///     .with_file("config/watch.yaml")
///     .with_env_overrides("WATCH", "__")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct SettingsLoader {
    files: Vec<PathBuf>,
    env_prefix: Option<String>,
    env_separator: Option<String>,
}

impl SettingsLoader {
    /// Create a loader with no sources; `load` then yields the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a settings file. YAML, TOML and JSON are detected by extension.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    /// Add environment variable overrides.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Prefix for environment variables (e.g., "WATCH")
    /// * `separator` - Separator for nested keys (e.g., "__")
    pub fn with_env_overrides(mut self, prefix: &str, separator: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self.env_separator = Some(separator.to_string());
        self
    }

    /// Merge all sources into validated settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A file is missing or cannot be parsed (`LoadError`)
    /// - The merged values do not fit `WatcherSettings` (`ParseError`)
    /// - The settings fail validation (`InvalidArgument`)
    pub fn load(&self) -> Result<WatcherSettings> {
        let mut builder = config::Config::builder();

        for path in &self.files {
            builder = builder.add_source(config::File::from(path.as_path()));
        }

        if let (Some(prefix), Some(separator)) = (&self.env_prefix, &self.env_separator) {
            builder = builder.add_source(
                config::Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator(separator)
                    .try_parsing(true),
            );
        }

        let config = builder
            .build()
            .map_err(|e| WatchError::LoadError(format!("Failed to build settings: {}", e)))?;

        let settings: WatcherSettings = config
            .try_deserialize()
            .map_err(|e| WatchError::ParseError(e.to_string()))?;

        settings.validate()?;
        tracing::debug!(
            files = self.files.len(),
            poll_interval = ?settings.poll_interval(),
            equality = ?settings.equality,
            max_depth = settings.max_depth,
            "watcher settings loaded"
        );
        Ok(settings)
    }
}
