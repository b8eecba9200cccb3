//! Error types for deepwatch.

use std::fmt;

/// Result type alias for deepwatch operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors that can occur when registering, polling or configuring watches.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// An argument was rejected (scalar root value, invalid setting).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The value nests deeper than the configured depth limit.
    #[error("Unsupported value: nesting exceeds the depth limit of {max_depth}")]
    UnsupportedValue {
        /// The depth limit that was exceeded
        max_depth: usize,
    },

    /// The watcher was disposed and no longer accepts work.
    #[error("Watcher has been disposed")]
    Disposed,

    /// The poller was started outside a tokio runtime.
    #[error("No tokio runtime available to run the poller")]
    NoRuntime,

    /// Failed to load settings from a source.
    #[error("Failed to load settings: {0}")]
    LoadError(String),

    /// Failed to parse settings into the expected shape.
    #[error("Failed to parse settings: {0}")]
    ParseError(String),

    /// Failed to convert a serializable type into a `Value`.
    #[error("Failed to convert value: {0}")]
    Conversion(String),
}

/// Failure reported by a change callback during a poll tick.
///
/// Callback failures never reach the caller of `watch`; the poller logs
/// them and moves on to the next entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// The callback panicked.
    Panicked(String),

    /// The callback returned an error.
    Failed(String),
}

impl CallbackError {
    /// Create a failure from any displayable error.
    pub fn failed(err: impl fmt::Display) -> Self {
        Self::Failed(err.to_string())
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked(msg)
    }
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Panicked(msg) => write!(f, "callback panicked: {}", msg),
            Self::Failed(msg) => write!(f, "callback failed: {}", msg),
        }
    }
}

impl std::error::Error for CallbackError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_messages() {
        let err = CallbackError::from_panic(Box::new("boom"));
        assert_eq!(err, CallbackError::Panicked("boom".to_string()));

        let err = CallbackError::from_panic(Box::new(String::from("owned boom")));
        assert_eq!(err.to_string(), "callback panicked: owned boom");

        let err = CallbackError::from_panic(Box::new(42_u32));
        assert_eq!(err, CallbackError::Panicked("non-string panic payload".to_string()));
    }

    #[test]
    fn test_unsupported_value_display() {
        let err = WatchError::UnsupportedValue { max_depth: 8 };
        assert_eq!(
            err.to_string(),
            "Unsupported value: nesting exceeds the depth limit of 8"
        );
    }
}
