//! The watcher context: registry, poll passes and the background poller.

use crate::core::registry::{Callback, TickReport, WatchRegistry};
use crate::core::{Subject, WatcherBuilder};
use crate::error::{CallbackError, Result, WatchError};
use crate::settings::DEFAULT_POLL_INTERVAL;
use crate::value::{DEFAULT_MAX_DEPTH, Equality, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

#[cfg(feature = "metrics")]
use crate::metrics::WatchMetrics;

#[cfg(feature = "poller")]
use parking_lot::Mutex;
#[cfg(feature = "poller")]
use tokio::sync::watch;
#[cfg(feature = "poller")]
use tokio::task::JoinHandle;

/// Values the builder hands over to a new watcher.
pub(crate) struct WatcherParts {
    pub(crate) poll_interval: Duration,
    pub(crate) equality: Equality,
    pub(crate) max_depth: usize,
    #[cfg(feature = "metrics")]
    pub(crate) metrics: Option<WatchMetrics>,
}

/// Polling change detector for [`Subject`]s.
///
/// A `Watcher` owns a registry holding at most one watch per subject and,
/// once started, a background task that runs a poll tick every
/// [`poll_interval`](Watcher::poll_interval). Each tick compares every
/// watched subject with its snapshot; on a difference the snapshot is
/// refreshed and the callback runs with the subject.
///
/// Callbacks run inline on the poller task, one after another. A slow
/// callback delays the rest of its tick and the start of the next one.
///
/// Cloning a `Watcher` clones the handle. When the last handle is dropped
/// the poller stops. A strong clone captured by a change callback is itself
/// a handle and keeps the poller alive until [`dispose`](Watcher::dispose);
/// callbacks that need the watcher should capture a [`WeakWatcher`] from
/// [`downgrade`](Watcher::downgrade) instead.
///
/// # Examples
///
/// ```rust
/// use deepwatch::prelude::*;
/// use serde_json::json;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// # fn example() -> Result<()> {
/// let watcher = Watcher::new();
/// let subject = Subject::new(json!({ "a": 1 }));
///
/// let changes = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&changes);
/// watcher.watch(&subject, move |_| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// })?;
///
/// subject.update(|value| value.insert("a", 2));
/// watcher.poll_once();
///
/// assert_eq!(changes.load(Ordering::SeqCst), 1);
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub struct Watcher {
    inner: Arc<WatcherInner>,
}

/// Non-owning handle to a [`Watcher`].
///
/// Does not keep the watcher or its poller alive. Obtained from
/// [`Watcher::downgrade`].
#[derive(Clone)]
pub struct WeakWatcher {
    inner: Weak<WatcherInner>,
}

impl WeakWatcher {
    /// The watcher, if any strong handle to it still exists.
    pub fn upgrade(&self) -> Option<Watcher> {
        self.inner.upgrade().map(|inner| Watcher { inner })
    }
}

impl fmt::Debug for WeakWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakWatcher")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

struct WatcherInner {
    registry: WatchRegistry,
    poll_interval: Duration,
    disposed: AtomicBool,
    #[cfg(feature = "poller")]
    poller: Mutex<Option<PollerTask>>,
    #[cfg(feature = "metrics")]
    metrics: Option<WatchMetrics>,
}

#[cfg(feature = "poller")]
struct PollerTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

#[cfg(feature = "poller")]
impl PollerTask {
    fn signal(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl WatcherInner {
    fn tick(&self) -> TickReport {
        #[cfg(feature = "metrics")]
        let timer = self.metrics.as_ref().map(WatchMetrics::start_tick);

        let report = self.registry.poll();
        tracing::trace!(
            checked = report.checked,
            changed = report.changed,
            failed = report.failed,
            pruned = report.pruned,
            "poll tick complete"
        );

        #[cfg(feature = "metrics")]
        if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
            metrics.record_tick(timer, &report, self.registry.len());
        }

        report
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(WatchError::Disposed);
        }
        Ok(())
    }
}

#[cfg(feature = "poller")]
impl Drop for WatcherInner {
    fn drop(&mut self) {
        if let Some(task) = self.poller.get_mut().take() {
            task.signal();
        }
    }
}

impl Watcher {
    /// Create a watcher with default settings: a poll period of 1000/12 ms,
    /// strict equality and a depth limit of 512.
    pub fn new() -> Self {
        Self::from_parts(WatcherParts {
            poll_interval: DEFAULT_POLL_INTERVAL,
            equality: Equality::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            #[cfg(feature = "metrics")]
            metrics: None,
        })
    }

    /// Create a new builder for constructing a watcher.
    pub fn builder() -> WatcherBuilder {
        WatcherBuilder::new()
    }

    /// Create a non-owning handle, for capture inside change callbacks.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use deepwatch::prelude::*;
    /// use serde_json::json;
    ///
    /// # fn example() -> Result<()> {
    /// let watcher = Watcher::new();
    /// let subject = Subject::new(json!({ "once": true }));
    ///
    /// let weak = watcher.downgrade();
    /// watcher.watch(&subject, move |subject| {
    ///     if let Some(watcher) = weak.upgrade() {
    ///         watcher.unwatch(subject);
    ///     }
    /// })?;
    ///
    /// subject.update(|value| value.insert("once", false));
    /// watcher.poll_once();
    /// assert!(!watcher.is_watched(&subject));
    /// # Ok(())
    /// # }
    /// # example().unwrap();
    /// ```
    pub fn downgrade(&self) -> WeakWatcher {
        WeakWatcher {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub(crate) fn from_parts(parts: WatcherParts) -> Self {
        Self {
            inner: Arc::new(WatcherInner {
                registry: WatchRegistry::new(parts.equality, parts.max_depth),
                poll_interval: parts.poll_interval,
                disposed: AtomicBool::new(false),
                #[cfg(feature = "poller")]
                poller: Mutex::new(None),
                #[cfg(feature = "metrics")]
                metrics: parts.metrics,
            }),
        }
    }

    /// Watch `subject`, invoking `callback` with it after each detected change.
    ///
    /// Any existing watch on the same subject is replaced; a subject never
    /// has more than one callback. The snapshot is taken immediately.
    ///
    /// A panicking callback is caught and logged; it does not stop the poll
    /// tick or unregister the watch.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The subject holds a scalar rather than a map or list (`InvalidArgument`)
    /// - The value nests deeper than the depth limit (`UnsupportedValue`)
    /// - The watcher has been disposed (`Disposed`)
    pub fn watch<F>(&self, subject: &Subject, callback: F) -> Result<()>
    where
        F: Fn(&Subject) + Send + Sync + 'static,
    {
        self.register(
            subject,
            Arc::new(move |subject: &Subject| -> std::result::Result<(), CallbackError> {
                callback(subject);
                Ok(())
            }),
        )
    }

    /// Like [`watch`](Watcher::watch), for callbacks that can fail.
    ///
    /// An `Err` from the callback is logged and counted in the tick report.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use deepwatch::prelude::*;
    /// use serde_json::json;
    ///
    /// # fn example() -> Result<()> {
    /// let watcher = Watcher::new();
    /// let subject = Subject::new(json!({ "port": 8080 }));
    ///
    /// watcher.watch_fallible(&subject, |subject| {
    ///     match subject.read().get("port").and_then(Value::as_i64) {
    ///         Some(port) if port > 0 => Ok(()),
    ///         _ => Err("port must be positive"),
    ///     }
    /// })?;
    ///
    /// subject.update(|value| value.insert("port", -1));
    /// assert_eq!(watcher.poll_once().failed, 1);
    /// # Ok(())
    /// # }
    /// # example().unwrap();
    /// ```
    pub fn watch_fallible<F, E>(&self, subject: &Subject, callback: F) -> Result<()>
    where
        F: Fn(&Subject) -> std::result::Result<(), E> + Send + Sync + 'static,
        E: fmt::Display + 'static,
    {
        self.register(
            subject,
            Arc::new(move |subject: &Subject| callback(subject).map_err(CallbackError::failed)),
        )
    }

    fn register(&self, subject: &Subject, callback: Callback) -> Result<()> {
        self.inner.ensure_live()?;
        self.inner.registry.register(subject, callback)?;

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.inner.metrics {
            metrics.update_watch_count(self.inner.registry.len());
        }
        Ok(())
    }

    /// Stop watching `subject`. Returns whether a watch was removed.
    ///
    /// A callback already running is not interrupted.
    pub fn unwatch(&self, subject: &Subject) -> bool {
        let removed = self.inner.registry.remove(subject.id());

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.inner.metrics {
            metrics.update_watch_count(self.inner.registry.len());
        }
        removed
    }

    /// Whether `subject` is currently watched.
    pub fn is_watched(&self, subject: &Subject) -> bool {
        self.inner.registry.contains(subject.id())
    }

    /// Number of registered watches.
    pub fn watch_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// The snapshot currently held for `subject`.
    pub fn snapshot_of(&self, subject: &Subject) -> Option<Arc<Value>> {
        self.inner.registry.snapshot(subject.id())
    }

    /// Run one poll tick on the calling thread.
    ///
    /// Ticks never overlap: this waits for a tick in progress on another
    /// thread. Calling it from inside a change callback deadlocks.
    pub fn poll_once(&self) -> TickReport {
        self.inner.tick()
    }

    /// The period between poll ticks.
    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }

    /// The scalar comparison mode.
    pub fn equality(&self) -> Equality {
        self.inner.registry.equality()
    }

    /// The nesting limit for clone and comparison.
    pub fn max_depth(&self) -> usize {
        self.inner.registry.max_depth()
    }

    /// Whether [`dispose`](Watcher::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Start the background poller on the current tokio runtime.
    ///
    /// The first tick runs one poll interval after the call. Returns
    /// `Ok(false)` if the poller was already running.
    ///
    /// # Errors
    ///
    /// Returns `WatchError::NoRuntime` outside a tokio runtime and
    /// `WatchError::Disposed` after [`dispose`](Watcher::dispose).
    #[cfg(feature = "poller")]
    pub fn start(&self) -> Result<bool> {
        self.inner.ensure_live()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| WatchError::NoRuntime)?;

        let mut slot = self.inner.poller.lock();
        // dispose stores the flag before taking this lock to stop the task
        self.inner.ensure_live()?;
        if slot.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            return Ok(false);
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = runtime.spawn(run_poller(
            Arc::downgrade(&self.inner),
            self.inner.poll_interval,
            shutdown_rx,
        ));
        *slot = Some(PollerTask { shutdown, handle });

        tracing::debug!(interval = ?self.inner.poll_interval, "poller started");
        Ok(true)
    }

    /// Stop the background poller. Returns whether it was running.
    ///
    /// A tick in progress runs to completion. The watcher can be started
    /// again afterwards.
    #[cfg(feature = "poller")]
    pub fn stop(&self) -> bool {
        let task = self.inner.poller.lock().take();
        match task {
            Some(task) => {
                let was_running = !task.handle.is_finished();
                task.signal();
                tracing::debug!("poller stopped");
                was_running
            }
            None => false,
        }
    }

    /// Whether the background poller is running.
    #[cfg(feature = "poller")]
    pub fn is_running(&self) -> bool {
        self.inner
            .poller
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Stop the poller and drop every watch. Further calls to `watch` and
    /// `start` fail with `WatchError::Disposed`.
    ///
    /// Returns the number of watches removed.
    pub fn dispose(&self) -> usize {
        self.inner.disposed.store(true, Ordering::Release);

        #[cfg(feature = "poller")]
        self.stop();

        let removed = self.inner.registry.close();

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.inner.metrics {
            metrics.update_watch_count(0);
        }
        tracing::debug!(removed, "watcher disposed");
        removed
    }
}

#[cfg(feature = "poller")]
async fn run_poller(
    inner: Weak<WatcherInner>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else { break };
                inner.tick();
            }
        }
    }
}

impl Default for Watcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Watcher {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("poll_interval", &self.inner.poll_interval)
            .field("equality", &self.equality())
            .field("max_depth", &self.max_depth())
            .field("watches", &self.watch_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
