//! Registry of watched subjects and the poll pass over them.

use crate::core::subject::{Subject, SubjectId, WeakSubject};
use crate::error::{CallbackError, Result, WatchError};
use crate::value::{Equality, Value, deep_clone, try_deep_equal};
use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Type alias for change callbacks stored in the registry.
pub(crate) type Callback =
    Arc<dyn Fn(&Subject) -> std::result::Result<(), CallbackError> + Send + Sync>;

/// Outcome of one poll tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Live entries compared against their snapshot.
    pub checked: usize,
    /// Entries whose subject differed from the snapshot.
    pub changed: usize,
    /// Callbacks that panicked or returned an error, plus comparisons that
    /// hit the depth limit.
    pub failed: usize,
    /// Entries removed because every handle to their subject was dropped.
    pub pruned: usize,
}

/// One watched subject.
struct WatchEntry {
    id: SubjectId,
    subject: WeakSubject,
    snapshot: ArcSwap<Value>,
    callback: Callback,
    active: AtomicBool,
}

impl WatchEntry {
    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Map from subject identity to its single watch entry.
///
/// Re-watching a subject replaces its entry; entries never stack. Poll
/// passes are serialized by `pass` and run without holding the map lock,
/// so callbacks are free to watch and unwatch. `closed` only changes under
/// the map write lock.
pub(crate) struct WatchRegistry {
    entries: RwLock<HashMap<SubjectId, Arc<WatchEntry>>>,
    closed: AtomicBool,
    pass: Mutex<()>,
    equality: Equality,
    max_depth: usize,
}

impl WatchRegistry {
    pub(crate) fn new(equality: Equality, max_depth: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
            pass: Mutex::new(()),
            equality,
            max_depth,
        }
    }

    pub(crate) fn equality(&self) -> Equality {
        self.equality
    }

    pub(crate) fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Register `callback` for `subject`, replacing any previous entry.
    ///
    /// Fails with `Disposed` once the registry is closed.
    pub(crate) fn register(&self, subject: &Subject, callback: Callback) -> Result<()> {
        let snapshot = {
            let value = subject.read();
            if !value.is_structured() {
                return Err(WatchError::InvalidArgument(format!(
                    "only maps and lists can be watched, got {}",
                    value.kind()
                )));
            }
            deep_clone(&value, self.max_depth)?
        };

        let id = subject.id();
        let entry = Arc::new(WatchEntry {
            id,
            subject: subject.downgrade(),
            snapshot: ArcSwap::from_pointee(snapshot),
            callback,
            active: AtomicBool::new(true),
        });

        let previous = {
            let mut entries = self.entries.write();
            if self.closed.load(Ordering::Acquire) {
                return Err(WatchError::Disposed);
            }
            entries.insert(id, entry)
        };
        match previous {
            Some(previous) => {
                previous.deactivate();
                tracing::debug!(subject = ?id, "replaced existing watch");
            }
            None => tracing::debug!(subject = ?id, "watch registered"),
        }
        Ok(())
    }

    /// Remove the entry for `id`, if any.
    pub(crate) fn remove(&self, id: SubjectId) -> bool {
        let removed = self.entries.write().remove(&id);
        match removed {
            Some(entry) => {
                entry.deactivate();
                tracing::debug!(subject = ?id, "watch removed");
                true
            }
            None => false,
        }
    }

    pub(crate) fn contains(&self, id: SubjectId) -> bool {
        self.entries.read().contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub(crate) fn snapshot(&self, id: SubjectId) -> Option<Arc<Value>> {
        self.entries.read().get(&id).map(|entry| entry.snapshot.load_full())
    }

    /// Drop every entry and refuse further registrations, returning how
    /// many entries were removed.
    pub(crate) fn close(&self) -> usize {
        let drained: Vec<_> = {
            let mut entries = self.entries.write();
            self.closed.store(true, Ordering::Release);
            entries.drain().collect()
        };
        for (_, entry) in &drained {
            entry.deactivate();
        }
        drained.len()
    }

    /// Run one poll pass over every entry.
    ///
    /// Each changed entry gets a fresh snapshot before its callback runs.
    /// A failing callback is logged and counted; the pass continues with
    /// the remaining entries.
    pub(crate) fn poll(&self) -> TickReport {
        let _pass = self.pass.lock();
        let entries: Vec<Arc<WatchEntry>> = self.entries.read().values().cloned().collect();

        let mut report = TickReport::default();
        let mut dead = Vec::new();

        for entry in entries {
            if !entry.is_active() {
                continue;
            }
            let Some(subject) = entry.subject.upgrade() else {
                dead.push(entry);
                continue;
            };
            report.checked += 1;

            match self.refresh(&entry, &subject) {
                Ok(false) => {}
                Ok(true) => {
                    report.changed += 1;
                    // an earlier callback in this tick may have unwatched it
                    if !entry.is_active() {
                        continue;
                    }
                    if let Err(err) = invoke(&entry.callback, &subject) {
                        report.failed += 1;
                        tracing::warn!(subject = ?entry.id, error = %err, "change callback failed");
                    }
                }
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(subject = ?entry.id, error = %err, "skipping watched value");
                }
            }
        }

        if !dead.is_empty() {
            let mut entries = self.entries.write();
            for entry in dead {
                let current = entries.get(&entry.id).is_some_and(|e| Arc::ptr_eq(e, &entry));
                if current {
                    entries.remove(&entry.id);
                    report.pruned += 1;
                    tracing::debug!(subject = ?entry.id, "pruned watch on dropped subject");
                }
            }
        }

        report
    }

    /// Compare the subject with its snapshot and refresh the snapshot on change.
    fn refresh(&self, entry: &WatchEntry, subject: &Subject) -> Result<bool> {
        let value = subject.read();
        let snapshot = entry.snapshot.load();
        if try_deep_equal(&value, &snapshot, self.equality, self.max_depth)? {
            return Ok(false);
        }
        let fresh = deep_clone(&value, self.max_depth)?;
        drop(value);
        entry.snapshot.store(Arc::new(fresh));
        Ok(true)
    }
}

fn invoke(callback: &Callback, subject: &Subject) -> std::result::Result<(), CallbackError> {
    match panic::catch_unwind(AssertUnwindSafe(|| callback(subject))) {
        Ok(result) => result,
        Err(payload) => Err(CallbackError::from_panic(payload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DEFAULT_MAX_DEPTH;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn registry() -> WatchRegistry {
        WatchRegistry::new(Equality::Strict, DEFAULT_MAX_DEPTH)
    }

    fn counting(counter: &Arc<AtomicUsize>) -> Callback {
        let counter = Arc::clone(counter);
        Arc::new(move |_subject: &Subject| -> std::result::Result<(), CallbackError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_register_rejects_scalar_root() {
        let registry = registry();
        let subject = Subject::new(42);
        let counter = Arc::new(AtomicUsize::new(0));

        let err = registry.register(&subject, counting(&counter)).unwrap_err();
        assert!(matches!(err, WatchError::InvalidArgument(_)));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_register_rejects_too_deep_value() {
        let registry = WatchRegistry::new(Equality::Strict, 2);
        let subject = Subject::new(json!({ "a": { "b": { "c": 1 } } }));
        let counter = Arc::new(AtomicUsize::new(0));

        let err = registry.register(&subject, counting(&counter)).unwrap_err();
        assert!(matches!(err, WatchError::UnsupportedValue { max_depth: 2 }));
    }

    #[test]
    fn test_poll_detects_change_once() {
        let registry = registry();
        let subject = Subject::new(json!({ "a": 1 }));
        let counter = Arc::new(AtomicUsize::new(0));
        registry.register(&subject, counting(&counter)).unwrap();

        assert_eq!(registry.poll().changed, 0);

        subject.update(|v| v.insert("a", 2));
        let report = registry.poll();
        assert_eq!(report, TickReport { checked: 1, changed: 1, failed: 0, pruned: 0 });
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        assert_eq!(registry.poll().changed, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_snapshot_refreshed_on_change() {
        let registry = registry();
        let subject = Subject::new(json!({ "a": 1 }));
        let counter = Arc::new(AtomicUsize::new(0));
        registry.register(&subject, counting(&counter)).unwrap();

        subject.update(|v| v.insert("a", 5));
        registry.poll();

        let snapshot = registry.snapshot(subject.id()).unwrap();
        assert_eq!(*snapshot, Value::from(json!({ "a": 5 })));
    }

    #[test]
    fn test_dropped_subject_is_pruned() {
        let registry = registry();
        let subject = Subject::new(json!({ "a": 1 }));
        let counter = Arc::new(AtomicUsize::new(0));
        registry.register(&subject, counting(&counter)).unwrap();

        drop(subject);
        let report = registry.poll();

        assert_eq!(report.pruned, 1);
        assert_eq!(report.checked, 0);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_callback_can_unwatch_itself() {
        let registry = Arc::new(registry());
        let subject = Subject::new(json!({ "a": 1 }));
        let calls = Arc::new(AtomicUsize::new(0));

        let weak = Arc::downgrade(&registry);
        let calls_clone = Arc::clone(&calls);
        let callback: Callback = Arc::new(move |subject: &Subject| -> std::result::Result<(), CallbackError> {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            if let Some(registry) = weak.upgrade() {
                registry.remove(subject.id());
            }
            Ok(())
        });
        registry.register(&subject, callback).unwrap();

        subject.update(|v| v.insert("a", 2));
        registry.poll();
        subject.update(|v| v.insert("a", 3));
        registry.poll();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!registry.contains(subject.id()));
    }

    #[test]
    fn test_unwatch_during_tick_suppresses_later_entry() {
        let registry = Arc::new(registry());
        let first = Subject::new(json!({ "n": 1 }));
        let second = Subject::new(json!({ "n": 1 }));
        let fired = Arc::new(AtomicUsize::new(0));

        // whichever entry runs first unwatches the other
        let make = |other: SubjectId| -> Callback {
            let weak = Arc::downgrade(&registry);
            let fired = Arc::clone(&fired);
            Arc::new(move |_: &Subject| -> std::result::Result<(), CallbackError> {
                fired.fetch_add(1, Ordering::SeqCst);
                if let Some(registry) = weak.upgrade() {
                    registry.remove(other);
                }
                Ok(())
            })
        };
        registry.register(&first, make(second.id())).unwrap();
        registry.register(&second, make(first.id())).unwrap();

        first.update(|v| v.insert("n", 2));
        second.update(|v| v.insert("n", 2));
        registry.poll();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_close_rejects_later_registrations() {
        let registry = registry();
        let counter = Arc::new(AtomicUsize::new(0));
        let a = Subject::new(json!({}));
        let b = Subject::new(json!([]));
        registry.register(&a, counting(&counter)).unwrap();
        registry.register(&b, counting(&counter)).unwrap();

        assert_eq!(registry.close(), 2);
        assert_eq!(registry.len(), 0);

        let err = registry.register(&a, counting(&counter)).unwrap_err();
        assert!(matches!(err, WatchError::Disposed));
        assert_eq!(registry.len(), 0);
    }
}
