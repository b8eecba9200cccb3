//! Identity-bearing handles around watched values.

use crate::value::Value;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::{Arc, Weak};

/// Identity of a [`Subject`]: the address of its shared allocation.
///
/// Every clone of a subject has the same id. The id stays unique for as long
/// as any handle, strong or weak, keeps the allocation alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubjectId(usize);

/// A shared, mutable value that can be watched.
///
/// `Subject` is the explicit opt-in wrapper for watched state. Cloning it
/// clones the handle, not the value: all clones observe and mutate the same
/// value and share one [`SubjectId`].
///
/// # Examples
///
/// ```rust
/// use deepwatch::core::Subject;
/// use deepwatch::value::Value;
/// use serde_json::json;
///
/// let subject = Subject::new(json!({ "port": 8080 }));
/// let alias = subject.clone();
///
/// alias.update(|value| value.insert("port", 9090));
///
/// assert_eq!(subject.id(), alias.id());
/// assert_eq!(subject.read().get("port"), Some(&Value::Int(9090)));
/// ```
#[derive(Clone)]
pub struct Subject {
    inner: Arc<RwLock<Value>>,
}

impl Subject {
    /// Create a subject holding `value`.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value.into())),
        }
    }

    /// Identity of this subject.
    pub fn id(&self) -> SubjectId {
        SubjectId(Arc::as_ptr(&self.inner) as usize)
    }

    /// Whether both handles refer to the same subject.
    pub fn ptr_eq(&self, other: &Subject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Borrow the current value for reading.
    ///
    /// Do not hold the guard across a poll tick on the same thread; the
    /// poller takes a read lock on every watched subject.
    pub fn read(&self) -> RwLockReadGuard<'_, Value> {
        self.inner.read()
    }

    /// Borrow the current value for writing.
    ///
    /// The poller blocks on this subject until the guard is dropped. Never
    /// hold it across an `.await`; on a current-thread runtime the poller
    /// then waits on a lock that can only be released by the task it blocks.
    pub fn write(&self) -> RwLockWriteGuard<'_, Value> {
        self.inner.write()
    }

    /// Clone of the current value.
    pub fn get(&self) -> Value {
        self.inner.read().clone()
    }

    /// Replace the value, returning the previous one.
    ///
    /// Must not be called from a thread that holds a guard from
    /// [`read`](Subject::read) or [`write`](Subject::write) on this subject.
    pub fn set(&self, value: impl Into<Value>) -> Value {
        std::mem::replace(&mut *self.inner.write(), value.into())
    }

    /// Mutate the value in place under the write lock.
    ///
    /// The lock is held for the duration of `f`, so `f` must not read this
    /// subject or block on work that waits for a poll tick.
    pub fn update<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        f(&mut self.inner.write())
    }

    pub(crate) fn downgrade(&self) -> WeakSubject {
        WeakSubject {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Subject");
        s.field("id", &self.id());
        match self.inner.try_read() {
            Some(value) => s.field("value", &*value),
            None => s.field("value", &"<locked>"),
        };
        s.finish()
    }
}

impl Default for Subject {
    fn default() -> Self {
        Self::new(Value::map())
    }
}

/// Non-owning reference held by a watch entry.
pub(crate) struct WeakSubject {
    inner: Weak<RwLock<Value>>,
}

impl WeakSubject {
    pub(crate) fn upgrade(&self) -> Option<Subject> {
        self.inner.upgrade().map(|inner| Subject { inner })
    }
}
