//! Core watching types.

mod builder;
mod registry;
mod subject;
mod watcher;

pub use builder::WatcherBuilder;
pub use registry::TickReport;
pub use subject::{Subject, SubjectId};
pub use watcher::{WeakWatcher, Watcher};
