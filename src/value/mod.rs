//! Structured values, deep clone and deep equality.

mod clone;
mod equality;
mod model;

pub use clone::{DEFAULT_MAX_DEPTH, deep_clone};
pub use equality::{Equality, deep_equal, try_deep_equal};
pub use model::{Map, Opaque, Value};
