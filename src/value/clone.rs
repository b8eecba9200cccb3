//! Depth-checked deep clone.

use crate::error::{Result, WatchError};
use crate::value::{Map, Value};

/// Default nesting limit for clone and comparison.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Produce a structurally independent copy of `value`.
///
/// Maps and lists are rebuilt recursively, scalars are copied, and
/// [`Opaque`](crate::value::Opaque) leaves are copied by reference. The
/// result is deeply equal to the input and shares no container with it.
///
/// Nesting depth counts containers along a path: a flat map has depth 1,
/// a scalar depth 0.
///
/// # Errors
///
/// Returns `WatchError::UnsupportedValue` when a container sits deeper than
/// `max_depth`, before any stack exhaustion can happen.
///
/// # Examples
///
/// ```rust
/// use deepwatch::value::{Value, deep_clone};
/// use serde_json::json;
///
/// let original = Value::from(json!({ "a": { "b": 1 } }));
/// let mut copy = deep_clone(&original, 8).unwrap();
/// if let Some(b) = copy.pointer_mut("/a/b") {
///     *b = Value::from(2);
/// }
///
/// assert_eq!(original.pointer("/a/b"), Some(&Value::Int(1)));
/// assert!(deep_clone(&original, 1).is_err());
/// ```
pub fn deep_clone(value: &Value, max_depth: usize) -> Result<Value> {
    clone_at(value, 0, max_depth)
}

fn clone_at(value: &Value, depth: usize, max_depth: usize) -> Result<Value> {
    match value {
        Value::List(items) => {
            let depth = enter(depth, max_depth)?;
            items
                .iter()
                .map(|item| clone_at(item, depth, max_depth))
                .collect::<Result<Vec<_>>>()
                .map(Value::List)
        }
        Value::Map(map) => {
            let depth = enter(depth, max_depth)?;
            map.iter()
                .map(|(key, item)| -> Result<(String, Value)> {
                    Ok((key.clone(), clone_at(item, depth, max_depth)?))
                })
                .collect::<Result<Map>>()
                .map(Value::Map)
        }
        Value::Opaque(object) => Ok(Value::Opaque(object.clone())),
        Value::Null => Ok(Value::Null),
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::String(s) => Ok(Value::String(s.clone())),
    }
}

/// Step into a container, failing once the limit is passed.
pub(crate) fn enter(depth: usize, max_depth: usize) -> Result<usize> {
    let next = depth + 1;
    if next > max_depth {
        return Err(WatchError::UnsupportedValue { max_depth });
    }
    Ok(next)
}
