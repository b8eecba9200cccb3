//! Deep equality with strict or loose scalar comparison.

use crate::error::Result;
use crate::value::Value;
use crate::value::clone::enter;
use serde::{Deserialize, Serialize};

/// How scalar leaves are compared.
///
/// `Strict` is the default. `Loose` opts into coercive comparison, under
/// which a value changing from `1` to `"1"` is not reported as a change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Equality {
    /// Same kind and same value. `Int` and `Float` are both numbers and
    /// compare by numeric value.
    #[default]
    Strict,

    /// Coercive comparison:
    /// - a number and a string compare as numbers (`0 == "0"`, `"" == 0`,
    ///   `255 == "0xff"`); `"inf"` and `"NaN"` are not numbers
    /// - booleans compare as `0`/`1` against numbers and strings
    /// - `Null` equals only `Null` or a missing key
    /// - two strings compare as strings
    Loose,
}

/// Compare two values recursively.
///
/// Maps are compared over the union of their keys and lists over the union
/// of their indices; a missing entry equals only another missing entry (or
/// `Null` under [`Equality::Loose`]). A map never equals a list. Opaque
/// leaves are equal only when they reference the same object. Two NaN
/// leaves are equal, so the relation stays reflexive.
///
/// The comparison is unbounded in depth; see [`try_deep_equal`] for the
/// depth-checked variant the watcher uses.
///
/// # Examples
///
/// ```rust
/// use deepwatch::value::{Equality, Value, deep_equal};
/// use serde_json::json;
///
/// let a = Value::from(json!({ "port": 8080 }));
/// let b = Value::from(json!({ "port": "8080" }));
///
/// assert!(!deep_equal(&a, &b, Equality::Strict));
/// assert!(deep_equal(&a, &b, Equality::Loose));
/// ```
pub fn deep_equal(a: &Value, b: &Value, mode: Equality) -> bool {
    // usize::MAX cannot be passed by a finite tree
    values_equal(a, b, mode, 0, usize::MAX).unwrap_or(false)
}

/// Compare two values recursively, failing on nesting deeper than `max_depth`.
///
/// # Errors
///
/// Returns `WatchError::UnsupportedValue` when either side has a container
/// deeper than `max_depth` along a path that is visited before a mismatch.
pub fn try_deep_equal(a: &Value, b: &Value, mode: Equality, max_depth: usize) -> Result<bool> {
    values_equal(a, b, mode, 0, max_depth)
}

fn values_equal(a: &Value, b: &Value, mode: Equality, depth: usize, max_depth: usize) -> Result<bool> {
    match (a, b) {
        (Value::Map(x), Value::Map(y)) => {
            let depth = enter(depth, max_depth)?;
            for (key, left) in x {
                if !entries_equal(Some(left), y.get(key), mode, depth, max_depth)? {
                    return Ok(false);
                }
            }
            for (key, right) in y {
                if !x.contains_key(key) && !entries_equal(None, Some(right), mode, depth, max_depth)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Value::List(x), Value::List(y)) => {
            let depth = enter(depth, max_depth)?;
            for index in 0..x.len().max(y.len()) {
                if !entries_equal(x.get(index), y.get(index), mode, depth, max_depth)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Value::Opaque(x), Value::Opaque(y)) => Ok(x.ptr_eq(y)),
        (Value::Map(_) | Value::List(_) | Value::Opaque(_), _)
        | (_, Value::Map(_) | Value::List(_) | Value::Opaque(_)) => Ok(false),
        _ => Ok(match mode {
            Equality::Strict => strict_scalar_eq(a, b),
            Equality::Loose => loose_scalar_eq(a, b),
        }),
    }
}

fn entries_equal(
    a: Option<&Value>,
    b: Option<&Value>,
    mode: Equality,
    depth: usize,
    max_depth: usize,
) -> Result<bool> {
    match (a, b) {
        (Some(a), Some(b)) => values_equal(a, b, mode, depth, max_depth),
        (None, None) => Ok(true),
        (Some(present), None) | (None, Some(present)) => {
            Ok(mode == Equality::Loose && present.is_null())
        }
    }
}

fn strict_scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        _ => numbers_eq(a, b).unwrap_or(false),
    }
}

fn loose_scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        _ => match numbers_eq(a, b) {
            Some(eq) => eq,
            None => match (coerce_number(a), coerce_number(b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        },
    }
}

/// Numeric comparison when both sides are `Int` or `Float`.
fn numbers_eq(a: &Value, b: &Value) -> Option<bool> {
    let eq = match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => int_eq_float(*i, *f),
        (Value::Float(x), Value::Float(y)) => x == y || (x.is_nan() && y.is_nan()),
        _ => return None,
    };
    Some(eq)
}

fn int_eq_float(i: i64, f: f64) -> bool {
    // 2^63 is exactly representable; anything at or above it overflows i64
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f) && f as i64 == i
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::String(s) => Some(parse_number(s)),
        _ => None,
    }
}

/// Numeric reading of a string under loose comparison.
///
/// Accepts decimal and exponent notation, `0x`/`0o`/`0b` prefixed integers
/// and `Infinity` with an optional sign. Blank strings read as `0`. Anything
/// else, including `inf` and `NaN` spelled out, reads as NaN and equals
/// nothing.
fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    match trimmed {
        "" => return 0.0,
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    let radix = match trimmed.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &trimmed[2..];
        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return f64::NAN;
        }
        return u128::from_str_radix(digits, radix).map_or(f64::INFINITY, |n| n as f64);
    }

    let decimal = trimmed
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'));
    if !decimal {
        return f64::NAN;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}
