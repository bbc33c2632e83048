//! Value ordering and classification
//!
//! Documents are plain `serde_json::Value`s. Sorting a cursor needs a total
//! order across types, which JSON does not define, so this module fixes one:
//!
//! | Rank | Type |
//! |------|------|
//! | 0 | null (and missing fields) |
//! | 1 | numbers (integers and floats compare numerically) |
//! | 2 | strings |
//! | 3 | objects |
//! | 4 | arrays |
//! | 5 | booleans |
//!
//! ## Equality vs ordering
//!
//! Ordering treats `1` and `1.0` as equal so mixed-type numeric keys sort
//! sensibly. Equality (`PartialEq` on `Value`) does not: `1 != 1.0`, which is
//! exactly the representational drift the normalization rules exist for.

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

/// Rank of a value's type in the canonical sort order
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Human-readable type name used in diagnostics
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "double",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Ordering {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x.cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x.cmp(&y);
    }
    let x = a.as_f64().unwrap_or(f64::NAN);
    let y = b.as_f64().unwrap_or(f64::NAN);
    x.total_cmp(&y)
}

fn compare_objects(a: &Map<String, Value>, b: &Map<String, Value>) -> Ordering {
    for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
        let ord = ka.cmp(kb).then_with(|| compare_values(va, vb));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

/// Total order over JSON values
///
/// Values of different types order by type rank; values of the same
/// type order naturally, with objects and arrays compared element by element
/// and the shorter one first on a common prefix.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (va, vb) in x.iter().zip(y.iter()) {
                let ord = compare_values(va, vb);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => compare_objects(x, y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Compare two optional field values; a missing field sorts like null.
pub fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    compare_values(a.unwrap_or(&Value::Null), b.unwrap_or(&Value::Null))
}

/// Whether a value equals its type's default
///
/// Defaults are `null`, `false`, `0`, `0.0`, `""`, `[]` and `{}`.
pub fn is_default_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !*b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
