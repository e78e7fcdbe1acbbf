//! # Value Type System
//!
//! Dynamically typed cell values for rows and arc labels: `String`, `Int64`,
//! `Float64`, `Bool` and `Missing`. Arc labels are `Value`s with a total
//! order so that node edge maps iterate deterministically; numeric columns
//! are replaced by interval-string labels before compilation, so `Float64`
//! never appears on an arc of a compiled diagram.
//!
//! ## Usage
//!
//! ```rust
//! use tabledd::value::{Pattern, Value};
//!
//! let pattern = Pattern::new()
//!     .with("region", "EU")
//!     .with("priority", 2);
//!
//! assert_eq!(pattern.get("region"), Some(&Value::from("EU")));
//! assert!(pattern.get("product").is_none()); // wildcard
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Display form of [`Value::Missing`].
pub const MISSING_DISPLAY: &str = "__MISSING__";

/// A dynamically typed cell value.
///
/// Equality and hashing are defined per variant; `Float64` uses the IEEE
/// bit pattern (`f64::total_cmp`), so every value behaves as an opaque,
/// hashable, orderable token. Cross-variant order is by tag:
/// Missing < Bool < Int64 < Float64 < String.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Int64(i64),
    Float64(f64),
    Bool(bool),
    Missing,
}

impl Value {
    /// Convenience constructor for string values.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(i) => Some(*i as f64),
            Value::Float64(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Variant name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Int64(_) => "int64",
            Value::Float64(_) => "float64",
            Value::Bool(_) => "bool",
            Value::Missing => "missing",
        }
    }

    /// Display form truncated to `max` characters, for error messages.
    pub(crate) fn truncated(&self, max: usize) -> String {
        let full = self.to_string();
        if full.chars().count() <= max {
            full
        } else {
            let mut out: String = full.chars().take(max).collect();
            out.push_str("...");
            out
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Value::Missing => 0,
            Value::Bool(_) => 1,
            Value::Int64(_) => 2,
            Value::Float64(_) => 3,
            Value::String(_) => 4,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Missing, Value::Missing) => true,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.tag());
        match self {
            Value::String(s) => s.hash(state),
            Value::Int64(i) => i.hash(state),
            Value::Float64(x) => x.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Missing => {}
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            (Value::Float64(a), Value::Float64(b)) => a.total_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            _ => self.tag().cmp(&other.tag()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Int64(i) => write!(f, "{i}"),
            Value::Float64(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Missing => write!(f, "{MISSING_DISPLAY}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int64(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float64(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// An input row: dimension name to value. Keys outside the schema are
/// ignored; schema dimensions absent from the map read as missing.
pub type Row = HashMap<String, Value>;

/// A partial row specification used by every query: dimension name to the
/// wanted value. Dimensions absent from the pattern are wildcards.
///
/// Wildcards never match the missing token implicitly; to match rows with a
/// missing value in some dimension, bind that dimension to
/// [`Value::Missing`] explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    bindings: BTreeMap<String, Value>,
}

impl Pattern {
    pub fn new() -> Self {
        Pattern::default()
    }

    /// Bind a dimension to a wanted value.
    pub fn with(mut self, dimension: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bindings.insert(dimension.into(), value.into());
        self
    }

    pub fn set(&mut self, dimension: impl Into<String>, value: impl Into<Value>) {
        self.bindings.insert(dimension.into(), value.into());
    }

    pub fn get(&self, dimension: &str) -> Option<&Value> {
        self.bindings.get(dimension)
    }

    pub fn contains(&self, dimension: &str) -> bool {
        self.bindings.contains_key(dimension)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Bound dimensions in name order.
    pub fn dimensions(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Value)> for Pattern {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Pattern {
            bindings: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_value_equality_per_variant() {
        assert_eq!(Value::from("a"), Value::from("a"));
        assert_ne!(Value::from("a"), Value::from("b"));
        assert_eq!(Value::from(3i64), Value::from(3i64));
        assert_ne!(Value::from(3i64), Value::from(3.0));
        assert_eq!(Value::Missing, Value::Missing);
    }

    #[test]
    fn test_float_hash_and_eq_by_bits() {
        let mut set = HashSet::new();
        set.insert(Value::from(1.5));
        set.insert(Value::from(1.5));
        set.insert(Value::from(f64::NAN));
        set.insert(Value::from(f64::NAN));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_total_order_across_variants() {
        let mut values = vec![
            Value::from("z"),
            Value::from(2.5),
            Value::from(7i64),
            Value::from(true),
            Value::Missing,
        ];
        values.sort();
        assert_eq!(values[0], Value::Missing);
        assert_eq!(values[4], Value::from("z"));
    }

    #[test]
    fn test_int_order_is_numeric() {
        let mut values = vec![Value::from(10i64), Value::from(2i64)];
        values.sort();
        assert_eq!(values, vec![Value::from(2i64), Value::from(10i64)]);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("EU").to_string(), "EU");
        assert_eq!(Value::from(2i64).to_string(), "2");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::Missing.to_string(), "__MISSING__");
    }

    #[test]
    fn test_truncated_display() {
        let long = Value::string("x".repeat(100));
        assert_eq!(long.truncated(8), format!("{}...", "x".repeat(8)));
        assert_eq!(Value::from("short").truncated(8), "short");
    }

    #[test]
    fn test_pattern_builder() {
        let pattern = Pattern::new().with("region", "EU").with("priority", 1);
        assert_eq!(pattern.len(), 2);
        assert!(pattern.contains("region"));
        assert_eq!(pattern.get("priority"), Some(&Value::from(1)));
        assert!(!pattern.contains("product"));
        let dims: Vec<&str> = pattern.dimensions().collect();
        assert_eq!(dims, vec!["priority", "region"]);
    }

    #[test]
    fn test_value_serde_round_trip() {
        let v = Value::from(2.5);
        let json = serde_json::to_string(&v).expect("serialize");
        let back: Value = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(v, back);
    }
}
