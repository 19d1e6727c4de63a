//! Dynamic values flowing through records
//!
//! [`Value`] models the loosely-typed input a record accepts and the
//! coerced values it stores. Records and typed sequences are carried as
//! shared handles so that a structural field keeps its identity however
//! many times it is read or rewritten.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::record::Record;
use crate::sequence::TypedSequence;

/// Insertion-ordered string map used for plain objects
pub type Map = IndexMap<String, Value>;

/// Largest integer magnitude that survives a round trip through `f64`
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A loosely-typed value
#[derive(Clone, Default)]
pub enum Value {
    /// No value at all; an unset field reads as this
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<Value>),
    Object(Map),
    /// Live typed sequence owned by a record field
    Sequence(TypedSequence),
    /// Live nested record
    Record(Record),
}

impl Value {
    /// Human readable name of the value's shape
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Sequence(_) => "sequence",
            Value::Record(_) => "record",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// `Undefined` or `Null`
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Objects, arrays, sequences and records
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Value::Array(_) | Value::Object(_) | Value::Sequence(_) | Value::Record(_)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&TypedSequence> {
        match self {
            Value::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Loose truthiness: nullish, `false`, zero, NaN and the empty string are false
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Numeric reading of a value, if it has one.
    ///
    /// Finite numbers and numeric text qualify; booleans, containers and
    /// non-finite numbers do not.
    pub fn numeric(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::String(s) => parse_numeric(s),
            _ => None,
        }
    }

    /// Textual form of a scalar; `None` for nullish and structural values
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(number_to_string(*n)),
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Schema-free deep copy.
    ///
    /// Records are exported, sequences materialized and containers copied,
    /// so nothing in the result aliases live record state.
    pub fn to_plain(&self) -> Value {
        match self {
            Value::Record(record) => record.export(),
            Value::Sequence(seq) => Value::Array(seq.to_plain()),
            Value::Array(items) => Value::Array(items.iter().map(Value::to_plain).collect()),
            Value::Object(map) => Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_plain())).collect(),
            ),
            other => other.clone(),
        }
    }

    /// Key/value pairs of a structural value, materialized up front
    pub(crate) fn entries(&self) -> Option<Vec<(String, Value)>> {
        match self {
            Value::Object(map) => Some(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            Value::Record(record) => match record.export() {
                Value::Object(map) => Some(map.into_iter().collect()),
                _ => None,
            },
            Value::Array(items) => Some(indexed(items.iter().cloned())),
            Value::Sequence(seq) => Some(indexed(seq.values().into_iter())),
            _ => None,
        }
    }

    /// Element values of a structural value, materialized up front
    pub(crate) fn elements(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) => Some(items.clone()),
            Value::Sequence(seq) => Some(seq.values()),
            Value::Object(_) | Value::Record(_) => self
                .entries()
                .map(|entries| entries.into_iter().map(|(_, v)| v).collect()),
            _ => None,
        }
    }

    /// JSON rendering.
    ///
    /// `Undefined` members are left out of objects and become `null` inside
    /// arrays; dates render as RFC 3339 with millisecond precision.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => {
                serde_json::Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .filter(|(_, v)| !v.is_undefined())
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Sequence(seq) => {
                serde_json::Value::Array(seq.to_plain().iter().map(Value::to_json).collect())
            }
            Value::Record(record) => record.to_json(),
        }
    }
}

fn indexed(items: impl Iterator<Item = Value>) -> Vec<(String, Value)> {
    items.enumerate().map(|(i, v)| (i.to_string(), v)).collect()
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Parse numeric text: trimmed decimal/exponent notation or `0x` hex, finite only
pub fn parse_numeric(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok().map(|n| n as f64);
    }

    // f64::from_str also admits "inf" and "nan" spellings
    if !text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return None;
    }

    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Render a number the way loosely-typed hosts do.
///
/// Integral values print without a fraction. Magnitudes from `1e21` up and
/// below `1e-6` switch to exponent form with an explicit sign, e.g. `1e+21`.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string();
    }

    let magnitude = n.abs();
    if magnitude >= 1e21 || (magnitude != 0.0 && magnitude < 1e-6) {
        let text = format!("{:e}", n);
        return match text.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => text,
        };
    }

    if n.fract() == 0.0 {
        format!("{}", n as i128)
    } else {
        format!("{}", n)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a.ptr_eq(b),
            (Value::Record(a), Value::Record(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({})", number_to_string(*n)),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Date(d) => write!(f, "Date({})", d.to_rfc3339()),
            Value::Array(items) => f.debug_list().entries(items).finish(),
            Value::Object(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Sequence(seq) => fmt::Debug::fmt(seq, f),
            Value::Record(record) => fmt::Debug::fmt(record, f),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
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

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_integer!(i32, i64, u32, u64, usize, f32);

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(map)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

impl From<TypedSequence> for Value {
    fn from(seq: TypedSequence) -> Self {
        Value::Sequence(seq)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Object(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
