//! Runtime value type for records flowing through parse and validation.
//!
//! [`Value`] is a closed enum over the JSON-compatible types plus dates.
//! Records use an insertion-ordered map so that field declaration order is
//! preserved end to end, which the engine relies on for deterministic output
//! shapes and error ordering. Conversions to and from [`serde_json::Value`]
//! are provided for adapter layers that exchange JSON request data.

use std::fmt;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Insertion-ordered mapping from field name to value.
pub type Record = IndexMap<String, Value>;

/// Generic runtime value for schema input and output.
///
/// Serializes untagged, so a `Value` looks like plain JSON on the wire
/// (dates become RFC 3339 strings).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent or explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit IEEE 754 floating point.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Point in time, UTC.
    Date(DateTime<Utc>),
    /// Ordered sequence of values.
    Array(Vec<Value>),
    /// Ordered mapping of string keys to values.
    Record(Record),
}

impl Value {
    /// Builds a record value from key/value pairs, preserving order.
    pub fn record<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Record(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns true for `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the record contents, if this value is a record.
    #[must_use]
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(map) => Some(map),
            _ => None,
        }
    }

    /// Returns true for scalar values (everything except arrays and records).
    ///
    /// Scalars are the only values embedded verbatim in validation errors;
    /// structured values are omitted to keep error payloads small.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Array(_) | Value::Record(_))
    }

    /// Loose truthiness: `Null`, `false`, zero, NaN, and the empty string are
    /// falsy; everything else (including empty arrays and records) is truthy.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Date(_) | Value::Array(_) | Value::Record(_) => true,
        }
    }

    /// Length of a string (in chars) or array. Other values have no length.
    #[must_use]
    pub fn length(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(items) => Some(items.len()),
            _ => None,
        }
    }

    /// Ordering between two values of comparable types.
    ///
    /// Integers and floats compare numerically (cross-type included), strings
    /// lexicographically, dates chronologically. Any other pairing, and any
    /// comparison involving NaN, is `None`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compare(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Coerces a value into array form.
///
/// Absent becomes the empty array, an array stays itself, and any other value
/// (explicit null included) becomes a one-element array.
#[must_use]
pub fn to_array(value: Option<&Value>) -> Vec<Value> {
    match value {
        None => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Record(_) => write!(f, "{}", serde_json::Value::from(self.clone())),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Date(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Record(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Float(f) => {
                // NaN and infinities have no JSON representation.
                serde_json::Number::from_f64(f)
                    .map_or(serde_json::Value::Null, serde_json::Value::Number)
            }
            Value::String(s) => serde_json::Value::String(s),
            Value::Date(d) => serde_json::Value::String(d.to_rfc3339()),
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Record(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

/// Primitive type tags available to field declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    /// UTF-8 string.
    String,
    /// Signed 64-bit integer.
    Int,
    /// 64-bit floating point.
    Float,
    /// Boolean.
    Bool,
    /// Point in time, UTC.
    Date,
}

impl PrimitiveKind {
    /// Returns the type name used in messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Date => "date",
        }
    }

    /// Infers the primitive kind of a scalar literal.
    ///
    /// `Null` degenerates to `String`; arrays and records are handled by the
    /// declaration normalizer before inference is consulted.
    #[must_use]
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Bool(_) => PrimitiveKind::Bool,
            Value::Int(_) => PrimitiveKind::Int,
            Value::Float(_) => PrimitiveKind::Float,
            Value::Date(_) => PrimitiveKind::Date,
            _ => PrimitiveKind::String,
        }
    }

    /// Best-effort coercion of a value into this kind.
    ///
    /// Total and panic-free: `Null` passes through untouched and unparseable
    /// input degrades to `Null` rather than failing the parse.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn coerce(self, value: Value) -> Value {
        if value.is_null() {
            return Value::Null;
        }
        match self {
            PrimitiveKind::String => coerce_string(value),
            PrimitiveKind::Int => coerce_int(value),
            PrimitiveKind::Float => coerce_float(value),
            PrimitiveKind::Bool => coerce_bool(value),
            PrimitiveKind::Date => coerce_date(value),
        }
    }
}

fn coerce_string(value: Value) -> Value {
    match value {
        Value::String(_) => value,
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Int(i) => Value::String(i.to_string()),
        Value::Float(f) => Value::String(f.to_string()),
        Value::Date(d) => Value::String(d.to_rfc3339()),
        structured @ (Value::Array(_) | Value::Record(_)) => {
            Value::String(serde_json::Value::from(structured).to_string())
        }
        Value::Null => Value::Null,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn coerce_int(value: Value) -> Value {
    match value {
        Value::Int(_) => value,
        Value::Float(f) if f.is_finite() => Value::Int(f.trunc() as i64),
        Value::Bool(b) => Value::Int(i64::from(b)),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                Value::Int(i)
            } else if let Ok(f) = trimmed.parse::<f64>() {
                if f.is_finite() {
                    Value::Int(f.trunc() as i64)
                } else {
                    Value::Null
                }
            } else {
                Value::Null
            }
        }
        Value::Date(d) => Value::Int(d.timestamp_millis()),
        _ => Value::Null,
    }
}

#[allow(clippy::cast_precision_loss)]
fn coerce_float(value: Value) -> Value {
    match value {
        Value::Float(_) => value,
        Value::Int(i) => Value::Float(i as f64),
        Value::Bool(b) => Value::Float(if b { 1.0 } else { 0.0 }),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_or(Value::Null, Value::Float),
        Value::Date(d) => Value::Float(d.timestamp_millis() as f64),
        _ => Value::Null,
    }
}

fn coerce_bool(value: Value) -> Value {
    match value {
        Value::Bool(_) => value,
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::Bool(!s.is_empty()),
        },
        other => Value::Bool(other.truthy()),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn coerce_date(value: Value) -> Value {
    match value {
        Value::Date(_) => value,
        Value::String(s) => parse_date(s.trim()).map_or(Value::Null, Value::Date),
        Value::Int(ms) => millis_to_date(ms).map_or(Value::Null, Value::Date),
        Value::Float(f) if f.is_finite() => {
            millis_to_date(f.trunc() as i64).map_or(Value::Null, Value::Date)
        }
        _ => Value::Null,
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn millis_to_date(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}
