//! Typed scalars for comparing filter values against record values.
//!
//! Filter values arrive as untyped JSON. Before a comparison they are
//! coerced to the type of the field (or of the transformed field) they are
//! compared with: numeric strings become numbers, ISO-8601 strings become
//! dates, and so on.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::field::FieldType;

/// Numeric value preserving integer precision.
///
/// Comparisons between variants go through `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Signed integer.
    I64(i64),
    /// Unsigned integer too large for `i64`.
    U64(u64),
    /// Floating point.
    F64(f64),
}

impl Number {
    /// Converts to `f64`, losing precision for large integers.
    pub fn to_f64(self) -> f64 {
        match self {
            Number::I64(n) => n as f64,
            Number::U64(n) => n as f64,
            Number::F64(n) => n,
        }
    }

    /// Compares two numbers, handling mixed types.
    pub fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::I64(a), Number::I64(b)) => Some(a.cmp(&b)),
            (Number::U64(a), Number::U64(b)) => Some(a.cmp(&b)),
            (Number::F64(a), Number::F64(b)) => a.partial_cmp(&b),
            (Number::I64(a), Number::U64(b)) => Some(compare_signed(a, b)),
            (Number::U64(a), Number::I64(b)) => Some(compare_signed(b, a).reverse()),
            _ => self.to_f64().partial_cmp(&other.to_f64()),
        }
    }

    /// Reads a JSON number or a numeric string.
    pub fn from_json(value: &Value) -> Option<Number> {
        match value {
            Value::Number(n) => Number::from_json_number(n),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Reads a whole number: a JSON integer, a finite float with no
    /// fractional part, or a string of digits.
    ///
    /// `"1e3"`, `"NaN"`, `"inf"` and `1.5` are rejected.
    pub fn integer_from_json(value: &Value) -> Option<Number> {
        match value {
            Value::Number(n) => Number::from_json_number(n).filter(|n| n.is_integral()),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Number::I64)
                    .or_else(|_| s.parse::<u64>().map(Number::U64))
                    .ok()
            }
            _ => None,
        }
    }

    /// Returns `true` for integers and finite floats without a fraction.
    pub fn is_integral(self) -> bool {
        match self {
            Number::I64(_) | Number::U64(_) => true,
            Number::F64(n) => n.is_finite() && n.fract() == 0.0,
        }
    }

    fn from_json_number(n: &serde_json::Number) -> Option<Number> {
        if let Some(i) = n.as_i64() {
            Some(Number::I64(i))
        } else if let Some(u) = n.as_u64() {
            Some(Number::U64(u))
        } else {
            n.as_f64().map(Number::F64)
        }
    }
}

fn compare_signed(a: i64, b: u64) -> Ordering {
    match u64::try_from(a) {
        Ok(a) => a.cmp(&b),
        Err(_) => Ordering::Less,
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(*other)
    }
}

impl std::str::FromStr for Number {
    type Err = std::num::ParseFloatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(i) = s.parse::<i64>() {
            return Ok(Number::I64(i));
        }
        if let Ok(u) = s.parse::<u64>() {
            return Ok(Number::U64(u));
        }
        s.parse::<f64>().map(Number::F64)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::I64(n) => write!(f, "{n}"),
            Number::U64(n) => write!(f, "{n}"),
            Number::F64(n) => write!(f, "{n}"),
        }
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Number::I64(n)
    }
}

impl From<u64> for Number {
    fn from(n: u64) -> Self {
        Number::U64(n)
    }
}

impl From<f64> for Number {
    fn from(n: f64) -> Self {
        Number::F64(n)
    }
}

/// Parses an ISO-8601 date (`2020-01-31`).
///
/// Date-time strings are accepted too and truncated to their date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(s).map(|dt| dt.date()))
}

/// Parses an ISO-8601 date-time.
///
/// Offsets are normalised to UTC. A bare date means midnight.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// A typed comparison operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Null or missing value.
    Null,
    /// Text value.
    Text(String),
    /// Numeric value, also used for primary keys.
    Number(Number),
    /// Boolean value.
    Bool(bool),
    /// Calendar date.
    Date(NaiveDate),
    /// Date and time, normalised to UTC.
    DateTime(NaiveDateTime),
}

impl Scalar {
    /// Coerces a JSON value to the scalar form of `field_type`.
    ///
    /// Integers and relations (by primary key) take whole numbers only.
    /// `null` coerces to [`Scalar::Null`] for every type. Returns `None` for
    /// values that cannot represent the type, such as lists or unparseable
    /// strings.
    pub fn coerce(value: &Value, field_type: FieldType) -> Option<Scalar> {
        if value.is_null() {
            return Some(Scalar::Null);
        }
        match field_type {
            FieldType::Text => match value {
                Value::String(s) => Some(Scalar::Text(s.clone())),
                Value::Number(n) => Some(Scalar::Text(n.to_string())),
                _ => None,
            },
            FieldType::Integer | FieldType::Relation => {
                Number::integer_from_json(value).map(Scalar::Number)
            }
            FieldType::Boolean => match value {
                Value::Bool(b) => Some(Scalar::Bool(*b)),
                Value::String(s) => match s.as_str() {
                    "true" | "True" => Some(Scalar::Bool(true)),
                    "false" | "False" => Some(Scalar::Bool(false)),
                    _ => None,
                },
                _ => None,
            },
            FieldType::Date => value.as_str().and_then(parse_date).map(Scalar::Date),
            FieldType::DateTime => value.as_str().and_then(parse_datetime).map(Scalar::DateTime),
        }
    }

    /// The field type this scalar coerces against, or `None` for null.
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            Scalar::Null => None,
            Scalar::Text(_) => Some(FieldType::Text),
            Scalar::Number(_) => Some(FieldType::Integer),
            Scalar::Bool(_) => Some(FieldType::Boolean),
            Scalar::Date(_) => Some(FieldType::Date),
            Scalar::DateTime(_) => Some(FieldType::DateTime),
        }
    }

    /// Returns `true` for [`Scalar::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Returns the text, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The date part of a date or date-time, parsing text if needed.
    pub fn to_date(&self) -> Option<NaiveDate> {
        match self {
            Scalar::Date(d) => Some(*d),
            Scalar::DateTime(dt) => Some(dt.date()),
            Scalar::Text(s) => parse_date(s),
            _ => None,
        }
    }

    /// The value as a date-time, parsing text if needed.
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Scalar::DateTime(dt) => Some(*dt),
            Scalar::Date(d) => d.and_hms_opt(0, 0, 0),
            Scalar::Text(s) => parse_datetime(s),
            _ => None,
        }
    }

    /// Orders two scalars of the same kind. Nulls and mixed kinds are
    /// unordered.
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
            (Scalar::Number(a), Scalar::Number(b)) => a.compare(*b),
            (Scalar::Bool(a), Scalar::Bool(b)) => Some(a.cmp(b)),
            (Scalar::Date(a), Scalar::Date(b)) => Some(a.cmp(b)),
            (Scalar::DateTime(a), Scalar::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Text(s) => write!(f, "{s:?}"),
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Date(d) => write!(f, "{d}"),
            Scalar::DateTime(dt) => write!(f, "{dt}"),
        }
    }
}
