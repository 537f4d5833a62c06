//! Record access for in-memory evaluation.
//!
//! A [`Record`] hands out field values by name. Relations are returned as
//! borrowed records, so a predicate over `publisher.name` can walk from a
//! book to its publisher without copying anything.
//!
//! Implement [`Record`] by hand, derive it with `#[derive(Model)]`, or use
//! JSON objects directly:
//!
//! ```
//! use qfilter::{Record, RecordValue};
//! use serde_json::json;
//!
//! let book = json!({"id": 1, "title": "Dune", "publisher": {"id": 7, "name": "Chilton"}});
//!
//! assert!(matches!(book.field("title"), RecordValue::Text("Dune")));
//! assert_eq!(book.pk(), Some(1));
//! let RecordValue::One(Some(publisher)) = book.field("publisher") else { panic!() };
//! assert_eq!(publisher.pk(), Some(7));
//! ```

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use serde_json::Value;

use crate::value::{Number, Scalar};

/// A field value borrowed from a record.
#[derive(Clone)]
pub enum RecordValue<'a> {
    /// The field exists and is empty.
    Null,
    /// The record has no such field.
    Missing,
    /// Text value (borrowed).
    Text(&'a str),
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Boolean value.
    Bool(bool),
    /// Calendar date.
    Date(NaiveDate),
    /// Date and time, in UTC.
    DateTime(NaiveDateTime),
    /// A to-one relation; `None` when unset.
    One(Option<&'a dyn Record>),
    /// A to-many relation.
    Many(Vec<&'a dyn Record>),
}

impl<'a> RecordValue<'a> {
    /// Returns `true` for `Null` and `Missing`.
    pub fn is_null(&self) -> bool {
        matches!(self, RecordValue::Null | RecordValue::Missing)
    }

    /// Returns `true` for to-one and to-many relations.
    pub fn is_relation(&self) -> bool {
        matches!(self, RecordValue::One(_) | RecordValue::Many(_))
    }

    /// Returns the text, if this is a text value.
    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            RecordValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer, if this is an integer value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RecordValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Converts a non-relation value to a comparison scalar.
    ///
    /// Relations have no scalar form and return `None`.
    pub fn to_scalar(&self) -> Option<Scalar> {
        let scalar = match self {
            RecordValue::Null | RecordValue::Missing => Scalar::Null,
            RecordValue::Text(s) => Scalar::Text((*s).to_string()),
            RecordValue::Integer(n) => Scalar::Number(Number::I64(*n)),
            RecordValue::Float(n) => Scalar::Number(Number::F64(*n)),
            RecordValue::Bool(b) => Scalar::Bool(*b),
            RecordValue::Date(d) => Scalar::Date(*d),
            RecordValue::DateTime(dt) => Scalar::DateTime(*dt),
            RecordValue::One(_) | RecordValue::Many(_) => return None,
        };
        Some(scalar)
    }
}

impl fmt::Debug for RecordValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordValue::Null => write!(f, "Null"),
            RecordValue::Missing => write!(f, "Missing"),
            RecordValue::Text(s) => f.debug_tuple("Text").field(s).finish(),
            RecordValue::Integer(n) => f.debug_tuple("Integer").field(n).finish(),
            RecordValue::Float(n) => f.debug_tuple("Float").field(n).finish(),
            RecordValue::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            RecordValue::Date(d) => f.debug_tuple("Date").field(d).finish(),
            RecordValue::DateTime(dt) => f.debug_tuple("DateTime").field(dt).finish(),
            RecordValue::One(record) => f
                .debug_tuple("One")
                .field(&record.map(|r| r.pk()))
                .finish(),
            RecordValue::Many(records) => f
                .debug_tuple("Many")
                .field(&records.iter().map(|r| r.pk()).collect::<Vec<_>>())
                .finish(),
        }
    }
}

/// A record that predicates can be evaluated against.
pub trait Record {
    /// Returns the value of field `name`.
    fn field(&self, name: &str) -> RecordValue<'_>;

    /// The record's primary key, compared by relation lookups.
    fn pk(&self) -> Option<i64> {
        None
    }
}

impl<R: Record + ?Sized> Record for &R {
    fn field(&self, name: &str) -> RecordValue<'_> {
        (**self).field(name)
    }

    fn pk(&self) -> Option<i64> {
        (**self).pk()
    }
}

impl<R: Record + ?Sized> Record for Box<R> {
    fn field(&self, name: &str) -> RecordValue<'_> {
        (**self).field(name)
    }

    fn pk(&self) -> Option<i64> {
        (**self).pk()
    }
}

impl<R: Record + ?Sized> Record for Rc<R> {
    fn field(&self, name: &str) -> RecordValue<'_> {
        (**self).field(name)
    }

    fn pk(&self) -> Option<i64> {
        (**self).pk()
    }
}

impl<R: Record + ?Sized> Record for Arc<R> {
    fn field(&self, name: &str) -> RecordValue<'_> {
        (**self).field(name)
    }

    fn pk(&self) -> Option<i64> {
        (**self).pk()
    }
}

/// JSON objects are records: nested objects are to-one relations, arrays
/// of objects are to-many relations, and `id` (or `pk`) is the primary key.
impl Record for Value {
    fn field(&self, name: &str) -> RecordValue<'_> {
        match self.get(name) {
            Some(value) => json_record_value(value),
            None => RecordValue::Missing,
        }
    }

    fn pk(&self) -> Option<i64> {
        self.get("id")
            .or_else(|| self.get("pk"))
            .and_then(Value::as_i64)
    }
}

fn json_record_value(value: &Value) -> RecordValue<'_> {
    match value {
        Value::Null => RecordValue::Null,
        Value::Bool(b) => RecordValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => RecordValue::Integer(i),
            None => n.as_f64().map_or(RecordValue::Missing, RecordValue::Float),
        },
        Value::String(s) => RecordValue::Text(s),
        Value::Object(_) => RecordValue::One(Some(value as &dyn Record)),
        Value::Array(items) if items.iter().all(Value::is_object) => {
            RecordValue::Many(items.iter().map(|item| item as &dyn Record).collect())
        }
        Value::Array(_) => RecordValue::Missing,
    }
}

/// Conversion of a plain field to a [`RecordValue`].
///
/// Used by `#[derive(Model)]` for non-relation fields.
pub trait ToRecordValue {
    /// Borrows the value as a [`RecordValue`].
    fn to_record_value(&self) -> RecordValue<'_>;
}

impl ToRecordValue for str {
    fn to_record_value(&self) -> RecordValue<'_> {
        RecordValue::Text(self)
    }
}

impl ToRecordValue for String {
    fn to_record_value(&self) -> RecordValue<'_> {
        RecordValue::Text(self)
    }
}

impl ToRecordValue for Cow<'_, str> {
    fn to_record_value(&self) -> RecordValue<'_> {
        RecordValue::Text(self)
    }
}

macro_rules! integer_record_value {
    ($($ty:ty),*) => {
        $(
            impl ToRecordValue for $ty {
                fn to_record_value(&self) -> RecordValue<'_> {
                    RecordValue::Integer(i64::from(*self))
                }
            }
        )*
    };
}

integer_record_value!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! wide_integer_record_value {
    ($($ty:ty),*) => {
        $(
            impl ToRecordValue for $ty {
                fn to_record_value(&self) -> RecordValue<'_> {
                    match i64::try_from(*self) {
                        Ok(n) => RecordValue::Integer(n),
                        Err(_) => RecordValue::Float(*self as f64),
                    }
                }
            }
        )*
    };
}

wide_integer_record_value!(u64, usize, isize);

impl ToRecordValue for f32 {
    fn to_record_value(&self) -> RecordValue<'_> {
        RecordValue::Float(f64::from(*self))
    }
}

impl ToRecordValue for f64 {
    fn to_record_value(&self) -> RecordValue<'_> {
        RecordValue::Float(*self)
    }
}

impl ToRecordValue for bool {
    fn to_record_value(&self) -> RecordValue<'_> {
        RecordValue::Bool(*self)
    }
}

impl ToRecordValue for NaiveDate {
    fn to_record_value(&self) -> RecordValue<'_> {
        RecordValue::Date(*self)
    }
}

impl ToRecordValue for NaiveDateTime {
    fn to_record_value(&self) -> RecordValue<'_> {
        RecordValue::DateTime(*self)
    }
}

impl<Tz: TimeZone> ToRecordValue for DateTime<Tz> {
    fn to_record_value(&self) -> RecordValue<'_> {
        RecordValue::DateTime(self.naive_utc())
    }
}

impl<T: ToRecordValue> ToRecordValue for Option<T> {
    fn to_record_value(&self) -> RecordValue<'_> {
        match self {
            Some(value) => value.to_record_value(),
            None => RecordValue::Null,
        }
    }
}

impl<T: ToRecordValue + ?Sized> ToRecordValue for &T {
    fn to_record_value(&self) -> RecordValue<'_> {
        (**self).to_record_value()
    }
}

impl<T: ToRecordValue + ?Sized> ToRecordValue for Box<T> {
    fn to_record_value(&self) -> RecordValue<'_> {
        (**self).to_record_value()
    }
}

/// Access to an optional related record.
///
/// Used by `#[derive(Model)]` for `one = "..."` fields.
pub trait ToOne {
    /// The related record, or `None` when unset.
    fn to_one(&self) -> Option<&dyn Record>;
}

impl<T: Record> ToOne for Option<T> {
    fn to_one(&self) -> Option<&dyn Record> {
        self.as_ref().map(|record| record as &dyn Record)
    }
}

impl<T: Record> ToOne for Box<T> {
    fn to_one(&self) -> Option<&dyn Record> {
        Some(&**self as &dyn Record)
    }
}

impl<T: Record> ToOne for Rc<T> {
    fn to_one(&self) -> Option<&dyn Record> {
        Some(&**self as &dyn Record)
    }
}

impl<T: Record> ToOne for Arc<T> {
    fn to_one(&self) -> Option<&dyn Record> {
        Some(&**self as &dyn Record)
    }
}

/// Access to a collection of related records.
///
/// Used by `#[derive(Model)]` for `many = "..."` fields.
pub trait ToMany {
    /// The related records; empty when there are none.
    fn to_many(&self) -> Vec<&dyn Record>;
}

impl<T: Record> ToMany for [T] {
    fn to_many(&self) -> Vec<&dyn Record> {
        self.iter().map(|record| record as &dyn Record).collect()
    }
}

impl<T: Record> ToMany for Vec<T> {
    fn to_many(&self) -> Vec<&dyn Record> {
        self.as_slice().to_many()
    }
}

impl<T: Record> ToMany for Option<Vec<T>> {
    fn to_many(&self) -> Vec<&dyn Record> {
        self.as_deref()
            .map(|records| records.to_many())
            .unwrap_or_default()
    }
}
