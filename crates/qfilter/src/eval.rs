//! In-memory evaluation of predicates.
//!
//! An [`Evaluator`] is prepared once from a [`Predicate`]: lookup
//! expressions are parsed and regular expressions compiled up front, then
//! the evaluator can be run against any number of [`Record`]s.
//!
//! Matching rules:
//!
//! - A condition whose lookup cannot be parsed, or whose value does not fit
//!   the lookup, never matches.
//! - Type mismatches between the record value and the filter value never
//!   match. Filter values are coerced to the record value's type first, so
//!   `"2020"` matches the integer `2020`.
//! - Paths through to-many relations match if any related record matches.
//! - A relation at the end of a path compares by primary key. A null or
//!   empty relation anywhere on the path yields null, which only `isnull`
//!   and an exact match against `null` can select. A related record without
//!   a primary key is still present: it is never null, but no key comparison
//!   selects it.
//! - Text compares as text, even when it looks like a date. Dates compare as
//!   dates when the record holds a date value or a `date` transform was
//!   applied.
//!
//! ```
//! use qfilter::Predicate;
//! use serde_json::json;
//!
//! let books = vec![
//!     json!({"id": 1, "title": "Dune", "reviews": [{"rating": 5}, {"rating": 2}]}),
//!     json!({"id": 2, "title": "Emma", "reviews": []}),
//! ];
//!
//! let evaluator = Predicate::lookup("reviews.rating", "gte", 4).evaluator();
//! assert_eq!(evaluator.filter(&books), vec![&books[0]]);
//!
//! let evaluator = Predicate::lookup("reviews", "isnull", true).evaluator();
//! assert_eq!(evaluator.count(&books), 1);
//! ```

use std::cmp::Ordering;

use chrono::{Datelike, Timelike};
use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::field::FieldType;
use crate::filter::Connector;
use crate::index::PATH_SEPARATOR;
use crate::lookup::{Comparison, LookupExpr, Transform, ValueShape};
use crate::predicate::{Condition, Predicate};
use crate::record::{Record, RecordValue};
use crate::value::{Number, Scalar};

/// A predicate prepared for evaluation.
#[derive(Debug, Clone)]
pub struct Evaluator {
    root: Node,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(Leaf),
    Group {
        connector: Connector,
        negated: bool,
        children: Vec<Node>,
    },
}

#[derive(Debug, Clone)]
struct Leaf {
    segments: Vec<String>,
    lookup: Option<LookupExpr>,
    operand: Operand,
}

/// A value found at the end of a path.
#[derive(Debug, Clone)]
enum Terminal {
    Value(Scalar),
    /// A related record with no primary key.
    Unkeyed,
}

#[derive(Debug, Clone)]
enum Operand {
    Value(Value),
    List(Vec<Value>),
    Pattern(Regex),
    Flag(bool),
    Invalid,
}

impl Evaluator {
    /// Prepares `predicate` for evaluation.
    pub fn new(predicate: &Predicate) -> Self {
        Evaluator {
            root: prepare(predicate),
        }
    }

    /// Tests a single record.
    pub fn matches(&self, record: &dyn Record) -> bool {
        self.root.matches(record)
    }

    /// Returns references to the matching records, in order.
    pub fn filter<'a, R: Record>(&self, records: &'a [R]) -> Vec<&'a R> {
        records
            .iter()
            .filter(|record| self.matches(*record))
            .collect()
    }

    /// Clones the matching records.
    pub fn filter_cloned<R: Record + Clone>(&self, records: &[R]) -> Vec<R> {
        self.filter(records).into_iter().cloned().collect()
    }

    /// Keeps only the matching records.
    pub fn filter_mut<R: Record>(&self, records: &mut Vec<R>) {
        records.retain(|record| self.matches(record));
    }

    /// Counts the matching records.
    pub fn count<R: Record>(&self, records: &[R]) -> usize {
        records.iter().filter(|record| self.matches(*record)).count()
    }

    /// Returns `true` if any record matches.
    pub fn any<R: Record>(&self, records: &[R]) -> bool {
        records.iter().any(|record| self.matches(record))
    }

    /// Returns `true` if every record matches.
    pub fn all<R: Record>(&self, records: &[R]) -> bool {
        records.iter().all(|record| self.matches(record))
    }

    /// Finds the first matching record.
    pub fn find<'a, R: Record>(&self, records: &'a [R]) -> Option<&'a R> {
        records.iter().find(|record| self.matches(*record))
    }

    /// Finds the index of the first matching record.
    pub fn position<R: Record>(&self, records: &[R]) -> Option<usize> {
        records.iter().position(|record| self.matches(record))
    }
}

fn prepare(predicate: &Predicate) -> Node {
    match predicate {
        Predicate::Condition(condition) => Node::Leaf(prepare_leaf(condition)),
        Predicate::Compound {
            connector,
            negated,
            children,
        } => Node::Group {
            connector: *connector,
            negated: *negated,
            children: children.iter().map(prepare).collect(),
        },
    }
}

fn prepare_leaf(condition: &Condition) -> Leaf {
    let lookup = LookupExpr::parse_optional(condition.lookup_expression.as_deref());
    let value = &condition.value;

    let operand = match lookup.as_ref().map(|l| (l.comparison(), l.comparison().shape())) {
        None => Operand::Invalid,
        Some((_, ValueShape::Scalar)) => Operand::Value(value.clone()),
        Some((_, ValueShape::Flag)) => value.as_bool().map_or(Operand::Invalid, Operand::Flag),
        Some((comparison, ValueShape::Pattern)) => value
            .as_str()
            .and_then(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(comparison.is_case_insensitive())
                    .build()
                    .ok()
            })
            .map_or(Operand::Invalid, Operand::Pattern),
        Some((_, ValueShape::List)) => match value.as_array() {
            Some(items) => Operand::List(items.clone()),
            None => Operand::Invalid,
        },
        Some((_, ValueShape::Pair)) => match value.as_array() {
            Some(items) if items.len() == 2 => Operand::List(items.clone()),
            _ => Operand::Invalid,
        },
    };

    Leaf {
        segments: condition
            .path
            .split(PATH_SEPARATOR)
            .map(str::to_string)
            .collect(),
        lookup,
        operand,
    }
}

impl Node {
    fn matches(&self, record: &dyn Record) -> bool {
        match self {
            Node::Leaf(leaf) => leaf.matches(record),
            Node::Group {
                connector,
                negated,
                children,
            } => connector.fold(children.iter().map(|child| child.matches(record))) != *negated,
        }
    }
}

impl Leaf {
    fn matches(&self, record: &dyn Record) -> bool {
        let Some(lookup) = &self.lookup else {
            return false;
        };
        if matches!(self.operand, Operand::Invalid) {
            return false;
        }

        let mut terminals = Vec::new();
        collect_terminals(record, &self.segments, &mut terminals);
        terminals
            .iter()
            .any(|terminal| self.matches_terminal(terminal, lookup))
    }

    fn matches_terminal(&self, terminal: &Terminal, lookup: &LookupExpr) -> bool {
        let mut value = match terminal {
            Terminal::Value(scalar) => scalar.clone(),
            Terminal::Unkeyed => return self.matches_unkeyed(lookup),
        };
        for transform in lookup.transforms() {
            match apply_transform(*transform, &value) {
                Some(transformed) => value = transformed,
                None => return false,
            }
        }

        let comparison = lookup.comparison();
        match (&self.operand, comparison) {
            (Operand::Flag(expected), Comparison::IsNull) => value.is_null() == *expected,
            (Operand::Value(operand), Comparison::Exact) if operand.is_null() => value.is_null(),
            _ if value.is_null() => false,
            (Operand::Value(operand), _) => match comparison {
                Comparison::Exact
                | Comparison::Gt
                | Comparison::Gte
                | Comparison::Lt
                | Comparison::Lte => compare(&value, operand)
                    .is_some_and(|ordering| comparison.eval_ordering(ordering)),
                _ => match_text(comparison, &value, operand),
            },
            (Operand::Pattern(regex), _) => text_of(&value).is_some_and(|text| regex.is_match(&text)),
            (Operand::List(items), Comparison::In) => items
                .iter()
                .any(|item| compare(&value, item) == Some(Ordering::Equal)),
            (Operand::List(items), Comparison::Range) => match items.as_slice() {
                [low, high] => {
                    compare(&value, low).is_some_and(|o| o != Ordering::Less)
                        && compare(&value, high).is_some_and(|o| o != Ordering::Greater)
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// Only presence can be tested on a related record without a key.
    fn matches_unkeyed(&self, lookup: &LookupExpr) -> bool {
        match (&self.operand, lookup.comparison()) {
            (Operand::Flag(expected), Comparison::IsNull) if lookup.transforms().is_empty() => {
                !*expected
            }
            _ => false,
        }
    }
}

/// Walks `segments` from `record`, collecting every value at the end of
/// the path.
fn collect_terminals(record: &dyn Record, segments: &[String], out: &mut Vec<Terminal>) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let value = record.field(first);

    if rest.is_empty() {
        match value {
            RecordValue::One(Some(related)) => out.push(pk_terminal(related)),
            RecordValue::One(None) => out.push(Terminal::Value(Scalar::Null)),
            RecordValue::Many(related) if related.is_empty() => {
                out.push(Terminal::Value(Scalar::Null))
            }
            RecordValue::Many(related) => out.extend(related.into_iter().map(pk_terminal)),
            other => out.push(Terminal::Value(other.to_scalar().unwrap_or(Scalar::Null))),
        }
        return;
    }

    match value {
        RecordValue::One(Some(related)) => collect_terminals(related, rest, out),
        RecordValue::Many(related) if !related.is_empty() => {
            for record in related {
                collect_terminals(record, rest, out);
            }
        }
        RecordValue::One(None) | RecordValue::Many(_) | RecordValue::Null | RecordValue::Missing => {
            out.push(Terminal::Value(Scalar::Null))
        }
        // A plain value cannot be traversed.
        _ => {}
    }
}

fn pk_terminal(record: &dyn Record) -> Terminal {
    record
        .pk()
        .map_or(Terminal::Unkeyed, |pk| Terminal::Value(Scalar::Number(Number::I64(pk))))
}

fn apply_transform(transform: Transform, value: &Scalar) -> Option<Scalar> {
    if value.is_null() {
        return Some(Scalar::Null);
    }
    let int = |n: u32| Scalar::Number(Number::I64(i64::from(n)));

    match transform {
        Transform::Year => value
            .to_date()
            .map(|d| Scalar::Number(Number::I64(i64::from(d.year())))),
        Transform::Month => value.to_date().map(|d| int(d.month())),
        Transform::Day => value.to_date().map(|d| int(d.day())),
        Transform::WeekDay => value.to_date().map(|d| int(d.weekday().number_from_sunday())),
        Transform::Quarter => value.to_date().map(|d| int((d.month() - 1) / 3 + 1)),
        Transform::Hour => value.to_datetime().map(|dt| int(dt.hour())),
        Transform::Minute => value.to_datetime().map(|dt| int(dt.minute())),
        Transform::Second => value.to_datetime().map(|dt| int(dt.second())),
        Transform::Date => value.to_date().map(Scalar::Date),
        Transform::Pk => match value {
            Scalar::Number(_) => Some(value.clone()),
            _ => None,
        },
    }
}

/// Orders a record value against a filter value coerced to its type.
fn compare(value: &Scalar, operand: &Value) -> Option<Ordering> {
    let operand = match value {
        // Float record values take any numeric operand.
        Scalar::Number(Number::F64(_)) => Scalar::Number(Number::from_json(operand)?),
        _ => Scalar::coerce(operand, value.field_type()?)?,
    };
    value.compare(&operand)
}

fn text_of(value: &Scalar) -> Option<String> {
    match value {
        Scalar::Text(s) => Some(s.clone()),
        Scalar::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn match_text(comparison: Comparison, value: &Scalar, operand: &Value) -> bool {
    let Some(mut haystack) = text_of(value) else {
        return false;
    };
    let Some(Scalar::Text(mut needle)) = Scalar::coerce(operand, FieldType::Text)
    else {
        return false;
    };
    if comparison.is_case_insensitive() {
        haystack = haystack.to_lowercase();
        needle = needle.to_lowercase();
    }

    match comparison {
        Comparison::IExact => haystack == needle,
        Comparison::Contains | Comparison::IContains => haystack.contains(&needle),
        Comparison::StartsWith | Comparison::IStartsWith => haystack.starts_with(&needle),
        Comparison::EndsWith | Comparison::IEndsWith => haystack.ends_with(&needle),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn books() -> Vec<Value> {
        vec![
            json!({
                "id": 1,
                "title": "Dune",
                "pages": 412,
                "in_print": true,
                "publication_date": "1965-08-01T09:00:00",
                "publisher": {"id": 10, "name": "Chilton"},
                "reviews": [{"id": 100, "rating": 5}, {"id": 101, "rating": 3}]
            }),
            json!({
                "id": 2,
                "title": "Emma",
                "pages": 474,
                "in_print": false,
                "publication_date": "1815-12-23T00:00:00",
                "publisher": null,
                "reviews": []
            }),
            json!({
                "id": 3,
                "title": "Anathem",
                "pages": 937,
                "in_print": true,
                "publication_date": "2008-09-09T12:30:00",
                "publisher": {"id": 11, "name": "Springer"},
                "reviews": [{"id": 102, "rating": 4}]
            }),
        ]
    }

    fn titles(predicate: Predicate) -> Vec<String> {
        let books = books();
        predicate
            .evaluator()
            .filter(&books)
            .into_iter()
            .map(|book| book["title"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn text_lookups() {
        assert_eq!(titles(Predicate::exact("title", "Dune")), vec!["Dune"]);
        assert_eq!(titles(Predicate::lookup("title", "iexact", "dune")), vec!["Dune"]);
        assert_eq!(titles(Predicate::lookup("title", "startswith", "A")), vec!["Anathem"]);
        assert_eq!(titles(Predicate::lookup("title", "icontains", "M")), vec!["Emma", "Anathem"]);
        assert_eq!(titles(Predicate::lookup("title", "endswith", "ma")), vec!["Emma"]);
        assert_eq!(titles(Predicate::lookup("title", "regex", "^[DE]")), vec!["Dune", "Emma"]);
        assert_eq!(titles(Predicate::lookup("title", "iregex", "^d")), vec!["Dune"]);
        assert_eq!(
            titles(Predicate::lookup("title", "in", json!(["Emma", "Dune"]))),
            vec!["Dune", "Emma"]
        );
    }

    #[test]
    fn numeric_lookups_coerce_strings() {
        assert_eq!(titles(Predicate::lookup("pages", "gt", 450)), vec!["Emma", "Anathem"]);
        assert_eq!(titles(Predicate::lookup("pages", "lte", "412")), vec!["Dune"]);
        assert_eq!(
            titles(Predicate::lookup("pages", "range", json!([400, 500]))),
            vec!["Dune", "Emma"]
        );
        assert!(titles(Predicate::exact("pages", "many")).is_empty());
    }

    #[test]
    fn date_transforms() {
        assert_eq!(titles(Predicate::lookup("publication_date", "year", "2008")), vec!["Anathem"]);
        assert_eq!(titles(Predicate::lookup("publication_date", "year__lt", 1900)), vec!["Emma"]);
        assert_eq!(titles(Predicate::lookup("publication_date", "month", 12)), vec!["Emma"]);
        assert_eq!(titles(Predicate::lookup("publication_date", "quarter", 3)), vec!["Dune", "Anathem"]);
        assert_eq!(titles(Predicate::lookup("publication_date", "hour__gte", 9)), vec!["Dune", "Anathem"]);
        assert_eq!(
            titles(Predicate::lookup("publication_date", "date__gte", "1965-08-01")),
            vec!["Dune", "Anathem"]
        );
        // 2008-09-09 was a Tuesday: Sunday is 1.
        assert_eq!(titles(Predicate::lookup("publication_date", "week_day", 3)), vec!["Anathem"]);
    }

    struct Edition {
        code: &'static str,
        printed: chrono::NaiveDateTime,
    }

    impl Record for Edition {
        fn field(&self, name: &str) -> RecordValue<'_> {
            match name {
                "code" => RecordValue::Text(self.code),
                "printed" => RecordValue::DateTime(self.printed),
                _ => RecordValue::Missing,
            }
        }
    }

    fn edition(code: &'static str, printed: &str) -> Edition {
        Edition {
            code,
            printed: crate::value::parse_datetime(printed).unwrap(),
        }
    }

    #[test]
    fn typed_dates_compare_as_dates() {
        let editions = vec![
            edition("first", "1965-08-01T09:00:00"),
            edition("second", "2008-09-09T12:30:00"),
        ];
        let count = |predicate: Predicate| predicate.evaluator().count(&editions);

        assert_eq!(count(Predicate::lookup("printed", "gte", "1965-08-01")), 2);
        assert_eq!(count(Predicate::lookup("printed", "lt", "2008-09-09T12:30:00+00:00")), 1);
        assert_eq!(count(Predicate::exact("printed", "2008-09-09T14:30:00+02:00")), 1);
        assert_eq!(count(Predicate::lookup("printed", "date", "2008-09-09")), 1);
    }

    #[test]
    fn date_like_text_compares_as_text() {
        let codes = vec![json!({"code": "2020-01-01"})];
        let count = |predicate: Predicate| predicate.evaluator().count(&codes);

        assert_eq!(count(Predicate::exact("code", "2020-01-01")), 1);
        assert_eq!(count(Predicate::exact("code", "2020-01-01T00:00:00")), 0);
        assert_eq!(count(Predicate::lookup("code", "gt", "2019-12-31T23:59:59")), 1);
        // A prefix sorts first as text, though both name the same instant.
        assert_eq!(count(Predicate::lookup("code", "lt", "2020-01-01T00:00:00")), 1);

        let editions = vec![edition("2020-01-01", "2020-01-01T00:00:00")];
        assert_eq!(
            Predicate::exact("code", "2020-01-01T00:00:00").evaluator().count(&editions),
            0
        );
        // The same operand matches the typed field.
        assert_eq!(
            Predicate::exact("printed", "2020-01-01T00:00:00").evaluator().count(&editions),
            1
        );
    }

    #[test]
    fn relations() {
        assert_eq!(titles(Predicate::exact("publisher.name", "Springer")), vec!["Anathem"]);
        assert_eq!(titles(Predicate::exact("publisher", 10)), vec!["Dune"]);
        assert_eq!(titles(Predicate::lookup("publisher", "pk__in", json!([10, 11]))), vec!["Dune", "Anathem"]);
        assert_eq!(titles(Predicate::lookup("publisher", "isnull", true)), vec!["Emma"]);
        assert_eq!(titles(Predicate::lookup("publisher.name", "isnull", true)), vec!["Emma"]);
        assert_eq!(titles(Predicate::exact("publisher", Value::Null)), vec!["Emma"]);
    }

    #[test]
    fn to_many_relations_match_any() {
        assert_eq!(titles(Predicate::exact("reviews.rating", 3)), vec!["Dune"]);
        assert_eq!(titles(Predicate::lookup("reviews.rating", "gte", 4)), vec!["Dune", "Anathem"]);
        assert_eq!(titles(Predicate::lookup("reviews", "in", json!([102]))), vec!["Anathem"]);
        assert_eq!(titles(Predicate::lookup("reviews", "isnull", true)), vec!["Emma"]);
        assert_eq!(titles(Predicate::lookup("reviews", "isnull", false)), vec!["Dune", "Anathem"]);
    }

    #[test]
    fn related_records_without_keys_are_present() {
        let books = vec![
            json!({"title": "Dune", "reviews": [{"rating": 5}, {"rating": 2}], "publisher": {"name": "Chilton"}}),
            json!({"title": "Emma", "reviews": [], "publisher": null}),
        ];
        let titles = |predicate: Predicate| -> Vec<String> {
            predicate
                .evaluator()
                .filter(&books)
                .into_iter()
                .map(|book| book["title"].as_str().unwrap_or_default().to_string())
                .collect()
        };

        assert_eq!(titles(Predicate::lookup("reviews", "isnull", true)), vec!["Emma"]);
        assert_eq!(titles(Predicate::lookup("reviews", "isnull", false)), vec!["Dune"]);
        assert_eq!(titles(!Predicate::lookup("reviews", "isnull", true)), vec!["Dune"]);
        assert_eq!(titles(Predicate::lookup("publisher", "isnull", true)), vec!["Emma"]);
        assert_eq!(titles(Predicate::lookup("publisher", "isnull", false)), vec!["Dune"]);
        // No key to compare, and not null either.
        assert_eq!(titles(Predicate::exact("publisher", Value::Null)), vec!["Emma"]);
        assert!(titles(Predicate::lookup("reviews", "in", json!([1, 2]))).is_empty());
        assert_eq!(titles(Predicate::lookup("reviews.rating", "gte", 4)), vec!["Dune"]);
    }

    #[test]
    fn null_never_matches_comparisons() {
        assert!(titles(Predicate::lookup("publisher.name", "startswith", "")).len() == 2);
        assert!(titles(Predicate::lookup("ghost", "gte", 1)).is_empty());
        assert_eq!(titles(Predicate::lookup("ghost", "isnull", true)).len(), 3);
    }

    #[test]
    fn connectors_and_negation() {
        let dune = || Predicate::exact("title", "Dune");
        let in_print = || Predicate::exact("in_print", true);

        assert_eq!(titles(dune() & in_print()), vec!["Dune"]);
        assert_eq!(titles(dune() | in_print()), vec!["Dune", "Anathem"]);
        assert_eq!(titles(dune() ^ in_print()), vec!["Anathem"]);
        assert_eq!(titles(!(dune() | in_print())), vec!["Emma"]);
        assert_eq!(titles(!dune()), vec!["Emma", "Anathem"]);
    }

    #[test]
    fn xor_is_parity() {
        let all_three = Predicate::compound(
            Connector::Xor,
            vec![
                Predicate::lookup("pages", "gt", 0),
                Predicate::lookup("pages", "gt", 0),
                Predicate::lookup("pages", "gt", 0),
            ],
        );
        assert_eq!(titles(all_three).len(), 3);
    }

    #[test]
    fn empty_compounds() {
        assert_eq!(titles(Predicate::compound(Connector::And, vec![])).len(), 3);
        assert!(titles(Predicate::compound(Connector::Or, vec![])).is_empty());
    }

    #[test]
    fn invalid_conditions_never_match() {
        assert!(titles(Predicate::lookup("title", "nope", "Dune")).is_empty());
        assert!(titles(Predicate::lookup("title", "regex", "(")).is_empty());
        assert!(titles(Predicate::lookup("pages", "in", 412)).is_empty());
        assert!(titles(Predicate::lookup("pages", "range", json!([1]))).is_empty());
        assert!(titles(Predicate::lookup("title", "isnull", "yes")).is_empty());
        // A negated invalid condition matches everything.
        assert_eq!(titles(!Predicate::lookup("title", "nope", "Dune")).len(), 3);
    }

    #[test]
    fn collection_helpers() {
        let books = books();
        let evaluator = Predicate::exact("in_print", true).evaluator();

        assert_eq!(evaluator.count(&books), 2);
        assert!(evaluator.any(&books));
        assert!(!evaluator.all(&books));
        assert_eq!(evaluator.find(&books).map(|b| b["id"].clone()), Some(json!(1)));
        assert_eq!(evaluator.position(&books[1..]), Some(1));
        assert_eq!(evaluator.filter_cloned(&books).len(), 2);

        let mut owned = books.clone();
        evaluator.filter_mut(&mut owned);
        assert_eq!(owned.len(), 2);
    }
}
