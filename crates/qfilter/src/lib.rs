//! qfilter - Schema-aware filter expressions.
//!
//! qfilter takes a JSON tree describing boolean filter logic, checks it
//! against a schema of fields (including fields reached through
//! relations), and compiles it into a composable predicate that a query
//! backend can translate or that can be evaluated in memory.
//!
//! - [`FieldIndex`]: the navigable tree of a model's filterable fields,
//!   built from a [`SchemaSource`] with cycle-safe relation traversal
//! - [`FilterNode`]: the filter tree, parsed from its JSON wire form
//! - [`Validator`]: fail-fast checks of connectors, field paths, lookups
//!   and values
//! - [`Predicate`]: the compiled form, convertible back to the wire form,
//!   and evaluated against [`Record`]s by an [`Evaluator`]
//!
//! # Quick Start
//!
//! ```rust
//! use qfilter::{FieldDef, FieldIndex, FieldKind, ModelDef, Schema, Validator};
//! use serde_json::json;
//!
//! let schema = Schema::new()
//!     .with_model(ModelDef::new("Book", vec![
//!         FieldDef::new("title", FieldKind::Char),
//!         FieldDef::new("publication_date", FieldKind::DateTime),
//!         FieldDef::relation("publisher", FieldKind::ForeignKey, "Publisher"),
//!     ]))
//!     .with_model(ModelDef::new("Publisher", vec![
//!         FieldDef::new("name", FieldKind::Char),
//!     ]));
//!
//! let index = FieldIndex::build(&schema, "Book");
//! let filter = json!({
//!     "connector": "AND",
//!     "negated": false,
//!     "children": [
//!         {"path": "title", "lookup_expression": "startswith", "value": "A"},
//!         {"connector": "OR", "negated": true, "children": [
//!             {"path": "publisher.name", "value": "Springer"}
//!         ]}
//!     ]
//! });
//!
//! let predicate = Validator::new(&index).compile_value(&filter)?;
//! assert_eq!(
//!     predicate.to_string(),
//!     r#"title startswith "A" AND NOT (publisher.name exact "Springer")"#
//! );
//! assert_eq!(predicate.to_value(), json!({
//!     "connector": "AND",
//!     "negated": false,
//!     "children": [
//!         {"path": "title", "lookup_expression": "startswith", "value": "A"},
//!         {"connector": "OR", "negated": true, "children": [
//!             {"path": "publisher.name", "lookup_expression": null, "value": "Springer"}
//!         ]}
//!     ]
//! }));
//!
//! let books = vec![
//!     json!({"title": "Anathem", "publisher": {"id": 1, "name": "Atlantic"}}),
//!     json!({"title": "Aurora", "publisher": {"id": 2, "name": "Springer"}}),
//! ];
//! assert_eq!(predicate.evaluator().count(&books), 1);
//! # Ok::<(), qfilter::ValidationError>(())
//! ```
//!
//! # Lookups
//!
//! | Type | Comparisons | Transforms |
//! |------|-------------|------------|
//! | Text | `exact` `iexact` `contains` `icontains` `startswith` `istartswith` `endswith` `iendswith` `regex` `iregex` `in` `isnull` | |
//! | Integer | `exact` `gt` `gte` `lt` `lte` `in` `range` `isnull` | |
//! | Boolean | `exact` `isnull` | |
//! | Date | as Integer | `year` `month` `day` `week_day` `quarter` |
//! | DateTime | as Integer | as Date, plus `date` `hour` `minute` `second` |
//! | Relation | `exact` `in` `isnull` | `pk` |
//!
//! Transforms chain with `__`: `date__gte`, `year__lt`, `pk__in`.
//!
//! # Derive
//!
//! With the `macros` feature, `#[derive(Model)]` generates both the schema
//! description ([`Model`]) and record access ([`Record`]) for a struct.

mod config;
mod error;
mod eval;
mod field;
mod filter;
mod index;
mod lookup;
mod predicate;
mod record;
mod schema;
mod validate;
mod value;

pub use config::FilterOptions;
pub use error::{ErrorBody, FilterError, LoadError, Result, ValidationError};
pub use eval::Evaluator;
pub use field::{FieldDescriptor, FieldType};
pub use filter::{is_connector, Connector, ConnectorNode, FilterNode, LeafNode};
pub use index::{build_field_tree, FieldIndex, FieldTreeNode, Iter, ModelIndex, PATH_SEPARATOR};
pub use lookup::{Comparison, LookupExpr, Transform, ValueShape, LOOKUP_SEPARATOR};
pub use predicate::{compile, Condition, Predicate};
pub use record::{Record, RecordValue, ToMany, ToOne, ToRecordValue};
pub use schema::{Choice, FieldDef, FieldKind, Model, ModelDef, Schema, SchemaSource};
pub use validate::{validate_filter_data, Validator};
pub use value::{parse_date, parse_datetime, Number, Scalar};

#[cfg(feature = "macros")]
pub use qfilter_macros::Model;
