//! Validating filter trees against a field index.
//!
//! Validation is a single pre-order walk that stops at the first problem.
//! Connector nodes are checked for a known, enabled connector and a
//! non-empty child list; leaf nodes for a resolvable field path, a lookup
//! the field supports, and a value the lookup can use.
//!
//! ```
//! use qfilter::{FieldDef, FieldIndex, FieldKind, ModelDef, Schema, Validator};
//! use serde_json::json;
//!
//! let schema = Schema::new().with_model(ModelDef::new("Book", vec![
//!     FieldDef::new("title", FieldKind::Char),
//! ]));
//! let index = FieldIndex::build(&schema, "Book");
//! let validator = Validator::new(&index);
//!
//! assert!(validator.validate_value(&json!({"path": "title", "value": "Dune"})).is_ok());
//!
//! let err = validator.validate_value(&json!({"path": "author", "value": "Herbert"})).unwrap_err();
//! assert_eq!(err.to_string(), "Field with path 'author' does not exist or is not supported.");
//! ```

use regex::RegexBuilder;
use serde_json::Value;
use tracing::debug;

use crate::config::FilterOptions;
use crate::error::ValidationError;
use crate::field::{FieldDescriptor, FieldType};
use crate::filter::{invalid_connector, FilterNode, LeafNode, TreeWalk};
use crate::index::FieldIndex;
use crate::lookup::{Comparison, LookupExpr, ValueShape};
use crate::predicate::{compile, Predicate};
use crate::value::Scalar;

/// Checks filter trees against one field index.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'i> {
    index: &'i FieldIndex,
    options: FilterOptions,
}

impl<'i> Validator<'i> {
    /// Creates a validator with default options.
    pub fn new(index: &'i FieldIndex) -> Self {
        Validator {
            index,
            options: FilterOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FilterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    pub fn index(&self) -> &'i FieldIndex {
        self.index
    }

    /// Parses and validates raw input in one walk.
    pub fn validate_value(&self, raw: &Value) -> Result<FilterNode, ValidationError> {
        TreeWalk::new(&self.options, |leaf: &LeafNode| self.check_leaf(leaf))
            .node(raw, 1)
            .map_err(rejected)
    }

    /// Validates an already parsed tree.
    pub fn validate(&self, node: &FilterNode) -> Result<(), ValidationError> {
        self.walk(node, 1).map_err(rejected)
    }

    /// Parses, validates and compiles raw input.
    pub fn compile_value(&self, raw: &Value) -> Result<Predicate, ValidationError> {
        self.validate_value(raw).map(|node| compile(&node))
    }

    /// Parses, validates and compiles JSON text.
    pub fn compile_json(&self, text: &str) -> crate::Result<Predicate> {
        let raw: Value = serde_json::from_str(text)?;
        Ok(self.compile_value(&raw)?)
    }

    fn walk(&self, node: &FilterNode, depth: usize) -> Result<(), ValidationError> {
        match node {
            FilterNode::Connector(node) => {
                if !self.options.allows(node.connector) {
                    return Err(invalid_connector(Value::from(node.connector.as_str())));
                }
                if node.children.is_empty() {
                    return Err(ValidationError::required("children"));
                }
                self.options.check_depth(depth)?;
                self.options.check_fan_out(node.children.len())?;

                node.children
                    .iter()
                    .try_for_each(|child| self.walk(child, depth + 1))
            }
            FilterNode::Leaf(leaf) => self.check_leaf(leaf),
        }
    }

    /// Checks a single leaf: path, then lookup, then value.
    pub fn check_leaf(&self, leaf: &LeafNode) -> Result<(), ValidationError> {
        let descriptor = self.index.descriptor(&leaf.path).ok_or_else(|| {
            ValidationError::invalid(
                "path",
                leaf.path.as_str(),
                format!(
                    "Field with path '{}' does not exist or is not supported.",
                    leaf.path
                ),
            )
        })?;

        if !self.options.check_lookups && !self.options.check_values {
            return Ok(());
        }

        let expression = leaf.lookup_expression.as_deref().unwrap_or_default();
        let Some(lookup) = LookupExpr::parse_optional(leaf.lookup_expression.as_deref()) else {
            if self.options.check_lookups {
                return Err(ValidationError::invalid(
                    "lookup_expression",
                    expression,
                    format!("'{expression}' is not a valid lookup expression."),
                ));
            }
            return Ok(());
        };

        let target = match lookup.resolve(descriptor.field_type) {
            Ok(target) => target,
            Err(token) if self.options.check_lookups => {
                return Err(ValidationError::invalid(
                    "lookup_expression",
                    expression,
                    format!(
                        "'{token}' is not a supported lookup for field '{}'.",
                        leaf.path
                    ),
                ));
            }
            Err(_) => return Ok(()),
        };

        if self.options.check_values {
            check_value(leaf, descriptor, &lookup, target)?;
        }
        Ok(())
    }
}

/// Validates raw input against `index` with default options.
pub fn validate_filter_data(raw: &Value, index: &FieldIndex) -> Result<(), ValidationError> {
    Validator::new(index).validate_value(raw).map(|_| ())
}

fn rejected(err: ValidationError) -> ValidationError {
    debug!(field = err.field(), code = err.code(), message = %err, "rejected filter");
    err
}

fn check_value(
    leaf: &LeafNode,
    descriptor: &FieldDescriptor,
    lookup: &LookupExpr,
    target: FieldType,
) -> Result<(), ValidationError> {
    let value = &leaf.value;
    let comparison = lookup.comparison();
    let bad = |message: String| ValidationError::invalid("value", value.clone(), message);

    let items: Vec<&Value> = match comparison.shape() {
        ValueShape::Flag => {
            if !value.is_boolean() {
                return Err(bad(format!("'{comparison}' expects true or false.")));
            }
            return Ok(());
        }
        ValueShape::Pattern => {
            let Some(pattern) = value.as_str() else {
                return Err(bad(format!("'{comparison}' expects a string pattern.")));
            };
            RegexBuilder::new(pattern)
                .case_insensitive(comparison.is_case_insensitive())
                .build()
                .map_err(|err| bad(format!("Invalid regular expression: {err}")))?;
            return Ok(());
        }
        ValueShape::List => match value.as_array() {
            Some(items) if !items.is_empty() => items.iter().collect(),
            _ => return Err(bad(format!("'{comparison}' expects a non-empty list."))),
        },
        ValueShape::Pair => match value.as_array() {
            Some(items) if items.len() == 2 => items.iter().collect(),
            _ => return Err(bad(format!("'{comparison}' expects a list of two values."))),
        },
        ValueShape::Scalar if value.is_null() => {
            if comparison == Comparison::Exact {
                return Ok(());
            }
            return Err(bad(format!("'{comparison}' does not accept null.")));
        }
        ValueShape::Scalar => vec![value],
    };

    for item in &items {
        match Scalar::coerce(item, target) {
            Some(scalar) if !scalar.is_null() => {}
            _ => {
                return Err(bad(format!(
                    "'{}' is not a valid {target} value.",
                    display(item)
                )))
            }
        }
    }

    let checks_choices = descriptor.has_choices()
        && lookup.transforms().is_empty()
        && matches!(comparison, Comparison::Exact | Comparison::In);
    if checks_choices {
        if let Some(item) = items.iter().find(|item| descriptor.choice_label(item).is_none()) {
            return Err(bad(format!(
                "'{}' is not a valid choice for field '{}'.",
                display(item),
                leaf.path
            )));
        }
    }

    Ok(())
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
