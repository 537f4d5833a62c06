//! The filter expression tree.
//!
//! A filter is a tree of connector nodes (`AND`/`OR`/`XOR`, optionally
//! negated, over one or more children) and leaf nodes (field path, lookup
//! expression, value). The wire form is plain JSON:
//!
//! ```json
//! {"connector": "AND", "negated": false, "children": [
//!     {"path": "title", "lookup_expression": "startswith", "value": "A"},
//!     {"path": "publisher.name", "lookup_expression": null, "value": "Springer"}
//! ]}
//! ```
//!
//! A node is a connector if it carries a `children` or a `connector` key,
//! and a leaf otherwise. The rule is applied independently at every level.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

use crate::config::FilterOptions;
use crate::error::ValidationError;

/// A boolean combinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Connector {
    And,
    Or,
    /// Exclusive or: true when an odd number of children are true.
    Xor,
}

impl Connector {
    pub fn as_str(self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
            Connector::Xor => "XOR",
        }
    }

    /// Folds child results left to right.
    pub fn fold<I: IntoIterator<Item = bool>>(self, results: I) -> bool {
        let mut results = results.into_iter();
        match self {
            Connector::And => results.all(|r| r),
            Connector::Or => results.any(|r| r),
            Connector::Xor => results.fold(false, |acc, r| acc ^ r),
        }
    }
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Connector {
    type Err = ValidationError;

    /// Parses a connector token. Tokens are case-sensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AND" => Ok(Connector::And),
            "OR" => Ok(Connector::Or),
            "XOR" => Ok(Connector::Xor),
            _ => Err(invalid_connector(Value::from(s))),
        }
    }
}

pub(crate) fn invalid_connector(value: Value) -> ValidationError {
    let shown = match &value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    ValidationError::invalid("connector", value, format!("'{shown}' is not a valid connector."))
}

/// A boolean combination of child filters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectorNode {
    pub connector: Connector,
    pub negated: bool,
    pub children: Vec<FilterNode>,
}

/// An atomic condition: `path lookup_expression value`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeafNode {
    pub path: String,
    /// `None` means an exact match.
    pub lookup_expression: Option<String>,
    pub value: Value,
}

impl LeafNode {
    pub fn new(path: impl Into<String>, value: impl Into<Value>) -> Self {
        LeafNode {
            path: path.into(),
            lookup_expression: None,
            value: value.into(),
        }
    }

    pub fn with_lookup(mut self, lookup: impl Into<String>) -> Self {
        self.lookup_expression = Some(lookup.into());
        self
    }
}

/// A node of a filter tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterNode {
    Connector(ConnectorNode),
    Leaf(LeafNode),
}

impl FilterNode {
    /// Creates a non-negated connector node.
    pub fn connector(connector: Connector, children: Vec<FilterNode>) -> Self {
        FilterNode::Connector(ConnectorNode {
            connector,
            negated: false,
            children,
        })
    }

    /// Creates an exact-match leaf.
    pub fn leaf(path: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterNode::Leaf(LeafNode::new(path, value))
    }

    /// Creates a leaf with an explicit lookup expression.
    pub fn lookup(
        path: impl Into<String>,
        lookup: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        FilterNode::Leaf(LeafNode::new(path, value).with_lookup(lookup))
    }

    /// Flips the negation of a connector node; wraps a leaf in a negated `AND`.
    pub fn negate(self) -> Self {
        match self {
            FilterNode::Connector(mut node) => {
                node.negated = !node.negated;
                FilterNode::Connector(node)
            }
            leaf @ FilterNode::Leaf(_) => FilterNode::Connector(ConnectorNode {
                connector: Connector::And,
                negated: true,
                children: vec![leaf],
            }),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, FilterNode::Leaf(_))
    }

    /// Parses the wire form, checking structure only.
    ///
    /// Field paths are not resolved; use [`Validator`](crate::Validator) to
    /// check a tree against a field index. All connectors are accepted.
    pub fn from_value(raw: &Value) -> Result<FilterNode, ValidationError> {
        let options = FilterOptions::default();
        let structure_only = |_: &LeafNode| -> Result<(), ValidationError> { Ok(()) };
        TreeWalk::new(&options, structure_only).node(raw, 1)
    }

    /// Parses JSON text, checking structure only.
    pub fn from_json(text: &str) -> crate::Result<FilterNode> {
        let raw: Value = serde_json::from_str(text)?;
        Ok(FilterNode::from_value(&raw)?)
    }

    /// The canonical wire form.
    ///
    /// Connectors always carry `negated`; leaves always carry
    /// `lookup_expression`, `null` when absent.
    pub fn to_value(&self) -> Value {
        match self {
            FilterNode::Connector(node) => json!({
                "connector": node.connector.as_str(),
                "negated": node.negated,
                "children": node.children.iter().map(FilterNode::to_value).collect::<Vec<_>>(),
            }),
            FilterNode::Leaf(leaf) => json!({
                "path": leaf.path,
                "lookup_expression": leaf.lookup_expression,
                "value": leaf.value,
            }),
        }
    }

    /// Number of connector levels on the deepest branch.
    pub fn depth(&self) -> usize {
        match self {
            FilterNode::Connector(node) => {
                1 + node.children.iter().map(FilterNode::depth).max().unwrap_or(0)
            }
            FilterNode::Leaf(_) => 0,
        }
    }

    /// Collects the leaves, left to right.
    pub fn leaves(&self) -> Vec<&LeafNode> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a LeafNode>) {
        match self {
            FilterNode::Connector(node) => {
                for child in &node.children {
                    child.collect_leaves(out);
                }
            }
            FilterNode::Leaf(leaf) => out.push(leaf),
        }
    }
}

impl From<LeafNode> for FilterNode {
    fn from(leaf: LeafNode) -> Self {
        FilterNode::Leaf(leaf)
    }
}

impl From<ConnectorNode> for FilterNode {
    fn from(node: ConnectorNode) -> Self {
        FilterNode::Connector(node)
    }
}

impl<'de> Deserialize<'de> for FilterNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        FilterNode::from_value(&raw).map_err(serde::de::Error::custom)
    }
}

/// Returns `true` if `node` is a connector node on the wire.
pub fn is_connector(node: &Map<String, Value>) -> bool {
    node.contains_key("children") || node.contains_key("connector")
}

/// A single pre-order walk over raw input.
///
/// Structure is checked as each node is reached; `on_leaf` runs on every
/// parsed leaf before the walk moves on, so the first error in pre-order
/// is the one reported.
pub(crate) struct TreeWalk<'o, F> {
    options: &'o FilterOptions,
    on_leaf: F,
}

impl<'o, F> TreeWalk<'o, F>
where
    F: FnMut(&LeafNode) -> Result<(), ValidationError>,
{
    pub(crate) fn new(options: &'o FilterOptions, on_leaf: F) -> Self {
        TreeWalk { options, on_leaf }
    }

    pub(crate) fn node(&mut self, raw: &Value, depth: usize) -> Result<FilterNode, ValidationError> {
        let Value::Object(map) = raw else {
            return Err(ValidationError::invalid(
                "node",
                raw.clone(),
                "A filter node must be an object.",
            ));
        };

        if is_connector(map) {
            self.connector(map, depth).map(FilterNode::Connector)
        } else {
            let leaf = parse_leaf(map)?;
            (self.on_leaf)(&leaf)?;
            Ok(FilterNode::Leaf(leaf))
        }
    }

    fn connector(
        &mut self,
        map: &Map<String, Value>,
        depth: usize,
    ) -> Result<ConnectorNode, ValidationError> {
        let connector = match map.get("connector") {
            None | Some(Value::Null) => return Err(ValidationError::required("connector")),
            Some(Value::String(token)) => token.parse::<Connector>()?,
            Some(other) => return Err(invalid_connector(other.clone())),
        };
        if !self.options.allows(connector) {
            return Err(invalid_connector(Value::from(connector.as_str())));
        }

        let children = match map.get("children") {
            None | Some(Value::Null) => return Err(ValidationError::required("children")),
            Some(Value::Array(children)) if children.is_empty() => {
                return Err(ValidationError::required("children"))
            }
            Some(Value::Array(children)) => children,
            Some(other) => {
                return Err(ValidationError::invalid(
                    "children",
                    other.clone(),
                    "Expected a list of filter nodes.",
                ))
            }
        };

        let negated = match map.get("negated") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(negated)) => *negated,
            Some(other) => {
                return Err(ValidationError::invalid(
                    "negated",
                    other.clone(),
                    "Must be a valid boolean.",
                ))
            }
        };

        self.options.check_depth(depth)?;
        self.options.check_fan_out(children.len())?;

        let children = children
            .iter()
            .map(|child| self.node(child, depth + 1))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ConnectorNode {
            connector,
            negated,
            children,
        })
    }
}

fn parse_leaf(map: &Map<String, Value>) -> Result<LeafNode, ValidationError> {
    let path = match map.get("path") {
        None | Some(Value::Null) => return Err(ValidationError::required("path")),
        Some(Value::String(path)) => path.clone(),
        Some(other) => {
            return Err(ValidationError::invalid(
                "path",
                other.clone(),
                "Field path must be a string.",
            ))
        }
    };

    let lookup_expression = match map.get("lookup_expression") {
        None | Some(Value::Null) => None,
        Some(Value::String(lookup)) if lookup.is_empty() => None,
        Some(Value::String(lookup)) => Some(lookup.clone()),
        Some(other) => {
            return Err(ValidationError::invalid(
                "lookup_expression",
                other.clone(),
                "Lookup expression must be a string.",
            ))
        }
    };

    let value = map
        .get("value")
        .cloned()
        .ok_or_else(|| ValidationError::required("value"))?;

    Ok(LeafNode {
        path,
        lookup_expression,
        value,
    })
}
