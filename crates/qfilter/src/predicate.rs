//! Compiled predicates.
//!
//! [`compile`] turns a validated filter tree into a [`Predicate`]: the same
//! structure, detached from the wire format and ready to hand to a query
//! backend or to the in-memory [`Evaluator`]. Compilation keeps connector,
//! negation, child order, path, lookup and value exactly as given, so
//! [`Predicate::to_tree`] rebuilds the tree it came from.
//!
//! Predicates also compose directly:
//!
//! ```
//! use qfilter::Predicate;
//!
//! let recent = Predicate::lookup("publication_date", "year__gte", 2020);
//! let by_ace = Predicate::exact("publisher.name", "Ace");
//! let filter = recent & !by_ace;
//!
//! assert_eq!(
//!     filter.to_string(),
//!     r#"publication_date year__gte 2020 AND NOT (publisher.name exact "Ace")"#
//! );
//! ```

use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Not};

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::eval::Evaluator;
use crate::filter::{Connector, ConnectorNode, FilterNode, LeafNode};
use crate::index::PATH_SEPARATOR;
use crate::lookup::LOOKUP_SEPARATOR;

/// An atomic comparison: `path lookup_expression value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub path: String,
    /// `None` means an exact match.
    pub lookup_expression: Option<String>,
    pub value: Value,
}

impl Condition {
    /// The effective lookup token, `exact` when none was given.
    pub fn lookup(&self) -> &str {
        self.lookup_expression.as_deref().unwrap_or("exact")
    }

    /// The keyword form used by ORM-style query backends:
    /// `publisher.name` with `startswith` becomes `publisher__name__startswith`.
    ///
    /// Without a lookup expression the bare field key is returned.
    pub fn lookup_key(&self) -> String {
        let mut key = self.path.replace(PATH_SEPARATOR, LOOKUP_SEPARATOR);
        if let Some(lookup) = &self.lookup_expression {
            key.push_str(LOOKUP_SEPARATOR);
            key.push_str(lookup);
        }
        key
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.path, self.lookup(), self.value)
    }
}

/// A boolean predicate over field conditions.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Condition(Condition),
    Compound {
        connector: Connector,
        negated: bool,
        children: Vec<Predicate>,
    },
}

/// Compiles a validated filter tree.
///
/// The tree is not checked again. Connectors without children compile to
/// compounds without children; [`Evaluator`] treats an empty `AND` as true
/// and an empty `OR` or `XOR` as false.
pub fn compile(node: &FilterNode) -> Predicate {
    match node {
        FilterNode::Leaf(leaf) => Predicate::Condition(Condition {
            path: leaf.path.clone(),
            lookup_expression: leaf.lookup_expression.clone(),
            value: leaf.value.clone(),
        }),
        FilterNode::Connector(node) => Predicate::Compound {
            connector: node.connector,
            negated: node.negated,
            children: node.children.iter().map(compile).collect(),
        },
    }
}

impl Predicate {
    /// An exact-match condition.
    pub fn exact(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Condition(Condition {
            path: path.into(),
            lookup_expression: None,
            value: value.into(),
        })
    }

    /// A condition with an explicit lookup expression.
    pub fn lookup(
        path: impl Into<String>,
        lookup: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Predicate::Condition(Condition {
            path: path.into(),
            lookup_expression: Some(lookup.into()),
            value: value.into(),
        })
    }

    /// A non-negated compound.
    pub fn compound(connector: Connector, children: Vec<Predicate>) -> Self {
        Predicate::Compound {
            connector,
            negated: false,
            children,
        }
    }

    /// Converts back to a filter tree.
    pub fn to_tree(&self) -> FilterNode {
        match self {
            Predicate::Condition(condition) => FilterNode::Leaf(LeafNode {
                path: condition.path.clone(),
                lookup_expression: condition.lookup_expression.clone(),
                value: condition.value.clone(),
            }),
            Predicate::Compound {
                connector,
                negated,
                children,
            } => FilterNode::Connector(ConnectorNode {
                connector: *connector,
                negated: *negated,
                children: children.iter().map(Predicate::to_tree).collect(),
            }),
        }
    }

    /// The canonical wire form of [`Predicate::to_tree`].
    pub fn to_value(&self) -> Value {
        self.to_tree().to_value()
    }

    /// Prepares the predicate for in-memory evaluation.
    pub fn evaluator(&self) -> Evaluator {
        Evaluator::new(self)
    }

    /// All conditions, left to right.
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut conditions = Vec::new();
        self.collect_conditions(&mut conditions);
        conditions
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<&'a Condition>) {
        match self {
            Predicate::Condition(condition) => out.push(condition),
            Predicate::Compound { children, .. } => {
                for child in children {
                    child.collect_conditions(out);
                }
            }
        }
    }

    fn combine(self, connector: Connector, other: Predicate) -> Predicate {
        let mut children = Vec::new();
        for operand in [self, other] {
            match operand {
                Predicate::Compound {
                    connector: inner,
                    negated: false,
                    children: inner_children,
                } if inner == connector => children.extend(inner_children),
                operand => children.push(operand),
            }
        }
        Predicate::compound(connector, children)
    }
}

impl From<Condition> for Predicate {
    fn from(condition: Condition) -> Self {
        Predicate::Condition(condition)
    }
}

impl From<&FilterNode> for Predicate {
    fn from(node: &FilterNode) -> Self {
        compile(node)
    }
}

impl BitAnd for Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Predicate) -> Predicate {
        self.combine(Connector::And, rhs)
    }
}

impl BitOr for Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Predicate) -> Predicate {
        self.combine(Connector::Or, rhs)
    }
}

impl BitXor for Predicate {
    type Output = Predicate;

    fn bitxor(self, rhs: Predicate) -> Predicate {
        self.combine(Connector::Xor, rhs)
    }
}

impl Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Predicate {
        match self {
            Predicate::Compound {
                connector,
                negated,
                children,
            } => Predicate::Compound {
                connector,
                negated: !negated,
                children,
            },
            condition => Predicate::Compound {
                connector: Connector::And,
                negated: true,
                children: vec![condition],
            },
        }
    }
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_tree().serialize(serializer)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Condition(condition) => write!(f, "{condition}"),
            Predicate::Compound {
                connector,
                negated,
                children,
            } => {
                if *negated {
                    write!(f, "NOT (")?;
                }
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {connector} ")?;
                    }
                    match child {
                        Predicate::Compound { negated: false, .. } => write!(f, "({child})")?,
                        _ => write!(f, "{child}")?,
                    }
                }
                if *negated {
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }
}
