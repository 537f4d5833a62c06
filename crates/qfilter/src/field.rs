//! Field descriptors: one filterable schema field.

use std::fmt;

use serde::Serialize;
use tracing::trace;

use crate::lookup::{Comparison, LookupExpr, Transform};
use crate::schema::{Choice, FieldDef, FieldKind};

/// The filterable type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Integer,
    Boolean,
    Date,
    DateTime,
    Relation,
}

const TEXT_COMPARISONS: &[Comparison] = &[
    Comparison::Exact,
    Comparison::IExact,
    Comparison::Contains,
    Comparison::IContains,
    Comparison::StartsWith,
    Comparison::IStartsWith,
    Comparison::EndsWith,
    Comparison::IEndsWith,
    Comparison::Regex,
    Comparison::IRegex,
    Comparison::In,
    Comparison::IsNull,
];

const ORDERED_COMPARISONS: &[Comparison] = &[
    Comparison::Exact,
    Comparison::Gt,
    Comparison::Gte,
    Comparison::Lt,
    Comparison::Lte,
    Comparison::In,
    Comparison::Range,
    Comparison::IsNull,
];

const BOOLEAN_COMPARISONS: &[Comparison] = &[Comparison::Exact, Comparison::IsNull];

const RELATION_COMPARISONS: &[Comparison] =
    &[Comparison::Exact, Comparison::In, Comparison::IsNull];

const DATE_TRANSFORMS: &[Transform] = &[
    Transform::Year,
    Transform::Month,
    Transform::Day,
    Transform::WeekDay,
    Transform::Quarter,
];

const DATETIME_TRANSFORMS: &[Transform] = &[
    Transform::Date,
    Transform::Year,
    Transform::Month,
    Transform::Day,
    Transform::WeekDay,
    Transform::Quarter,
    Transform::Hour,
    Transform::Minute,
    Transform::Second,
];

impl FieldType {
    /// Maps a native schema kind to its filterable type.
    ///
    /// The match is order-sensitive: date-times are recognised before dates,
    /// and every relation kind collapses to [`FieldType::Relation`]. Kinds
    /// with no counterpart return `None`.
    pub fn from_kind(kind: FieldKind) -> Option<Self> {
        match kind {
            FieldKind::DateTime => Some(FieldType::DateTime),
            FieldKind::Date => Some(FieldType::Date),
            FieldKind::Char | FieldKind::Text => Some(FieldType::Text),
            FieldKind::SmallInteger
            | FieldKind::Integer
            | FieldKind::BigInteger
            | FieldKind::PositiveInteger
            | FieldKind::AutoField => Some(FieldType::Integer),
            FieldKind::Boolean => Some(FieldType::Boolean),
            kind if kind.is_relation() => Some(FieldType::Relation),
            _ => None,
        }
    }

    pub fn is_relation(self) -> bool {
        self == FieldType::Relation
    }

    /// Comparisons valid as the last step of a lookup on this type.
    pub fn comparisons(self) -> &'static [Comparison] {
        match self {
            FieldType::Text => TEXT_COMPARISONS,
            FieldType::Integer | FieldType::Date | FieldType::DateTime => ORDERED_COMPARISONS,
            FieldType::Boolean => BOOLEAN_COMPARISONS,
            FieldType::Relation => RELATION_COMPARISONS,
        }
    }

    /// Transforms that may be applied to a value of this type.
    pub fn transforms(self) -> &'static [Transform] {
        match self {
            FieldType::Date => DATE_TRANSFORMS,
            FieldType::DateTime => DATETIME_TRANSFORMS,
            FieldType::Relation => &[Transform::Pk],
            FieldType::Text | FieldType::Integer | FieldType::Boolean => &[],
        }
    }

    /// Every single-step lookup token valid on this type.
    pub fn allowed_lookups(self) -> Vec<&'static str> {
        self.comparisons()
            .iter()
            .map(|c| c.as_str())
            .chain(self.transforms().iter().map(|t| t.as_str()))
            .collect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::DateTime => "date_time",
            FieldType::Relation => "relation",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A schema field the filter engine knows how to query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Target model name; present iff the field is a relation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Choice>>,
}

impl FieldDescriptor {
    /// Wraps a schema field, or returns `None` if it cannot be filtered on.
    ///
    /// Relations without a target model are not filterable either.
    pub fn from_def(def: &FieldDef) -> Option<Self> {
        let Some(field_type) = FieldType::from_kind(def.kind) else {
            trace!(field = %def.name, kind = %def.kind, "skipping field with unsupported kind");
            return None;
        };

        let related_model = if field_type.is_relation() {
            match &def.to {
                Some(to) => Some(to.clone()),
                None => {
                    trace!(field = %def.name, "skipping relation without a target model");
                    return None;
                }
            }
        } else {
            None
        };

        Some(FieldDescriptor {
            name: def.name.clone(),
            field_type,
            related_model,
            choices: def.choices.clone().filter(|choices| !choices.is_empty()),
        })
    }

    pub fn is_relation(&self) -> bool {
        self.field_type.is_relation()
    }

    pub fn has_choices(&self) -> bool {
        self.choices.is_some()
    }

    pub fn allowed_lookups(&self) -> Vec<&'static str> {
        self.field_type.allowed_lookups()
    }

    /// Returns `true` if `lookup` can be applied to this field.
    pub fn allows(&self, lookup: &LookupExpr) -> bool {
        lookup.resolve(self.field_type).is_ok()
    }

    /// Returns the label of the choice whose value equals `value`.
    pub fn choice_label(&self, value: &serde_json::Value) -> Option<&str> {
        self.choices
            .as_ref()?
            .iter()
            .find(|choice| choice_matches(&choice.value, value))
            .map(|choice| choice.label.as_str())
    }
}

/// Choice values compare by JSON equality, with strings and numbers
/// matching their textual form (`"1"` selects choice `1`).
pub(crate) fn choice_matches(choice: &serde_json::Value, value: &serde_json::Value) -> bool {
    use serde_json::Value;

    match (choice, value) {
        (Value::String(a), Value::Number(b)) | (Value::Number(b), Value::String(a)) => {
            *a == b.to_string()
        }
        _ => choice == value,
    }
}
