//! Schema reflection input.
//!
//! The hosting application describes its data models here: an ordered list
//! of fields per model, each with a native [`FieldKind`], an optional
//! relation target and an optional enumerated choice list. The field index
//! is built from this description; it never talks to the application's
//! models directly.
//!
//! Schemas can be assembled in code, loaded from YAML/JSON, or collected
//! from types deriving [`Model`].
//!
//! ```
//! use qfilter::{FieldDef, FieldKind, ModelDef, Schema, SchemaSource};
//!
//! let schema = Schema::new()
//!     .with_model(ModelDef::new("Book", vec![
//!         FieldDef::new("title", FieldKind::Char),
//!         FieldDef::relation("publisher", FieldKind::ForeignKey, "Publisher"),
//!     ]))
//!     .with_model(ModelDef::new("Publisher", vec![
//!         FieldDef::new("name", FieldKind::Char),
//!     ]));
//!
//! assert!(schema.model("Publisher").is_some());
//! ```

use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::read_document;
use crate::error::LoadError;

/// Native field kinds a schema may report.
///
/// This is a closed set. Kinds without a filterable counterpart (floats,
/// JSON blobs, files, ...) are accepted here and skipped when the field
/// index is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Char,
    Text,
    SmallInteger,
    Integer,
    BigInteger,
    PositiveInteger,
    AutoField,
    Boolean,
    Date,
    #[serde(alias = "datetime")]
    DateTime,
    ForeignKey,
    OneToOne,
    ManyToMany,
    /// Reverse side of a foreign key or many-to-many relation.
    Reverse,
    Float,
    Decimal,
    Time,
    Duration,
    Uuid,
    Json,
    Binary,
    File,
}

impl FieldKind {
    /// Returns `true` for kinds that point at another model.
    pub fn is_relation(self) -> bool {
        matches!(
            self,
            FieldKind::ForeignKey | FieldKind::OneToOne | FieldKind::ManyToMany | FieldKind::Reverse
        )
    }

    /// Returns the snake_case name used in schema files.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Char => "char",
            FieldKind::Text => "text",
            FieldKind::SmallInteger => "small_integer",
            FieldKind::Integer => "integer",
            FieldKind::BigInteger => "big_integer",
            FieldKind::PositiveInteger => "positive_integer",
            FieldKind::AutoField => "auto_field",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
            FieldKind::DateTime => "date_time",
            FieldKind::ForeignKey => "foreign_key",
            FieldKind::OneToOne => "one_to_one",
            FieldKind::ManyToMany => "many_to_many",
            FieldKind::Reverse => "reverse",
            FieldKind::Float => "float",
            FieldKind::Decimal => "decimal",
            FieldKind::Time => "time",
            FieldKind::Duration => "duration",
            FieldKind::Uuid => "uuid",
            FieldKind::Json => "json",
            FieldKind::Binary => "binary",
            FieldKind::File => "file",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of an enumerated field's value set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub value: Value,
    pub label: String,
}

impl Choice {
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Choice {
            value: value.into(),
            label: label.into(),
        }
    }

    /// Builds a choice list from `(value, label)` string pairs.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Vec<Choice> {
        pairs
            .iter()
            .map(|(value, label)| Choice::new(*value, *label))
            .collect()
    }
}

/// A field as reported by the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Related model name, for relation kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Choice>>,
}

impl FieldDef {
    /// Creates a plain (non-relation) field.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        FieldDef {
            name: name.into(),
            kind,
            to: None,
            choices: None,
        }
    }

    /// Creates a relation field pointing at model `to`.
    pub fn relation(name: impl Into<String>, kind: FieldKind, to: impl Into<String>) -> Self {
        FieldDef {
            name: name.into(),
            kind,
            to: Some(to.into()),
            choices: None,
        }
    }

    /// Attaches an enumerated value set.
    pub fn with_choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = Some(choices);
        self
    }
}

/// A model: a name and its ordered fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose_name: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl ModelDef {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        ModelDef {
            name: name.into(),
            verbose_name: None,
            fields,
        }
    }

    pub fn with_verbose_name(mut self, verbose_name: impl Into<String>) -> Self {
        self.verbose_name = Some(verbose_name.into());
        self
    }

    /// The model's identifying label.
    pub fn label(&self) -> &str {
        &self.name
    }

    /// Human-readable title: the verbose name in title case, or the name.
    pub fn title(&self) -> String {
        match &self.verbose_name {
            Some(verbose) => title_case(verbose),
            None => self.name.clone(),
        }
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Source of model descriptions, queried by name.
///
/// Implement this to reflect models straight from an application's own
/// metadata instead of copying them into a [`Schema`].
pub trait SchemaSource {
    /// Returns the model named `name`, with its fields in declaration order.
    fn model(&self, name: &str) -> Option<&ModelDef>;
}

impl<S: SchemaSource + ?Sized> SchemaSource for &S {
    fn model(&self, name: &str) -> Option<&ModelDef> {
        (**self).model(name)
    }
}

impl<S: SchemaSource + ?Sized> SchemaSource for Arc<S> {
    fn model(&self, name: &str) -> Option<&ModelDef> {
        (**self).model(name)
    }
}

impl<S: SchemaSource + ?Sized> SchemaSource for Rc<S> {
    fn model(&self, name: &str) -> Option<&ModelDef> {
        (**self).model(name)
    }
}

/// Types that describe themselves as a model.
///
/// Usually derived with `#[derive(Model)]` (feature `macros`).
pub trait Model {
    /// The model name used as a relation target.
    const NAME: &'static str;

    /// The model's schema description.
    fn model_def() -> ModelDef;
}

/// An in-memory registry of models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub models: Vec<ModelDef>,
}

impl Schema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Schema::default()
    }

    /// Adds a model, replacing any model with the same name.
    pub fn with_model(mut self, model: ModelDef) -> Self {
        self.insert(model);
        self
    }

    /// Adds the description of a [`Model`] type.
    pub fn register<M: Model>(&mut self) -> &mut Self {
        self.insert(M::model_def());
        self
    }

    /// Adds a model, replacing any model with the same name.
    pub fn insert(&mut self, model: ModelDef) {
        match self.models.iter_mut().find(|m| m.name == model.name) {
            Some(existing) => *existing = model,
            None => self.models.push(model),
        }
    }

    /// Loads a schema from a YAML or JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        read_document(path.as_ref())
    }

    /// Returns the model names in registration order.
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|m| m.name.as_str())
    }
}

impl SchemaSource for Schema {
    fn model(&self, name: &str) -> Option<&ModelDef> {
        self.models.iter().find(|m| m.name == name)
    }
}
