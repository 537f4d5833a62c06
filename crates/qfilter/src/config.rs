//! Validation options and document loading.
//!
//! [`FilterOptions`] describes what the backing query evaluator can do and
//! how strictly incoming filter trees are checked. Options are plain serde
//! data, so they can live in a YAML or JSON file next to the schema.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LoadError, ValidationError};
use crate::filter::Connector;

/// Capabilities and limits applied while validating filter trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    /// Whether the backing evaluator has a true exclusive-or combinator.
    pub supports_xor: bool,
    /// Maximum connector nesting depth (the root connector is depth 1).
    pub max_depth: usize,
    /// Maximum number of children under a single connector.
    pub max_children: usize,
    /// Reject lookup expressions the resolved field does not allow.
    pub check_lookups: bool,
    /// Reject values whose shape or type does not fit the lookup.
    pub check_values: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        FilterOptions {
            supports_xor: true,
            max_depth: 32,
            max_children: 256,
            check_lookups: true,
            check_values: true,
        }
    }
}

impl FilterOptions {
    /// Creates the default options.
    pub fn new() -> Self {
        FilterOptions::default()
    }

    /// Sets whether XOR connectors are accepted.
    pub fn supports_xor(mut self, yes: bool) -> Self {
        self.supports_xor = yes;
        self
    }

    /// Sets the maximum connector nesting depth.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the maximum fan-out of a connector.
    pub fn max_children(mut self, children: usize) -> Self {
        self.max_children = children;
        self
    }

    /// Only checks structure and field paths, skipping lookup and value checks.
    pub fn paths_only(mut self) -> Self {
        self.check_lookups = false;
        self.check_values = false;
        self
    }

    /// Returns `true` if `connector` may appear in a filter tree.
    pub fn allows(&self, connector: Connector) -> bool {
        match connector {
            Connector::And | Connector::Or => true,
            Connector::Xor => self.supports_xor,
        }
    }

    /// Rejects a connector nested deeper than `max_depth`.
    pub(crate) fn check_depth(&self, depth: usize) -> Result<(), ValidationError> {
        if depth > self.max_depth {
            return Err(ValidationError::invalid(
                "children",
                Value::from(depth),
                format!(
                    "Filter nesting exceeds the maximum depth of {}.",
                    self.max_depth
                ),
            ));
        }
        Ok(())
    }

    /// Rejects a connector with more than `max_children` children.
    pub(crate) fn check_fan_out(&self, count: usize) -> Result<(), ValidationError> {
        if count > self.max_children {
            return Err(ValidationError::invalid(
                "children",
                Value::from(count),
                format!(
                    "A connector may have at most {} children.",
                    self.max_children
                ),
            ));
        }
        Ok(())
    }

    /// Loads options from a YAML or JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        read_document(path.as_ref())
    }
}

/// Reads and deserializes a YAML or JSON document.
///
/// `.json` files are parsed as JSON; anything else as YAML.
pub(crate) fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&text).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })
    } else {
        serde_yaml::from_str(&text).map_err(|source| LoadError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}
