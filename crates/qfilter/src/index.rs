//! The field index: a navigable tree of a model's filterable fields.
//!
//! Building walks the schema from a root model, descending into relations.
//! Each branch carries the set of models already entered on the way down
//! from the root; a relation back into one of those keeps its node but gets
//! no children. The same model can still appear under several sibling
//! branches.
//!
//! ```
//! use qfilter::{FieldDef, FieldIndex, FieldKind, ModelDef, Schema};
//!
//! let schema = Schema::new()
//!     .with_model(ModelDef::new("Author", vec![
//!         FieldDef::new("name", FieldKind::Char),
//!         FieldDef::relation("books", FieldKind::Reverse, "Book"),
//!     ]))
//!     .with_model(ModelDef::new("Book", vec![
//!         FieldDef::new("title", FieldKind::Char),
//!         FieldDef::relation("author", FieldKind::ForeignKey, "Author"),
//!     ]));
//!
//! let index = FieldIndex::build(&schema, "Book");
//! assert_eq!(index.find_path("author.name").unwrap().lookup_path, "author.name");
//! // Book -> Author -> Book closes a cycle.
//! assert!(index.find_path("author.books").unwrap().is_leaf());
//! ```

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::field::FieldDescriptor;
use crate::schema::{ModelDef, SchemaSource};

/// Separator between the segments of a field path.
pub const PATH_SEPARATOR: char = '.';

/// One node of the field tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldTreeNode {
    /// Field name; empty for the root.
    pub key: String,
    /// Absent only for the root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<FieldDescriptor>,
    /// Dotted path from the root; empty for the root.
    pub lookup_path: String,
    pub children: Vec<FieldTreeNode>,
}

impl FieldTreeNode {
    fn root(children: Vec<FieldTreeNode>) -> Self {
        FieldTreeNode {
            key: String::new(),
            descriptor: None,
            lookup_path: String::new(),
            children,
        }
    }

    pub fn is_root(&self) -> bool {
        self.descriptor.is_none()
    }

    /// Returns `true` if the node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns the child with the given key.
    pub fn child(&self, key: &str) -> Option<&FieldTreeNode> {
        self.children.iter().find(|child| child.key == key)
    }

    /// Iterates over this node and all its descendants, depth first.
    pub fn iter(&self) -> Iter<'_> {
        Iter { stack: vec![self] }
    }
}

impl fmt::Display for FieldTreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} ({}): ", self.key, self.lookup_path)?;
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{child}")?;
        }
        write!(f, ">")
    }
}

/// Depth-first iterator over a field tree.
pub struct Iter<'a> {
    stack: Vec<&'a FieldTreeNode>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a FieldTreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Models entered on the current branch, innermost first.
struct Visited<'a> {
    model: &'a str,
    parent: Option<&'a Visited<'a>>,
}

impl Visited<'_> {
    fn contains(&self, model: &str) -> bool {
        let mut current = Some(self);
        while let Some(visited) = current {
            if visited.model == model {
                return true;
            }
            current = visited.parent;
        }
        false
    }
}

/// The field tree of one root model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldIndex {
    model: String,
    root: FieldTreeNode,
}

impl FieldIndex {
    /// Builds the index of `model` from `source`.
    ///
    /// Never fails: unsupported fields are skipped, cycles are pruned, and
    /// an unknown root model yields an empty index.
    pub fn build<S: SchemaSource + ?Sized>(source: &S, model: &str) -> Self {
        let children = match source.model(model) {
            Some(def) => {
                let visited = Visited {
                    model: &def.name,
                    parent: None,
                };
                build_branch(source, def, "", &visited)
            }
            None => {
                warn!(model, "root model is not part of the schema; index is empty");
                Vec::new()
            }
        };

        let index = FieldIndex {
            model: model.to_string(),
            root: FieldTreeNode::root(children),
        };
        debug!(model, fields = index.len(), "built field index");
        index
    }

    /// The root model's name.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn root(&self) -> &FieldTreeNode {
        &self.root
    }

    /// Follows `segments` from the root. An empty sequence returns the root.
    ///
    /// Matching is exact and case-sensitive; the first missing segment
    /// returns `None`.
    pub fn find<I>(&self, segments: I) -> Option<&FieldTreeNode>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut node = &self.root;
        for segment in segments {
            node = node.child(segment.as_ref())?;
        }
        Some(node)
    }

    /// Resolves a dotted path such as `publisher.name`.
    ///
    /// The empty path resolves to the root.
    pub fn find_path(&self, path: &str) -> Option<&FieldTreeNode> {
        if path.is_empty() {
            return Some(&self.root);
        }
        self.find(path.split(PATH_SEPARATOR))
    }

    /// Resolves a dotted path to a field descriptor. The root has none.
    pub fn descriptor(&self, path: &str) -> Option<&FieldDescriptor> {
        self.find_path(path)?.descriptor.as_ref()
    }

    /// Iterates over every field node, depth first, excluding the root.
    pub fn iter(&self) -> impl Iterator<Item = &FieldTreeNode> {
        self.root.iter().skip(1)
    }

    /// Number of field nodes, excluding the root.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }
}

impl fmt::Display for FieldIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}

/// Builds the index of `model`; shorthand for [`FieldIndex::build`].
pub fn build_field_tree<S: SchemaSource + ?Sized>(source: &S, model: &str) -> FieldIndex {
    FieldIndex::build(source, model)
}

fn build_branch<S: SchemaSource + ?Sized>(
    source: &S,
    model: &ModelDef,
    parent_path: &str,
    visited: &Visited<'_>,
) -> Vec<FieldTreeNode> {
    let mut seen = HashSet::new();
    let mut nodes = Vec::new();

    for def in &model.fields {
        let Some(descriptor) = FieldDescriptor::from_def(def) else {
            continue;
        };
        if !seen.insert(def.name.as_str()) {
            trace!(model = %model.name, field = %descriptor.name, "skipping duplicate field name");
            continue;
        }

        let lookup_path = if parent_path.is_empty() {
            descriptor.name.clone()
        } else {
            format!("{parent_path}{PATH_SEPARATOR}{}", descriptor.name)
        };

        let children = match descriptor.related_model.as_deref() {
            Some(target) if visited.contains(target) => {
                trace!(path = %lookup_path, related = target, "pruning relation back into visited model");
                Vec::new()
            }
            Some(target) => match source.model(target) {
                Some(related) => {
                    let visited = Visited {
                        model: &related.name,
                        parent: Some(visited),
                    };
                    build_branch(source, related, &lookup_path, &visited)
                }
                None => {
                    warn!(path = %lookup_path, related = target, "relation points at an unknown model");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        nodes.push(FieldTreeNode {
            key: descriptor.name.clone(),
            descriptor: Some(descriptor),
            lookup_path,
            children,
        });
    }

    nodes
}

/// A model of a schema with a lazily built, cached field index.
///
/// The index is built on first access and shared by all later readers,
/// including readers on other threads.
#[derive(Debug)]
pub struct ModelIndex<S> {
    source: S,
    model: String,
    field_index: OnceCell<FieldIndex>,
}

impl<S: SchemaSource> ModelIndex<S> {
    pub fn new(source: S, model: impl Into<String>) -> Self {
        ModelIndex {
            source,
            model: model.into(),
            field_index: OnceCell::new(),
        }
    }

    /// The model's human-readable title.
    pub fn name(&self) -> String {
        self.source
            .model(&self.model)
            .map(ModelDef::title)
            .unwrap_or_else(|| self.model.clone())
    }

    /// The model's identifying label.
    pub fn label(&self) -> &str {
        &self.model
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The model's field index, built on first call.
    pub fn field_index(&self) -> &FieldIndex {
        self.field_index
            .get_or_init(|| FieldIndex::build(&self.source, &self.model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, FieldKind, Schema};

    fn library() -> Schema {
        Schema::new()
            .with_model(ModelDef::new(
                "Book",
                vec![
                    FieldDef::new("title", FieldKind::Char),
                    FieldDef::new("publication_date", FieldKind::Date),
                    FieldDef::new("cover", FieldKind::File),
                    FieldDef::relation("reviews", FieldKind::Reverse, "Review"),
                    FieldDef::relation("author", FieldKind::ForeignKey, "Author"),
                ],
            ))
            .with_model(ModelDef::new(
                "Author",
                vec![
                    FieldDef::new("name", FieldKind::Char),
                    FieldDef::relation("books", FieldKind::Reverse, "Book"),
                ],
            ))
            .with_model(ModelDef::new(
                "Review",
                vec![
                    FieldDef::new("rating", FieldKind::PositiveInteger),
                    FieldDef::relation("book", FieldKind::ForeignKey, "Book"),
                ],
            ))
    }

    #[test]
    fn skips_unsupported_kinds() {
        let index = FieldIndex::build(&library(), "Book");
        assert!(index.find(["cover"]).is_none());
        assert!(index.find(["title"]).is_some());
    }

    #[test]
    fn prunes_cycles_per_branch() {
        let index = FieldIndex::build(&library(), "Book");

        // Book -> Author -> Book is pruned under the author branch...
        let books = index.find(["author", "books"]).unwrap();
        assert!(books.is_leaf());
        // ...and Book -> Review -> Book under the reviews branch.
        assert!(index.find(["reviews", "book"]).unwrap().is_leaf());
        assert!(index.find(["reviews", "rating"]).is_some());
    }

    #[test]
    fn same_model_on_sibling_branches() {
        let schema = Schema::new()
            .with_model(ModelDef::new(
                "Loan",
                vec![
                    FieldDef::relation("lender", FieldKind::ForeignKey, "Person"),
                    FieldDef::relation("borrower", FieldKind::ForeignKey, "Person"),
                ],
            ))
            .with_model(ModelDef::new(
                "Person",
                vec![FieldDef::new("name", FieldKind::Char)],
            ));

        let index = FieldIndex::build(&schema, "Loan");
        assert!(index.find_path("lender.name").is_some());
        assert!(index.find_path("borrower.name").is_some());
    }

    #[test]
    fn self_relation_is_pruned_at_root() {
        let schema = Schema::new().with_model(ModelDef::new(
            "Category",
            vec![
                FieldDef::new("name", FieldKind::Char),
                FieldDef::relation("parent", FieldKind::ForeignKey, "Category"),
            ],
        ));

        let index = FieldIndex::build(&schema, "Category");
        let parent = index.find(["parent"]).unwrap();
        assert!(parent.is_leaf());
        assert!(parent.descriptor.as_ref().unwrap().is_relation());
    }

    #[test]
    fn lookup_paths_are_dotted() {
        let index = FieldIndex::build(&library(), "Book");
        let name = index.find(["author", "name"]).unwrap();
        assert_eq!(name.lookup_path, "author.name");
        assert_eq!(name.key, "name");
    }

    #[test]
    fn find_edge_cases() {
        let index = FieldIndex::build(&library(), "Book");
        let empty: [&str; 0] = [];
        assert!(index.find(empty).unwrap().is_root());
        assert!(index.find_path("").unwrap().is_root());
        assert!(index.find(["nonexistent"]).is_none());
        assert!(index.find(["author", "ghost"]).is_none());
        assert!(index.find(["Title"]).is_none());
        assert!(index.descriptor("").is_none());
    }

    #[test]
    fn unknown_root_model_is_empty() {
        let index = FieldIndex::build(&library(), "Ghost");
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert_eq!(index.model(), "Ghost");
    }

    #[test]
    fn unknown_relation_target_keeps_node() {
        let schema = Schema::new().with_model(ModelDef::new(
            "Book",
            vec![FieldDef::relation("shelf", FieldKind::ForeignKey, "Shelf")],
        ));
        let index = FieldIndex::build(&schema, "Book");
        assert!(index.find(["shelf"]).unwrap().is_leaf());
    }

    #[test]
    fn duplicate_names_keep_first() {
        let schema = Schema::new().with_model(ModelDef::new(
            "Book",
            vec![
                FieldDef::new("title", FieldKind::Char),
                FieldDef::new("title", FieldKind::Integer),
            ],
        ));
        let index = FieldIndex::build(&schema, "Book");
        assert_eq!(index.len(), 1);
        let descriptor = index.descriptor("title").unwrap();
        assert_eq!(descriptor.field_type, crate::field::FieldType::Text);
    }

    #[test]
    fn iter_is_depth_first() {
        let index = FieldIndex::build(&library(), "Book");
        let paths: Vec<_> = index.iter().map(|node| node.lookup_path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "title",
                "publication_date",
                "reviews",
                "reviews.rating",
                "reviews.book",
                "author",
                "author.name",
                "author.books",
            ]
        );
    }

    #[test]
    fn display_nests_children() {
        let schema = Schema::new()
            .with_model(ModelDef::new(
                "Book",
                vec![FieldDef::relation("publisher", FieldKind::ForeignKey, "Publisher")],
            ))
            .with_model(ModelDef::new(
                "Publisher",
                vec![FieldDef::new("name", FieldKind::Char)],
            ));
        let index = FieldIndex::build(&schema, "Book");
        assert_eq!(
            index.to_string(),
            "< (): <publisher (publisher): <name (publisher.name): >>>"
        );
    }

    #[test]
    fn model_index_is_lazy_and_cached() {
        let model_index = ModelIndex::new(
            library().with_model(ModelDef::new("Book", vec![]).with_verbose_name("book")),
            "Book",
        );
        assert_eq!(model_index.name(), "Book");
        assert_eq!(model_index.label(), "Book");

        let first = model_index.field_index() as *const FieldIndex;
        let second = model_index.field_index() as *const FieldIndex;
        assert_eq!(first, second);
    }
}
