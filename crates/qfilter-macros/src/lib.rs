//! Proc macros for qfilter.
//!
//! - [`Model`]: describe a struct as a filterable model and make it
//!   evaluable as a record

mod model;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derives `qfilter::Model` and `qfilter::Record` for a struct.
///
/// # Field Attributes
///
/// | Attribute | Description |
/// |-----------|-------------|
/// | `char`, `text` | Text field |
/// | `integer` | Integer field |
/// | `boolean` | Boolean field |
/// | `date`, `datetime` | Date or date-time field (chrono types) |
/// | `one = Model` | To-one relation (`Option<T>`, `Box<T>`, `Rc<T>`, `Arc<T>`) |
/// | `many = Model` | To-many relation (`Vec<T>`) |
/// | `required` | With `one`: the related record is stored directly as `T` |
/// | `pk` | The record's primary key; an integer field unless a kind is given |
/// | `choices = PATH` | Enumerated values, `&[(&str, &str)]` of `(value, label)` |
/// | `rename = "..."` | Use a custom name in filter paths |
/// | `skip` | Exclude this field |
///
/// Fields without `#[field(...)]` are not part of the model. Relation
/// targets may also be given as string literals (`one = "Publisher"`).
///
/// # Struct Attributes
///
/// `#[model(name = "...", verbose_name = "...")]` overrides the model name
/// (default: the struct name) and sets its human-readable name.
///
/// # Generated Code
///
/// 1. Field name constants (e.g. `Book::TITLE`)
/// 2. `Model::NAME` and `Model::model_def()`
/// 3. `Record::field()`, plus `Record::pk()` when a field is marked `pk`
///
/// A field named `name` gets the constant `NAME`, which shadows `Model::NAME`
/// on that type; write `<T as Model>::NAME` there.
///
/// # Example
///
/// ```ignore
/// use qfilter::{FieldIndex, Model, Schema};
///
/// const FORMATS: &[(&str, &str)] = &[("HC", "Hardcover"), ("PB", "Paperback")];
///
/// #[derive(Model)]
/// struct Publisher {
///     #[field(pk)]
///     id: i64,
///     #[field(char)]
///     name: String,
/// }
///
/// #[derive(Model)]
/// struct Book {
///     #[field(pk)]
///     id: i64,
///     #[field(char)]
///     title: String,
///     #[field(char, choices = FORMATS)]
///     format: String,
///     #[field(one = Publisher)]
///     publisher: Option<Publisher>,
/// }
///
/// let mut schema = Schema::new();
/// schema.register::<Book>().register::<Publisher>();
/// let index = FieldIndex::build(&schema, Book::NAME);
/// assert!(index.find_path("publisher.name").is_some());
/// ```
#[proc_macro_derive(Model, attributes(field, model))]
pub fn model_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    model::model_derive_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
