//! Attribute parsing for the Model derive macro.
//!
//! Fields are annotated with `#[field(...)]`, the struct itself with an
//! optional `#[model(...)]`.

use proc_macro2::Span;
use syn::{
    parse::{Parse, ParseStream},
    punctuated::Punctuated,
    spanned::Spanned,
    Attribute, Error, Expr, ExprLit, ExprPath, Ident, Lit, Meta, Path, Result, Token,
};

/// Scalar kind of a field: `#[field(text)]`, `#[field(integer)]`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Char,
    Text,
    Integer,
    Boolean,
    Date,
    DateTime,
}

impl ScalarKind {
    pub fn from_ident(ident: &Ident) -> Option<Self> {
        let kind = match ident.to_string().as_str() {
            "char" => ScalarKind::Char,
            "text" => ScalarKind::Text,
            "integer" => ScalarKind::Integer,
            "boolean" => ScalarKind::Boolean,
            "date" => ScalarKind::Date,
            "datetime" => ScalarKind::DateTime,
            _ => return None,
        };
        Some(kind)
    }

    /// The `qfilter::FieldKind` variant name.
    pub fn variant(self) -> &'static str {
        match self {
            ScalarKind::Char => "Char",
            ScalarKind::Text => "Text",
            ScalarKind::Integer => "Integer",
            ScalarKind::Boolean => "Boolean",
            ScalarKind::Date => "Date",
            ScalarKind::DateTime => "DateTime",
        }
    }
}

/// The model a relation points at.
#[derive(Debug, Clone)]
pub enum Target {
    /// `one = "Publisher"`
    Name(String),
    /// `one = Publisher`, resolved through `Model::NAME`.
    Type(Path),
}

/// What a field contributes to the model.
#[derive(Debug, Clone)]
pub enum FieldRole {
    Scalar(ScalarKind),
    One(Target),
    Many(Target),
}

/// Field-level attributes from `#[field(...)]`.
#[derive(Debug, Clone)]
pub struct FieldAttr {
    pub role: Option<FieldRole>,
    /// The record's primary key.
    pub pk: bool,
    /// A to-one relation stored directly rather than behind `Option`.
    pub required: bool,
    pub skip: bool,
    pub rename: Option<String>,
    /// Path to a `&[(&str, &str)]` of `(value, label)` pairs.
    pub choices: Option<Path>,
    pub span: Span,
}

impl Default for FieldAttr {
    fn default() -> Self {
        FieldAttr {
            role: None,
            pk: false,
            required: false,
            skip: false,
            rename: None,
            choices: None,
            span: Span::call_site(),
        }
    }
}

fn string_value(value: &Expr, what: &str) -> Result<String> {
    match value {
        Expr::Lit(ExprLit {
            lit: Lit::Str(s), ..
        }) => Ok(s.value()),
        other => Err(Error::new(
            other.span(),
            format!("{what} must be a string literal"),
        )),
    }
}

fn target_value(value: &Expr) -> Result<Target> {
    match value {
        Expr::Lit(ExprLit {
            lit: Lit::Str(s), ..
        }) => Ok(Target::Name(s.value())),
        Expr::Path(ExprPath { path, .. }) => Ok(Target::Type(path.clone())),
        other => Err(Error::new(
            other.span(),
            "relation target must be a model type or a string literal",
        )),
    }
}

impl FieldAttr {
    fn set_role(&mut self, role: FieldRole, span: Span) -> Result<()> {
        if self.role.is_some() {
            return Err(Error::new(span, "field kind given more than once"));
        }
        self.role = Some(role);
        self.span = span;
        Ok(())
    }
}

impl Parse for FieldAttr {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut attr = FieldAttr::default();

        let content: Punctuated<Meta, Token![,]> = Punctuated::parse_terminated(input)?;

        for meta in content {
            match &meta {
                Meta::Path(p) => {
                    if p.is_ident("skip") {
                        attr.skip = true;
                    } else if p.is_ident("pk") {
                        attr.pk = true;
                    } else if p.is_ident("required") {
                        attr.required = true;
                    } else if let Some(kind) = p.get_ident().and_then(ScalarKind::from_ident) {
                        attr.set_role(FieldRole::Scalar(kind), p.span())?;
                    } else {
                        return Err(Error::new(
                            p.span(),
                            "unknown field kind. Expected one of: char, text, integer, boolean, date, datetime",
                        ));
                    }
                }

                Meta::NameValue(nv) => {
                    if nv.path.is_ident("rename") {
                        attr.rename = Some(string_value(&nv.value, "rename")?);
                    } else if nv.path.is_ident("one") {
                        attr.set_role(FieldRole::One(target_value(&nv.value)?), nv.span())?;
                    } else if nv.path.is_ident("many") {
                        attr.set_role(FieldRole::Many(target_value(&nv.value)?), nv.span())?;
                    } else if nv.path.is_ident("choices") {
                        match &nv.value {
                            Expr::Path(ExprPath { path, .. }) => attr.choices = Some(path.clone()),
                            other => {
                                return Err(Error::new(other.span(), "choices must be a path"))
                            }
                        }
                    } else {
                        return Err(Error::new(
                            nv.path.span(),
                            "unknown attribute. Expected: rename, one, many or choices",
                        ));
                    }
                }

                _ => {
                    return Err(Error::new(
                        meta.span(),
                        "unknown field attribute. Expected a kind, one = ..., many = ..., pk, required, skip, rename = \"...\" or choices = ...",
                    ));
                }
            }
        }

        if attr.pk && attr.role.is_none() {
            attr.role = Some(FieldRole::Scalar(ScalarKind::Integer));
        }
        if attr.required && !matches!(attr.role, Some(FieldRole::One(_))) {
            return Err(Error::new(
                attr.span,
                "required only applies to to-one relations",
            ));
        }

        Ok(attr)
    }
}

/// Extract `#[field(...)]` attributes from a field's attributes.
pub fn parse_field_attrs(attrs: &[Attribute]) -> Result<FieldAttr> {
    for attr in attrs {
        if attr.path().is_ident("field") {
            return attr.parse_args::<FieldAttr>();
        }
    }
    Ok(FieldAttr::default())
}

/// Struct-level attributes from `#[model(...)]`.
#[derive(Debug, Clone, Default)]
pub struct ModelAttr {
    pub name: Option<String>,
    pub verbose_name: Option<String>,
}

impl Parse for ModelAttr {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut attr = ModelAttr::default();

        let content: Punctuated<Meta, Token![,]> = Punctuated::parse_terminated(input)?;

        for meta in content {
            match &meta {
                Meta::NameValue(nv) if nv.path.is_ident("name") => {
                    attr.name = Some(string_value(&nv.value, "name")?);
                }
                Meta::NameValue(nv) if nv.path.is_ident("verbose_name") => {
                    attr.verbose_name = Some(string_value(&nv.value, "verbose_name")?);
                }
                _ => {
                    return Err(Error::new(
                        meta.span(),
                        "unknown model attribute. Expected: name = \"...\" or verbose_name = \"...\"",
                    ));
                }
            }
        }

        Ok(attr)
    }
}

/// Extract the `#[model(...)]` attribute of a struct.
pub fn parse_model_attrs(attrs: &[Attribute]) -> Result<ModelAttr> {
    for attr in attrs {
        if attr.path().is_ident("model") {
            return attr.parse_args::<ModelAttr>();
        }
    }
    Ok(ModelAttr::default())
}
