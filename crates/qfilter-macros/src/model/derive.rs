//! Implementation of the `#[derive(Model)]` macro.
//!
//! Generates `qfilter::Model` (the schema description), `qfilter::Record`
//! (field access for in-memory evaluation) and field name constants.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{spanned::Spanned, Data, DeriveInput, Error, Fields, Result};

use super::attrs::{parse_field_attrs, parse_model_attrs, FieldRole, Target};

/// Main implementation of the Model derive macro.
pub fn model_derive_impl(input: DeriveInput) -> Result<TokenStream> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(Error::new(
                    input.span(),
                    "Model can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new(
                input.span(),
                "Model can only be derived for structs",
            ))
        }
    };

    let model_attrs = parse_model_attrs(&input.attrs)?;
    let model_name = model_attrs
        .name
        .unwrap_or_else(|| struct_name.to_string());
    let verbose_name = model_attrs.verbose_name.map(|verbose| {
        quote! { .with_verbose_name(#verbose) }
    });

    let mut field_defs: Vec<TokenStream> = Vec::new();
    let mut field_matches: Vec<TokenStream> = Vec::new();
    let mut field_constants: Vec<TokenStream> = Vec::new();
    let mut pk_expr: Option<TokenStream> = None;

    for field in fields.iter() {
        let field_name = field
            .ident
            .as_ref()
            .ok_or_else(|| Error::new(field.span(), "expected named field"))?;

        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }

        if attrs.pk {
            if pk_expr.is_some() {
                return Err(Error::new(field.span(), "only one field can be the pk"));
            }
            pk_expr = Some(quote! {
                ::qfilter::ToRecordValue::to_record_value(&self.#field_name).as_integer()
            });
        }

        let Some(role) = attrs.role else {
            continue;
        };

        let query_name = attrs.rename.unwrap_or_else(|| field_name.to_string());
        let const_name = format_ident!("{}", to_screaming_snake_case(&query_name));

        field_constants.push(quote! {
            /// Field name constant for filter paths.
            pub const #const_name: &'static str = #query_name;
        });

        let def = match &role {
            FieldRole::Scalar(kind) => {
                let variant = format_ident!("{}", kind.variant());
                quote! { ::qfilter::FieldDef::new(#query_name, ::qfilter::FieldKind::#variant) }
            }
            FieldRole::One(target) => {
                let target = target_tokens(target);
                quote! {
                    ::qfilter::FieldDef::relation(#query_name, ::qfilter::FieldKind::ForeignKey, #target)
                }
            }
            FieldRole::Many(target) => {
                let target = target_tokens(target);
                quote! {
                    ::qfilter::FieldDef::relation(#query_name, ::qfilter::FieldKind::ManyToMany, #target)
                }
            }
        };
        let choices = attrs.choices.map(|path| {
            quote! { .with_choices(::qfilter::Choice::from_pairs(#path)) }
        });
        field_defs.push(quote! { #def #choices });

        let value_expr = match &role {
            FieldRole::Scalar(_) => {
                quote! { ::qfilter::ToRecordValue::to_record_value(&self.#field_name) }
            }
            FieldRole::One(_) if attrs.required => {
                quote! {
                    ::qfilter::RecordValue::One(::core::option::Option::Some(
                        &self.#field_name as &dyn ::qfilter::Record
                    ))
                }
            }
            FieldRole::One(_) => {
                quote! { ::qfilter::RecordValue::One(::qfilter::ToOne::to_one(&self.#field_name)) }
            }
            FieldRole::Many(_) => {
                quote! { ::qfilter::RecordValue::Many(::qfilter::ToMany::to_many(&self.#field_name)) }
            }
        };
        field_matches.push(quote! {
            #query_name => #value_expr,
        });
    }

    let pk_fn = pk_expr.map(|expr| {
        quote! {
            fn pk(&self) -> ::core::option::Option<i64> {
                #expr
            }
        }
    });

    let expanded = quote! {
        impl #impl_generics #struct_name #ty_generics #where_clause {
            #(#field_constants)*
        }

        impl #impl_generics ::qfilter::Model for #struct_name #ty_generics #where_clause {
            const NAME: &'static str = #model_name;

            fn model_def() -> ::qfilter::ModelDef {
                ::qfilter::ModelDef::new(
                    #model_name,
                    ::std::vec![#(#field_defs),*],
                )
                #verbose_name
            }
        }

        impl #impl_generics ::qfilter::Record for #struct_name #ty_generics #where_clause {
            fn field(&self, name: &str) -> ::qfilter::RecordValue<'_> {
                match name {
                    #(#field_matches)*
                    _ => ::qfilter::RecordValue::Missing,
                }
            }

            #pk_fn
        }
    };

    Ok(expanded)
}

fn target_tokens(target: &Target) -> TokenStream {
    match target {
        Target::Name(name) => quote! { #name },
        Target::Type(path) => quote! { <#path as ::qfilter::Model>::NAME },
    }
}

/// Convert a string to SCREAMING_SNAKE_CASE.
fn to_screaming_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut prev_was_lower = false;

    for c in s.chars() {
        if c.is_uppercase() {
            if prev_was_lower {
                result.push('_');
            }
            result.push(c);
            prev_was_lower = false;
        } else if c == '_' || c == '-' {
            result.push('_');
            prev_was_lower = false;
        } else {
            result.push(c.to_ascii_uppercase());
            prev_was_lower = true;
        }
    }

    result
}
