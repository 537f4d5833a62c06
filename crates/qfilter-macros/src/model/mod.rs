//! Implementation of the `#[derive(Model)]` macro.
//!
//! Generates the schema description, record access and field name
//! constants of a struct from its annotations.

mod attrs;
mod derive;

pub use derive::model_derive_impl;
