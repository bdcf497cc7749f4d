#![forbid(unsafe_code)]

//! Template engine and lean-variant resolver.
//!
//! - [`Template`] compiles `{{name}}`, `{{#if}}` and `{{#each}}` markers once
//!   and renders them against a [`TemplateData`] mapping.
//! - [`VariantMap`] resolves per-element lean text, and [`apply_variants`]
//!   rewrites a rendered subtree for the active level.
//!
//! Rendered output is trusted markup: no escaping is applied. Callers must
//! not feed user input through either engine.

pub mod compile;
pub mod value;
pub mod variant;

pub use compile::{BlockKind, Malformed, Template, render};
pub use value::{ShapeError, TemplateData, Value};
pub use variant::{Resolution, VariantMap, apply_variants, resolve};
