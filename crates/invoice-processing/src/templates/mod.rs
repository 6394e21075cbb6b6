//! Deletion templates.
//!
//! A template is a named list of columns that a user removes from every
//! export of a given platform. [`TemplateStore`] keeps them as JSON and
//! [`TemplateMatcher`] maps their names onto the headers of a concrete
//! dataset.

mod matcher;
mod store;

pub use matcher::TemplateMatcher;
pub use store::{DEFAULT_TEMPLATE_COLUMNS, DEFAULT_TEMPLATE_NAME, Template, TemplateStore};
