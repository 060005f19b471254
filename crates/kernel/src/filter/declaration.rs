//! Declarative filter configuration.
//!
//! Filters are declared in the schema by identifier and built-in kind; each
//! backend turns a declaration into its own implementation.

use serde::{Deserialize, Serialize};

use super::request::FilterProperties;

/// Built-in filter kinds available on both backends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Search,
    Boolean,
    Range,
    Exists,
    Order,
}

/// A filter declaration from the schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterDeclaration {
    /// Identifier referenced by operations (e.g. `book.search`).
    pub id: String,

    pub kind: FilterKind,

    #[serde(default)]
    pub properties: FilterProperties,
}

impl FilterDeclaration {
    pub fn new(id: &str, kind: FilterKind, properties: FilterProperties) -> Self {
        Self {
            id: id.to_string(),
            kind,
            properties,
        }
    }
}
