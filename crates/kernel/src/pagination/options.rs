//! Global pagination and ordering options.

use serde::{Deserialize, Serialize};

use crate::operation::SortDirection;

/// Backend-wide pagination defaults and request parameter names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PaginationOptions {
    pub enabled: bool,
    pub client_enabled: bool,
    pub client_items_per_page: bool,
    pub items_per_page: i64,
    pub maximum_items_per_page: Option<i64>,
    pub page_parameter_name: String,
    pub enabled_parameter_name: String,
    pub items_per_page_parameter_name: String,
    pub partial: bool,
    pub client_partial: bool,
    pub partial_parameter_name: String,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            client_enabled: false,
            client_items_per_page: false,
            items_per_page: 30,
            maximum_items_per_page: None,
            page_parameter_name: "page".to_string(),
            enabled_parameter_name: "pagination".to_string(),
            items_per_page_parameter_name: "itemsPerPage".to_string(),
            partial: false,
            client_partial: false,
            partial_parameter_name: "partial".to_string(),
        }
    }
}

/// Pagination policy for graph-query collection fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GraphQlPaginationOptions {
    pub enabled: bool,
}

impl Default for GraphQlPaginationOptions {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Ordering defaults shared by the order extension and order filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OrderOptions {
    /// Fallback direction applied to identifiers when no default order is declared.
    pub default_direction: Option<SortDirection>,
    pub order_parameter_name: String,
}

impl Default for OrderOptions {
    fn default() -> Self {
        Self {
            default_direction: None,
            order_parameter_name: "order".to_string(),
        }
    }
}
