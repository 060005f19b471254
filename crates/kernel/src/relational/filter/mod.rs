//! Built-in relational filters.

mod boolean;
mod exists;
mod order;
mod range;
mod search;

pub use boolean::BooleanFilter;
pub use exists::ExistsFilter;
pub use order::OrderFilter;
pub use range::RangeFilter;
pub use search::SearchFilter;

use serde_json::Value;
use std::sync::Arc;

use super::builder::{JoinKind, QueryBuilder};
use super::join;
use crate::error::QueryResult;
use crate::filter::{Filter, FilterDeclaration, FilterKind};
use crate::metadata::FieldType;
use crate::pagination::OrderOptions;
use crate::property;

/// Build the relational implementation of a declared filter.
pub fn build_filter(declaration: &FilterDeclaration, order: &OrderOptions) -> Arc<dyn Filter<QueryBuilder>> {
    let properties = declaration.properties.clone();
    match declaration.kind {
        FilterKind::Search => Arc::new(SearchFilter::new(properties)),
        FilterKind::Boolean => Arc::new(BooleanFilter::new(properties)),
        FilterKind::Range => Arc::new(RangeFilter::new(properties)),
        FilterKind::Exists => Arc::new(ExistsFilter::new(properties)),
        FilterKind::Order => Arc::new(OrderFilter::new(properties, order.clone())),
    }
}

/// Column a filtered property resolves to.
pub(crate) struct Target {
    pub alias: String,
    pub column: String,
    pub field_type: Option<FieldType>,
}

impl Target {
    pub fn expr(&self) -> sea_query::Expr {
        QueryBuilder::column(&self.alias, &self.column)
    }
}

/// Join what `property` needs and return its column.
pub(crate) fn resolve_target(
    builder: &mut QueryBuilder,
    resource: &str,
    property: &str,
    kind: Option<JoinKind>,
) -> QueryResult<Option<Target>> {
    let field_type = property::field_type(builder.metadata(), resource, property);
    let root = builder.root_alias().to_string();
    let nested = join::add_joins_for_nested_property(builder, property, &root, resource, kind)?;
    Ok(nested.map(|nested| Target {
        alias: nested.alias,
        column: nested.column,
        field_type,
    }))
}

/// Convert a typed JSON request value into a bound SQL value.
pub(crate) fn sql_value(value: &Value) -> sea_query::Value {
    match value {
        Value::Bool(b) => (*b).into(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.into(),
            None => n.as_f64().unwrap_or_default().into(),
        },
        Value::String(s) => s.clone().into(),
        other => other.to_string().into(),
    }
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
pub(crate) fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
