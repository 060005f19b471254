//! Per-request query context threaded through the extension chain.
//!
//! Field ownership:
//! - `filters`: written by the caller, read by filters and pagination
//! - `graphql_operation`: written by the caller, read by pagination
//! - `sort_fields`: written by the order filter and order extension (document
//!   backend), read by the order extension
//! - `count`: written by pagination for graph `last` requests, read by the
//!   offset computation

use serde_json::{Map, Value};

use crate::operation::SortDirection;

/// Mutable state for one query-building pass.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    /// Request parameters, nested the way `a[b]=c` query strings decode.
    pub filters: Map<String, Value>,

    /// Set when the request comes from the graph-query layer.
    pub graphql_operation: Option<String>,

    /// Sort fields already applied to the pipeline.
    pub sort_fields: Vec<(String, SortDirection)>,

    /// Total count computed ahead of pagination.
    pub count: Option<u64>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filters(filters: Map<String, Value>) -> Self {
        Self {
            filters,
            ..Self::default()
        }
    }

    /// Build a context from raw query-string pairs.
    ///
    /// `order[title]=asc` nests into `{"order": {"title": "asc"}}` and
    /// `tags[]=a&tags[]=b` collects into an array.
    pub fn from_query_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut filters = Map::new();
        for (key, value) in pairs {
            insert_query_pair(&mut filters, key, value);
        }
        Self::with_filters(filters)
    }

    pub fn for_graphql(mut self, operation_name: &str) -> Self {
        self.graphql_operation = Some(operation_name.to_string());
        self
    }

    pub fn is_graphql(&self) -> bool {
        self.graphql_operation.is_some()
    }

    pub fn filter(&self, name: &str) -> Option<&Value> {
        self.filters.get(name)
    }
}

fn insert_query_pair(filters: &mut Map<String, Value>, key: &str, value: &str) {
    let Some(open) = key.find('[') else {
        filters.insert(key.to_string(), Value::String(value.to_string()));
        return;
    };
    let (name, rest) = key.split_at(open);
    let inner = rest.strip_prefix('[').unwrap_or(rest);
    let inner = inner.strip_suffix(']').unwrap_or(inner);
    let segments: Vec<&str> = inner.split("][").collect();
    insert_nested(filters, name, &segments, value);
}

/// Insert `value` under `name`, descending through bracket `segments`.
/// An empty segment appends to an array.
fn insert_nested(filters: &mut Map<String, Value>, name: &str, segments: &[&str], value: &str) {
    let Some((segment, rest)) = segments.split_first() else {
        filters.insert(name.to_string(), Value::String(value.to_string()));
        return;
    };

    if segment.is_empty() {
        let entry = filters
            .entry(name.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(items) => items.push(Value::String(value.to_string())),
            other => {
                let previous = std::mem::take(other);
                *other = Value::Array(vec![previous, Value::String(value.to_string())]);
            }
        }
        return;
    }

    let entry = filters
        .entry(name.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(nested) = entry {
        insert_nested(nested, segment, rest, value);
    }
}
