//! Built-in document filters.

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

pub(crate) use order::merge_sort;

use std::sync::Arc;

use super::lookup::{LookupPath, add_lookups_for_nested_property};
use super::pipeline::Pipeline;
use crate::error::QueryResult;
use crate::filter::{Filter, FilterDeclaration, FilterKind};
use crate::metadata::FieldType;
use crate::pagination::OrderOptions;
use crate::property;

/// Build the document implementation of a declared filter.
pub fn build_filter(declaration: &FilterDeclaration, order: &OrderOptions) -> Arc<dyn Filter<Pipeline>> {
    let properties = declaration.properties.clone();
    match declaration.kind {
        FilterKind::Search => Arc::new(SearchFilter::new(properties)),
        FilterKind::Boolean => Arc::new(BooleanFilter::new(properties)),
        FilterKind::Range => Arc::new(RangeFilter::new(properties)),
        FilterKind::Exists => Arc::new(ExistsFilter::new(properties)),
        FilterKind::Order => Arc::new(OrderFilter::new(properties, order.clone())),
    }
}

pub(crate) struct Target {
    pub path: LookupPath,
    pub field_type: Option<FieldType>,
}

/// Add the lookups `property` needs and return its document path.
pub(crate) fn resolve_target(
    pipeline: &mut Pipeline,
    resource: &str,
    property: &str,
) -> QueryResult<Option<Target>> {
    let field_type = property::field_type(pipeline.metadata(), resource, property);
    Ok(add_lookups_for_nested_property(pipeline, property, resource)?
        .map(|path| Target { path, field_type }))
}
