//! Collection provider for relational resources.

use std::sync::Arc;

use super::builder::QueryBuilder;
use super::filter::build_filter;
use super::order::OrderExtension;
use super::pagination::PaginationExtension;
use crate::context::QueryContext;
use crate::error::QueryResult;
use crate::extension::{CollectionResult, ExtensionChain};
use crate::filter::{FilterExtension, FilterRegistry};
use crate::manager::{ManagerRegistry, relational_connection};
use crate::metadata::MetadataRegistry;
use crate::operation::Operation;
use crate::pagination::{OrderOptions, Pagination};
use crate::schema::Schema;

/// Filter, order and pagination, in that order.
pub fn default_chain(
    filters: Arc<FilterRegistry<QueryBuilder>>,
    order: OrderOptions,
    managers: Arc<dyn ManagerRegistry>,
    pagination: Pagination,
) -> ExtensionChain<QueryBuilder> {
    ExtensionChain::new()
        .with(Arc::new(FilterExtension::new(filters)))
        .with(Arc::new(OrderExtension::new(order)))
        .with(Arc::new(PaginationExtension::new(managers, pagination)))
}

/// Filter registry holding the relational implementation of every declared filter.
pub fn filter_registry(schema: &Schema, order: &OrderOptions) -> FilterRegistry<QueryBuilder> {
    let mut registry = FilterRegistry::new();
    for warning in registry.apply_declarations(&schema.filters, |declaration| build_filter(declaration, order)) {
        tracing::warn!("{warning}");
    }
    registry
}

/// Builds a query per request, runs the extension chain and executes it.
pub struct CollectionProvider {
    metadata: Arc<MetadataRegistry>,
    managers: Arc<dyn ManagerRegistry>,
    extensions: ExtensionChain<QueryBuilder>,
}

impl CollectionProvider {
    pub fn new(
        metadata: Arc<MetadataRegistry>,
        managers: Arc<dyn ManagerRegistry>,
        extensions: ExtensionChain<QueryBuilder>,
    ) -> Self {
        Self {
            metadata,
            managers,
            extensions,
        }
    }

    pub fn provide(&self, operation: &Operation, ctx: &mut QueryContext) -> QueryResult<CollectionResult> {
        let resource = operation.resource.as_str();
        let mut builder = QueryBuilder::new(Arc::clone(&self.metadata), resource)?;
        self.extensions
            .run(&mut builder, resource, operation, ctx, |builder| {
                let connection = relational_connection(self.managers.as_ref(), resource)?;
                Ok(connection.fetch_rows(&builder.to_sql()?)?)
            })
    }

    /// Run the chain without executing; the caller renders the builder.
    pub fn explain(&self, operation: &Operation, ctx: &mut QueryContext) -> QueryResult<QueryBuilder> {
        let resource = operation.resource.as_str();
        let mut builder = QueryBuilder::new(Arc::clone(&self.metadata), resource)?;
        self.extensions.apply(&mut builder, resource, operation, ctx)?;
        Ok(builder)
    }
}
