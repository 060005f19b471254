//! Collection provider for document resources.

use std::sync::Arc;

use super::filter::build_filter;
use super::order::OrderExtension;
use super::pagination::PaginationExtension;
use super::pipeline::Pipeline;
use crate::context::QueryContext;
use crate::error::QueryResult;
use crate::extension::{CollectionResult, ExtensionChain};
use crate::filter::{FilterExtension, FilterRegistry};
use crate::manager::{ManagerRegistry, document_connection};
use crate::metadata::MetadataRegistry;
use crate::operation::Operation;
use crate::pagination::{OrderOptions, Pagination};
use crate::schema::Schema;

/// Filter, order and pagination, in that order.
pub fn default_chain(
    filters: Arc<FilterRegistry<Pipeline>>,
    order: OrderOptions,
    managers: Arc<dyn ManagerRegistry>,
    pagination: Pagination,
) -> ExtensionChain<Pipeline> {
    ExtensionChain::new()
        .with(Arc::new(FilterExtension::new(filters)))
        .with(Arc::new(OrderExtension::new(order)))
        .with(Arc::new(PaginationExtension::new(managers, pagination)))
}

pub fn filter_registry(schema: &Schema, order: &OrderOptions) -> FilterRegistry<Pipeline> {
    let mut registry = FilterRegistry::new();
    for warning in registry.apply_declarations(&schema.filters, |declaration| build_filter(declaration, order)) {
        tracing::warn!("{warning}");
    }
    registry
}

pub struct CollectionProvider {
    metadata: Arc<MetadataRegistry>,
    managers: Arc<dyn ManagerRegistry>,
    extensions: ExtensionChain<Pipeline>,
}

impl CollectionProvider {
    pub fn new(
        metadata: Arc<MetadataRegistry>,
        managers: Arc<dyn ManagerRegistry>,
        extensions: ExtensionChain<Pipeline>,
    ) -> Self {
        Self {
            metadata,
            managers,
            extensions,
        }
    }

    pub fn provide(&self, operation: &Operation, ctx: &mut QueryContext) -> QueryResult<CollectionResult> {
        let resource = operation.resource.as_str();
        let mut pipeline = Pipeline::new(Arc::clone(&self.metadata), resource)?;
        self.extensions
            .run(&mut pipeline, resource, operation, ctx, |pipeline| {
                let connection = document_connection(self.managers.as_ref(), resource)?;
                Ok(connection.aggregate(pipeline.collection(), &pipeline.to_documents())?)
            })
    }

    pub fn explain(&self, operation: &Operation, ctx: &mut QueryContext) -> QueryResult<Pipeline> {
        let resource = operation.resource.as_str();
        let mut pipeline = Pipeline::new(Arc::clone(&self.metadata), resource)?;
        self.extensions.apply(&mut pipeline, resource, operation, ctx)?;
        Ok(pipeline)
    }
}
