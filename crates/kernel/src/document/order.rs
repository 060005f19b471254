//! Default ordering for document collections.

use super::filter::merge_sort;
use super::lookup::add_lookups_for_nested_property;
use super::pipeline::{Pipeline, document_field};
use crate::context::QueryContext;
use crate::error::QueryResult;
use crate::extension::QueryCollectionExtension;
use crate::operation::Operation;
use crate::pagination::OrderOptions;

#[derive(Debug, Clone, Default)]
pub struct OrderExtension {
    options: OrderOptions,
}

impl OrderExtension {
    pub fn new(options: OrderOptions) -> Self {
        Self { options }
    }
}

/// Whether a `$sort` stage is already present, probing stages by index.
fn has_sort_stage(pipeline: &Pipeline) -> bool {
    let mut index = 0;
    while let Some(stage) = pipeline.stage(index) {
        if stage.is_sort() {
            return true;
        }
        index += 1;
    }
    false
}

impl QueryCollectionExtension<Pipeline> for OrderExtension {
    fn apply_to_collection(
        &self,
        pipeline: &mut Pipeline,
        resource: &str,
        operation: &Operation,
        ctx: &mut QueryContext,
    ) -> QueryResult<()> {
        if has_sort_stage(pipeline) {
            return Ok(());
        }
        let registry = pipeline.registry();
        let Some(metadata) = registry.get(resource) else {
            return Ok(());
        };

        if !operation.order.is_empty() {
            for entry in operation.order.iter() {
                match add_lookups_for_nested_property(pipeline, &entry.property, resource)? {
                    Some(path) => merge_sort(pipeline, ctx, path.path, entry.direction),
                    None => {
                        tracing::debug!(resource, property = %entry.property, "cannot resolve default order property");
                    }
                }
            }
            return Ok(());
        }

        if let Some(direction) = self.options.default_direction {
            for identifier in &metadata.identifiers {
                merge_sort(pipeline, ctx, document_field(metadata, identifier), direction);
            }
        }
        Ok(())
    }
}
