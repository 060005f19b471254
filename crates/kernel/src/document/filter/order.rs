use serde_json::Value;

use super::resolve_target;
use crate::context::QueryContext;
use crate::document::pipeline::Pipeline;
use crate::error::QueryResult;
use crate::filter::{Filter, FilterCapabilities, FilterProperties};
use crate::operation::{Operation, SortDirection};
use crate::pagination::OrderOptions;
use crate::property;

/// `order[prop]=asc|desc`, merged into the single `$sort` stage.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    properties: FilterProperties,
    options: OrderOptions,
}

impl OrderFilter {
    pub fn new(properties: FilterProperties, options: OrderOptions) -> Self {
        Self {
            properties,
            options,
        }
    }
}

/// Add `path` to the context's sort fields unless already sorted on, then
/// rewrite the pipeline's `$sort` stage.
pub(crate) fn merge_sort(pipeline: &mut Pipeline, ctx: &mut QueryContext, path: String, direction: SortDirection) {
    if !ctx.sort_fields.iter().any(|(field, _)| *field == path) {
        ctx.sort_fields.push((path, direction));
    }
    pipeline.set_sort(&ctx.sort_fields);
}

impl Filter<Pipeline> for OrderFilter {
    fn apply(
        &self,
        pipeline: &mut Pipeline,
        resource: &str,
        _operation: &Operation,
        ctx: &mut QueryContext,
    ) -> QueryResult<()> {
        let Some(Value::Object(order)) = ctx.filter(&self.options.order_parameter_name).cloned() else {
            return Ok(());
        };
        let registry = pipeline.registry();

        for (property, value) in &order {
            if !self.properties.is_enabled(&registry, resource, property)
                || !property::is_property_mapped(&registry, resource, property, false)
            {
                continue;
            }
            let raw = match value.as_str().map(str::trim) {
                Some("") | None => match self.properties.setting(property) {
                    Some(setting) => setting,
                    None => continue,
                },
                Some(raw) => raw,
            };
            let direction: SortDirection = match raw.parse() {
                Ok(direction) => direction,
                Err(e) => {
                    tracing::info!(property = %property, error = %e, "ignoring order parameter");
                    continue;
                }
            };
            if let Some(target) = resolve_target(pipeline, resource, property)? {
                merge_sort(pipeline, ctx, target.path.path, direction);
            }
        }
        Ok(())
    }

    fn capabilities(&self) -> FilterCapabilities {
        FilterCapabilities {
            sorts: true,
            ..FilterCapabilities::default()
        }
    }
}
