use serde_json::Value;

use super::resolve_target;
use crate::context::QueryContext;
use crate::document::pipeline::Pipeline;
use crate::error::QueryResult;
use crate::filter::{Filter, FilterProperties, parse_boolean};
use crate::metadata::FieldType;
use crate::operation::Operation;
use crate::property;

#[derive(Debug, Clone, Default)]
pub struct BooleanFilter {
    properties: FilterProperties,
}

impl BooleanFilter {
    pub fn new(properties: FilterProperties) -> Self {
        Self { properties }
    }
}

impl Filter<Pipeline> for BooleanFilter {
    fn apply(
        &self,
        pipeline: &mut Pipeline,
        resource: &str,
        _operation: &Operation,
        ctx: &mut QueryContext,
    ) -> QueryResult<()> {
        let registry = pipeline.registry();
        for (property, value) in &ctx.filters {
            if !self.properties.is_enabled(&registry, resource, property)
                || property::field_type(&registry, resource, property) != Some(FieldType::Boolean)
            {
                continue;
            }
            let Some(flag) = parse_boolean(value) else {
                tracing::info!(property = %property, %value, "invalid boolean value, expected one of true, false, 1, 0");
                continue;
            };
            if let Some(target) = resolve_target(pipeline, resource, property)? {
                pipeline.add_match(&target.path.path, Value::Bool(flag));
            }
        }
        Ok(())
    }
}
