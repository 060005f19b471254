use serde_json::{Value, json};

use super::resolve_target;
use crate::context::QueryContext;
use crate::document::lookup::add_optional_lookup;
use crate::document::pipeline::Pipeline;
use crate::error::QueryResult;
use crate::filter::{Filter, FilterProperties, parse_boolean};
use crate::operation::Operation;
use crate::property;

const EXISTS_PARAMETER: &str = "exists";

#[derive(Debug, Clone, Default)]
pub struct ExistsFilter {
    properties: FilterProperties,
}

impl ExistsFilter {
    pub fn new(properties: FilterProperties) -> Self {
        Self { properties }
    }
}

impl Filter<Pipeline> for ExistsFilter {
    fn apply(
        &self,
        pipeline: &mut Pipeline,
        resource: &str,
        _operation: &Operation,
        ctx: &mut QueryContext,
    ) -> QueryResult<()> {
        let Some(Value::Object(checks)) = ctx.filter(EXISTS_PARAMETER) else {
            return Ok(());
        };
        let registry = pipeline.registry();

        for (property, value) in checks {
            if !self.properties.is_enabled(&registry, resource, property)
                || !property::is_property_mapped(&registry, resource, property, true)
            {
                continue;
            }
            let Some(exists) = parse_boolean(value) else {
                tracing::info!(property = %property, %value, "invalid exists value, expected one of true, false, 1, 0");
                continue;
            };
            let Some(parts) = property::split_property(&registry, resource, property) else {
                continue;
            };
            let Some(owner) = property::nested_metadata(&registry, resource, &parts.associations) else {
                continue;
            };
            let Some(target) = resolve_target(pipeline, resource, property)? else {
                continue;
            };

            let path = match owner.relation(&parts.field) {
                Some(relation) if !relation.embedded && !relation.is_owning_side() => {
                    let prefix = add_optional_lookup(pipeline, owner, &parts.field, &target.path.prefix)?;
                    format!("{prefix}_id")
                }
                _ => target.path.path,
            };
            let condition = if exists {
                json!({ "$ne": null })
            } else {
                json!({ "$eq": null })
            };
            pipeline.add_match(&path, condition);
        }
        Ok(())
    }
}
