use super::resolve_target;
use crate::context::QueryContext;
use crate::error::QueryResult;
use crate::filter::{Filter, FilterProperties, parse_boolean};
use crate::metadata::FieldType;
use crate::operation::Operation;
use crate::property;
use crate::relational::builder::QueryBuilder;

/// `prop=true|false|1|0` on boolean fields.
#[derive(Debug, Clone, Default)]
pub struct BooleanFilter {
    properties: FilterProperties,
}

impl BooleanFilter {
    pub fn new(properties: FilterProperties) -> Self {
        Self { properties }
    }
}

impl Filter<QueryBuilder> for BooleanFilter {
    fn apply(
        &self,
        builder: &mut QueryBuilder,
        resource: &str,
        _operation: &Operation,
        ctx: &mut QueryContext,
    ) -> QueryResult<()> {
        let registry = builder.registry();
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
            if let Some(target) = resolve_target(builder, resource, property, None)? {
                builder.and_where(target.expr().eq(flag));
            }
        }
        Ok(())
    }
}
