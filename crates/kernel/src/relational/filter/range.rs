use serde_json::Value;

use super::{resolve_target, sql_value};
use crate::context::QueryContext;
use crate::error::QueryResult;
use crate::filter::{Filter, FilterProperties, RangeCondition, RangeOperator};
use crate::operation::Operation;
use crate::property;
use crate::relational::builder::QueryBuilder;

/// `prop[lt|lte|gt|gte|between]=v` on numeric columns.
#[derive(Debug, Clone, Default)]
pub struct RangeFilter {
    properties: FilterProperties,
}

impl RangeFilter {
    pub fn new(properties: FilterProperties) -> Self {
        Self { properties }
    }
}

fn number(n: &serde_json::Number) -> sea_query::Value {
    sql_value(&Value::Number(n.clone()))
}

impl Filter<QueryBuilder> for RangeFilter {
    fn apply(
        &self,
        builder: &mut QueryBuilder,
        resource: &str,
        _operation: &Operation,
        ctx: &mut QueryContext,
    ) -> QueryResult<()> {
        let registry = builder.registry();
        for (property, value) in &ctx.filters {
            let Value::Object(bounds) = value else {
                continue;
            };
            if !self.properties.is_enabled(&registry, resource, property)
                || !property::is_property_mapped(&registry, resource, property, false)
            {
                continue;
            }

            let mut conditions = Vec::new();
            for (operator, raw) in bounds {
                let Ok(operator) = operator.parse::<RangeOperator>() else {
                    continue;
                };
                let Some(raw) = raw.as_str() else {
                    continue;
                };
                match RangeCondition::parse(operator, raw) {
                    Some(condition) => conditions.push(condition),
                    None => {
                        tracing::info!(property = %property, value = raw, "invalid range bound, expected a number");
                    }
                }
            }
            if conditions.is_empty() {
                continue;
            }

            let Some(target) = resolve_target(builder, resource, property, None)? else {
                continue;
            };
            for condition in conditions {
                let column = target.expr();
                let expr = match condition {
                    RangeCondition::Equal(n) => column.eq(number(&n)),
                    RangeCondition::Between(low, high) => column.between(number(&low), number(&high)),
                    RangeCondition::Compare(RangeOperator::Lt, n) => column.lt(number(&n)),
                    RangeCondition::Compare(RangeOperator::Lte, n) => column.lte(number(&n)),
                    RangeCondition::Compare(RangeOperator::Gt, n) => column.gt(number(&n)),
                    RangeCondition::Compare(RangeOperator::Gte | RangeOperator::Between, n) => {
                        column.gte(number(&n))
                    }
                };
                builder.and_where(expr);
            }
        }
        Ok(())
    }
}
