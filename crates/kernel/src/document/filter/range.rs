use serde_json::{Map, Value};

use super::resolve_target;
use crate::context::QueryContext;
use crate::document::pipeline::Pipeline;
use crate::error::QueryResult;
use crate::filter::{Filter, FilterProperties, RangeCondition, RangeOperator};
use crate::operation::Operation;
use crate::property;

#[derive(Debug, Clone, Default)]
pub struct RangeFilter {
    properties: FilterProperties,
}

impl RangeFilter {
    pub fn new(properties: FilterProperties) -> Self {
        Self { properties }
    }
}

fn condition(condition: RangeCondition) -> Value {
    let mut operators = Map::new();
    match condition {
        RangeCondition::Equal(n) => return Value::Number(n),
        RangeCondition::Between(low, high) => {
            operators.insert("$gte".to_string(), Value::Number(low));
            operators.insert("$lte".to_string(), Value::Number(high));
        }
        RangeCondition::Compare(operator, n) => {
            let key = match operator {
                RangeOperator::Lt => "$lt",
                RangeOperator::Lte => "$lte",
                RangeOperator::Gt => "$gt",
                RangeOperator::Gte | RangeOperator::Between => "$gte",
            };
            operators.insert(key.to_string(), Value::Number(n));
        }
    }
    Value::Object(operators)
}

impl Filter<Pipeline> for RangeFilter {
    fn apply(
        &self,
        pipeline: &mut Pipeline,
        resource: &str,
        _operation: &Operation,
        ctx: &mut QueryContext,
    ) -> QueryResult<()> {
        let registry = pipeline.registry();
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
                let (Ok(operator), Some(raw)) = (operator.parse::<RangeOperator>(), raw.as_str()) else {
                    continue;
                };
                match RangeCondition::parse(operator, raw) {
                    Some(parsed) => conditions.push(parsed),
                    None => {
                        tracing::info!(property = %property, value = raw, "invalid range bound, expected a number");
                    }
                }
            }
            if conditions.is_empty() {
                continue;
            }

            if let Some(target) = resolve_target(pipeline, resource, property)? {
                for parsed in conditions {
                    pipeline.add_match(&target.path.path, condition(parsed));
                }
            }
        }
        Ok(())
    }
}
