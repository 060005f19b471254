use serde_json::Value;

use super::resolve_target;
use crate::context::QueryContext;
use crate::error::QueryResult;
use crate::filter::{Filter, FilterCapabilities, FilterProperties};
use crate::operation::{Operation, SortDirection};
use crate::pagination::OrderOptions;
use crate::property;
use crate::relational::builder::{JoinKind, QueryBuilder};

/// `order[prop]=asc|desc`. The property setting is the direction used for an
/// empty value.
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

/// Requested direction, falling back to the property's configured default.
pub(crate) fn requested_direction(
    properties: &FilterProperties,
    property: &str,
    value: &Value,
) -> Option<SortDirection> {
    let raw = match value.as_str().map(str::trim) {
        Some("") | None => properties.setting(property)?,
        Some(raw) => raw,
    };
    match raw.parse() {
        Ok(direction) => Some(direction),
        Err(e) => {
            tracing::info!(property, error = %e, "ignoring order parameter");
            None
        }
    }
}

impl Filter<QueryBuilder> for OrderFilter {
    fn apply(
        &self,
        builder: &mut QueryBuilder,
        resource: &str,
        _operation: &Operation,
        ctx: &mut QueryContext,
    ) -> QueryResult<()> {
        let Some(Value::Object(order)) = ctx.filter(&self.options.order_parameter_name) else {
            return Ok(());
        };
        let registry = builder.registry();

        for (property, value) in order {
            if !self.properties.is_enabled(&registry, resource, property)
                || !property::is_property_mapped(&registry, resource, property, false)
            {
                continue;
            }
            let Some(direction) = requested_direction(&self.properties, property, value) else {
                continue;
            };
            if let Some(target) = resolve_target(builder, resource, property, Some(JoinKind::Left))? {
                builder.add_order_by(&target.alias, &target.column, direction);
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
