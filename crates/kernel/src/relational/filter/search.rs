use sea_query::{Expr, Func, SimpleExpr};
use serde_json::Value;

use super::{Target, escape_like_wildcards, resolve_target, sql_value};
use crate::context::QueryContext;
use crate::error::QueryResult;
use crate::filter::{
    Filter, FilterCapabilities, FilterProperties, SearchMode, SearchStrategy, extract_identifier,
    scalar_values, typed_value,
};
use crate::operation::Operation;
use crate::property;
use crate::relational::builder::QueryBuilder;
use crate::relational::join;

/// Equality and LIKE matching on fields, foreign keys and associations.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    properties: FilterProperties,
}

impl SearchFilter {
    pub fn new(properties: FilterProperties) -> Self {
        Self { properties }
    }

    fn mode(&self, property: &str) -> Option<SearchMode> {
        match self.properties.setting(property) {
            None => Some(SearchMode::default()),
            Some(raw) => match raw.parse() {
                Ok(mode) => Some(mode),
                Err(e) => {
                    tracing::info!(property, error = %e, "ignoring search filter property");
                    None
                }
            },
        }
    }

    fn filter_property(
        &self,
        builder: &mut QueryBuilder,
        resource: &str,
        property: &str,
        value: &Value,
    ) -> QueryResult<()> {
        let registry = builder.registry();
        if !self.properties.is_enabled(&registry, resource, property)
            || !property::is_property_mapped(&registry, resource, property, true)
        {
            return Ok(());
        }

        let values = scalar_values(value);
        if values.is_empty() {
            tracing::info!(property, "search filter expects a scalar or a list of scalars");
            return Ok(());
        }
        let Some(mode) = self.mode(property) else {
            return Ok(());
        };

        let Some(parts) = property::split_property(&registry, resource, property) else {
            return Ok(());
        };
        let Some(owner) = property::nested_metadata(&registry, resource, &parts.associations) else {
            return Ok(());
        };

        let Some(target) = resolve_target(builder, resource, property, None)? else {
            return Ok(());
        };

        if let Some(relation) = owner.relation(&parts.field) {
            if relation.embedded {
                tracing::debug!(property, "cannot search on an embedded object");
                return Ok(());
            }
            let Some(related) = registry.get(&relation.target) else {
                return Ok(());
            };
            let id_type = related.field_type(related.identifier());
            let ids: Vec<sea_query::Value> = values
                .iter()
                .filter_map(|v| typed_value(id_type, &extract_identifier(v)))
                .map(|v| sql_value(&v))
                .collect();
            if ids.is_empty() {
                tracing::info!(property, "no usable identifier in search values");
                return Ok(());
            }

            let column = if relation.is_owning_side() && !relation.is_to_many() {
                QueryBuilder::column(&target.alias, &relation.local_column(&parts.field))
            } else {
                let alias = join::add_join_once(builder, &target.alias, &parts.field, None, None)?;
                QueryBuilder::column(&alias, related.identifier())
            };
            builder.and_where(equal_any(column, ids));
            return Ok(());
        }

        if let Some(condition) = field_condition(&target, mode, &values) {
            builder.and_where(condition);
        } else {
            tracing::info!(property, "no search value matches the field type");
        }
        Ok(())
    }
}

fn equal_any(column: Expr, mut values: Vec<sea_query::Value>) -> SimpleExpr {
    if values.len() == 1
        && let Some(value) = values.pop()
    {
        return column.eq(value);
    }
    column.is_in(values)
}

fn field_condition(target: &Target, mode: SearchMode, values: &[String]) -> Option<SimpleExpr> {
    let column = || -> Expr {
        if mode.case_insensitive {
            Expr::expr(Func::lower(target.expr()))
        } else {
            target.expr()
        }
    };
    let normalize = |v: &str| {
        if mode.case_insensitive {
            v.to_lowercase()
        } else {
            v.to_string()
        }
    };

    if mode.strategy == SearchStrategy::Exact {
        let typed: Vec<sea_query::Value> = values
            .iter()
            .filter_map(|v| {
                if mode.case_insensitive {
                    Some(Value::String(v.to_lowercase()))
                } else {
                    typed_value(target.field_type, v)
                }
            })
            .map(|v| sql_value(&v))
            .collect();
        if typed.is_empty() {
            return None;
        }
        return Some(equal_any(column(), typed));
    }

    values
        .iter()
        .flat_map(|raw| {
            let value = escape_like_wildcards(&normalize(raw));
            match mode.strategy {
                SearchStrategy::Partial => vec![format!("%{value}%")],
                SearchStrategy::Start => vec![format!("{value}%")],
                SearchStrategy::End => vec![format!("%{value}")],
                SearchStrategy::WordStart => vec![format!("{value}%"), format!("% {value}%")],
                SearchStrategy::Exact => Vec::new(),
            }
        })
        .map(|pattern| column().like(pattern))
        .reduce(SimpleExpr::or)
}

impl Filter<QueryBuilder> for SearchFilter {
    fn apply(
        &self,
        builder: &mut QueryBuilder,
        resource: &str,
        _operation: &Operation,
        ctx: &mut QueryContext,
    ) -> QueryResult<()> {
        if builder.metadata().get(resource).is_none() {
            return Ok(());
        }
        for (property, value) in &ctx.filters {
            self.filter_property(builder, resource, property, value)?;
        }
        Ok(())
    }

    fn capabilities(&self) -> FilterCapabilities {
        FilterCapabilities {
            array_values: true,
            ..FilterCapabilities::default()
        }
    }
}
