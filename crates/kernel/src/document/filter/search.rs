use serde_json::{Value, json};

use super::{Target, resolve_target};
use crate::context::QueryContext;
use crate::document::lookup::add_lookup;
use crate::document::pipeline::Pipeline;
use crate::error::QueryResult;
use crate::filter::{
    Filter, FilterCapabilities, FilterProperties, SearchMode, SearchStrategy, extract_identifier,
    scalar_values, typed_value,
};
use crate::operation::Operation;
use crate::property;

/// Equality and regular-expression matching on fields and references.
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
        pipeline: &mut Pipeline,
        resource: &str,
        property: &str,
        value: &Value,
    ) -> QueryResult<()> {
        let registry = pipeline.registry();
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
        let Some(target) = resolve_target(pipeline, resource, property)? else {
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
            let ids: Vec<Value> = values
                .iter()
                .filter_map(|v| typed_value(id_type, &extract_identifier(v)))
                .collect();
            if ids.is_empty() {
                tracing::info!(property, "no usable identifier in search values");
                return Ok(());
            }

            let path = if relation.is_owning_side() {
                target.path.path.clone()
            } else {
                let prefix = add_lookup(pipeline, owner, &parts.field, &target.path.prefix)?;
                format!("{prefix}_id")
            };
            pipeline.add_match(&path, equal_any(ids));
            return Ok(());
        }

        match field_condition(&target, mode, &values) {
            Some(condition) => pipeline.add_match(&target.path.path, condition),
            None => tracing::info!(property, "no search value matches the field type"),
        }
        Ok(())
    }
}

fn equal_any(mut values: Vec<Value>) -> Value {
    if values.len() == 1
        && let Some(value) = values.pop()
    {
        return value;
    }
    json!({ "$in": values })
}

fn regex(pattern: String, case_insensitive: bool) -> Value {
    if case_insensitive {
        json!({ "$regex": pattern, "$options": "i" })
    } else {
        json!({ "$regex": pattern })
    }
}

fn field_condition(target: &Target, mode: SearchMode, values: &[String]) -> Option<Value> {
    if mode.strategy == SearchStrategy::Exact && !mode.case_insensitive {
        let typed: Vec<Value> = values
            .iter()
            .filter_map(|v| typed_value(target.field_type, v))
            .collect();
        if typed.is_empty() {
            return None;
        }
        return Some(equal_any(typed));
    }

    let patterns: Vec<Value> = values
        .iter()
        .map(|raw| {
            let quoted = regex::escape(raw);
            let pattern = match mode.strategy {
                SearchStrategy::Exact => format!("^{quoted}$"),
                SearchStrategy::Partial => quoted,
                SearchStrategy::Start => format!("^{quoted}"),
                SearchStrategy::End => format!("{quoted}$"),
                SearchStrategy::WordStart => format!("(^{quoted}.*|.*\\s{quoted}.*)"),
            };
            regex(pattern, mode.case_insensitive)
        })
        .collect();

    match patterns.len() {
        0 => None,
        1 => patterns.into_iter().next(),
        _ => Some(json!({ "$in": patterns })),
    }
}

impl Filter<Pipeline> for SearchFilter {
    fn apply(
        &self,
        pipeline: &mut Pipeline,
        resource: &str,
        _operation: &Operation,
        ctx: &mut QueryContext,
    ) -> QueryResult<()> {
        if pipeline.metadata().get(resource).is_none() {
            return Ok(());
        }
        for (property, value) in &ctx.filters {
            self.filter_property(pipeline, resource, property, value)?;
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
