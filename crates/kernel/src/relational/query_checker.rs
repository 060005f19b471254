//! Structural checks on a [`QueryBuilder`] used to pick the pagination plan.

use super::builder::{JoinKind, QueryBuilder, SqlPlan};
use super::join;
use crate::metadata::EntityMetadata;
use crate::operation::Operation;

pub fn has_left_join(builder: &QueryBuilder) -> bool {
    builder.joins().iter().any(|j| j.kind == JoinKind::Left)
}

pub fn has_max_results(builder: &QueryBuilder) -> bool {
    builder.max_results().is_some()
}

pub fn has_root_entity_with_composite_identifier(builder: &QueryBuilder) -> bool {
    builder
        .root_metadata()
        .is_ok_and(|root| root.has_composite_identifier())
}

/// Whether any join goes through a to-many relation.
pub fn has_joined_to_many_association(builder: &QueryBuilder) -> bool {
    builder.joins().iter().any(|j| {
        join::entity_by_alias(builder, &j.owner_alias)
            .ok()
            .and_then(|owner| owner.relation(&j.relation))
            .is_some_and(|relation| relation.is_to_many())
    })
}

/// Whether any ORDER BY item reads a joined alias.
pub fn has_order_by_on_join(builder: &QueryBuilder) -> bool {
    builder
        .order_by()
        .iter()
        .any(|item| item.alias != builder.root_alias())
}

/// Whether an ORDER BY item sits behind a to-many join.
pub fn has_order_by_on_to_many_join(builder: &QueryBuilder) -> bool {
    builder
        .order_by()
        .iter()
        .filter(|item| item.alias != builder.root_alias())
        .any(|item| is_behind_to_many(builder, &item.alias))
}

fn is_behind_to_many(builder: &QueryBuilder, alias: &str) -> bool {
    let mut previous = None;
    for hop in join::traverse_joins(builder, alias) {
        let Ok(hop) = hop else {
            return false;
        };
        if let (Some(owner), Some(relation)) = (previous, hop.relation.as_deref())
            && owner_relation_is_to_many(owner, relation)
        {
            return true;
        }
        previous = Some(hop.metadata);
    }
    false
}

fn owner_relation_is_to_many(owner: &EntityMetadata, relation: &str) -> bool {
    owner.relation(relation).is_some_and(|r| r.is_to_many())
}

/// DISTINCT root rows when a to-many join is present; never for composite
/// identifiers.
pub fn should_fetch_join_collection(builder: &QueryBuilder, operation: Option<&Operation>) -> bool {
    if let Some(forced) = operation.and_then(|op| op.pagination.fetch_join_collection) {
        return forced;
    }
    if has_root_entity_with_composite_identifier(builder) {
        return false;
    }
    has_joined_to_many_association(builder)
}

pub fn should_use_output_walkers(builder: &QueryBuilder, operation: Option<&Operation>) -> bool {
    if let Some(forced) = operation.and_then(|op| op.pagination.use_output_walkers) {
        return forced;
    }
    if has_root_entity_with_composite_identifier(builder) {
        return true;
    }
    has_max_results(builder) && has_order_by_on_to_many_join(builder)
}

/// Plan honouring the operation's overrides.
pub fn plan_for(builder: &QueryBuilder, operation: &Operation) -> SqlPlan {
    plan(builder, Some(operation))
}

/// Plan derived from the builder alone.
pub fn detect_plan(builder: &QueryBuilder) -> SqlPlan {
    plan(builder, None)
}

// PostgreSQL requires DISTINCT ORDER BY expressions in the select list.
fn plan(builder: &QueryBuilder, operation: Option<&Operation>) -> SqlPlan {
    let distinct = should_fetch_join_collection(builder, operation);
    SqlPlan {
        distinct,
        order_in_select: should_use_output_walkers(builder, operation)
            || (distinct && has_order_by_on_join(builder)),
    }
}
