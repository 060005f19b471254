//! `$lookup` resolution for nested document properties.

use super::pipeline::{Pipeline, Stage, document_field};
use crate::error::{QueryError, QueryResult};
use crate::metadata::{EntityMetadata, StoreAs};
use crate::property;

/// Where a nested property lands after its lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupPath {
    /// Full dotted path to match or sort on (`author_lkup.name`).
    pub path: String,
    /// Lookup prefix the field hangs off (`author_lkup.`), empty at the root.
    pub prefix: String,
    /// Last segment of the property.
    pub field: String,
    pub associations: Vec<String>,
}

/// Look up `association` of `owner` under `prefix`; returns the new prefix.
///
/// An existing lookup with the same `as` path is reused.
pub fn add_lookup(
    pipeline: &mut Pipeline,
    owner: &EntityMetadata,
    association: &str,
    prefix: &str,
) -> QueryResult<String> {
    lookup(pipeline, owner, association, prefix, false)
}

/// Like [`add_lookup`], but documents without a referenced document survive
/// the unwind with the lookup field missing.
pub fn add_optional_lookup(
    pipeline: &mut Pipeline,
    owner: &EntityMetadata,
    association: &str,
    prefix: &str,
) -> QueryResult<String> {
    lookup(pipeline, owner, association, prefix, true)
}

fn lookup(
    pipeline: &mut Pipeline,
    owner: &EntityMetadata,
    association: &str,
    prefix: &str,
    preserve_empty: bool,
) -> QueryResult<String> {
    let relation = owner.relation(association).ok_or_else(|| {
        QueryError::mapping(format!("\"{}\" has no reference \"{association}\"", owner.name))
    })?;
    if relation.embedded {
        return Ok(format!("{prefix}{association}."));
    }
    let target = pipeline.metadata().require(&relation.target)?;

    let (local_field, foreign_field) = if relation.is_owning_side() {
        if relation.store_as != StoreAs::Id {
            return Err(QueryError::mapping(format!(
                "cannot lookup the reference \"{}.{association}\": it is not stored as an identifier",
                owner.name
            )));
        }
        (format!("{prefix}{association}"), "_id".to_string())
    } else {
        let mapped_by = relation.mapped_by.as_deref().ok_or_else(|| {
            QueryError::mapping(format!(
                "inverse reference \"{}.{association}\" has no mapped_by",
                owner.name
            ))
        })?;
        let stored_as_id = target
            .relation(mapped_by)
            .is_some_and(|owning| owning.store_as == StoreAs::Id);
        if !stored_as_id {
            return Err(QueryError::mapping(format!(
                "cannot lookup the reference \"{}.{mapped_by}\": it is not stored as an identifier",
                target.name
            )));
        }
        (format!("{prefix}_id"), mapped_by.to_string())
    };

    let as_field = format!("{prefix}{association}_lkup");
    if !pipeline.has_lookup(&as_field) {
        tracing::trace!(from = %target.source(), %as_field, "adding lookup");
        let from = target.source();
        pipeline.push(Stage::Lookup {
            from,
            local_field,
            foreign_field,
            as_field: as_field.clone(),
        });
        pipeline.push(Stage::Unwind {
            path: format!("${as_field}"),
            preserve_empty,
        });
    }
    Ok(format!("{as_field}."))
}

/// Add the lookups `property` needs on `resource`.
///
/// Returns `None` when the property cannot be resolved.
pub fn add_lookups_for_nested_property(
    pipeline: &mut Pipeline,
    property: &str,
    resource: &str,
) -> QueryResult<Option<LookupPath>> {
    let registry = pipeline.registry();
    let Some(parts) = property::split_property(&registry, resource, property) else {
        return Ok(None);
    };
    let Some(mut entity) = registry.get(resource) else {
        return Ok(None);
    };

    let mut prefix = String::new();
    for association in &parts.associations {
        prefix = add_lookup(pipeline, entity, association, &prefix)?;
        let Some(target) = registry.relation_target(entity, association) else {
            return Ok(None);
        };
        entity = target;
    }

    Ok(Some(LookupPath {
        path: format!("{prefix}{}", document_field(entity, &parts.field)),
        prefix,
        field: parts.field,
        associations: parts.associations,
    }))
}
