//! Alias and join resolution on a [`QueryBuilder`].

use sea_query::SimpleExpr;

use super::builder::{Join, JoinKind, QueryBuilder};
use super::query_checker;
use crate::error::{QueryError, QueryResult};
use crate::metadata::EntityMetadata;
use crate::property;

/// The join already made from `owner_alias` through `relation`, if any.
pub fn existing_join<'b>(builder: &'b QueryBuilder, owner_alias: &str, relation: &str) -> Option<&'b Join> {
    builder
        .joins()
        .iter()
        .find(|join| join.owner_alias == owner_alias && join.relation == relation)
}

/// Join `relation` from `owner_alias` unless that join exists; returns its alias.
///
/// New joins are LEFT when asked for or when the builder already holds a left
/// join, INNER otherwise.
pub fn add_join_once(
    builder: &mut QueryBuilder,
    owner_alias: &str,
    relation: &str,
    kind: Option<JoinKind>,
    condition: Option<SimpleExpr>,
) -> QueryResult<String> {
    if let Some(join) = existing_join(builder, owner_alias, relation) {
        return Ok(join.alias.clone());
    }

    let kind = if kind == Some(JoinKind::Left) || query_checker::has_left_join(builder) {
        JoinKind::Left
    } else {
        JoinKind::Inner
    };

    let mut join = Join {
        owner_alias: owner_alias.to_string(),
        relation: relation.to_string(),
        alias: String::new(),
        kind,
        condition,
    };
    // Reject unknown owners and unjoinable relations before taking an alias.
    builder.join_condition(&join)?;
    join.alias = format!("{relation}_a{}", builder.next_join_index());

    tracing::trace!(owner = owner_alias, relation, alias = %join.alias, ?kind, "adding join");
    let alias = join.alias.clone();
    builder.push_join(join);
    Ok(alias)
}

/// One step of a join path: the alias, the entity it stands for, and the
/// relation used to reach it (`None` for the root).
#[derive(Debug, Clone)]
pub struct JoinHop<'b> {
    pub alias: String,
    pub metadata: &'b EntityMetadata,
    pub relation: Option<String>,
}

/// Lazy walk from the root alias down to a target alias.
///
/// Built from the current builder state; call [`traverse_joins`] again after
/// adding joins.
pub struct JoinTraversal<'b> {
    builder: &'b QueryBuilder,
    /// Joins from the root to the target, root side first.
    path: Vec<&'b Join>,
    position: usize,
    current: Option<&'b EntityMetadata>,
    error: Option<QueryError>,
    done: bool,
}

impl<'b> Iterator for JoinTraversal<'b> {
    type Item = QueryResult<JoinHop<'b>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(error) = self.error.take() {
            self.done = true;
            return Some(Err(error));
        }

        let Some(current) = self.current else {
            let root = match self.builder.root_metadata() {
                Ok(root) => root,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            self.current = Some(root);
            return Some(Ok(JoinHop {
                alias: self.builder.root_alias().to_string(),
                metadata: root,
                relation: None,
            }));
        };

        let Some(join) = self.path.get(self.position) else {
            self.done = true;
            return None;
        };
        self.position += 1;

        match self.builder.metadata().relation_target(current, &join.relation) {
            Some(target) => {
                self.current = Some(target);
                Some(Ok(JoinHop {
                    alias: join.alias.clone(),
                    metadata: target,
                    relation: Some(join.relation.clone()),
                }))
            }
            None => {
                self.done = true;
                Some(Err(QueryError::mapping(format!(
                    "\"{}\" has no relation \"{}\"",
                    current.name, join.relation
                ))))
            }
        }
    }
}

/// Walk the joins leading to `alias`, root first.
///
/// Yields a single [`QueryError::UnknownAlias`] when `alias` is neither the
/// root alias nor a join alias of the builder.
pub fn traverse_joins<'b>(builder: &'b QueryBuilder, alias: &str) -> JoinTraversal<'b> {
    let mut path = Vec::new();
    let mut error = None;
    let mut cursor = alias;

    // Each hop moves to an alias created earlier, so the walk is bounded by
    // the number of joins.
    while cursor != builder.root_alias() {
        match builder.joins().iter().find(|join| join.alias == cursor) {
            Some(join) if path.len() < builder.joins().len() => {
                path.push(join);
                cursor = &join.owner_alias;
            }
            _ => {
                error = Some(QueryError::UnknownAlias(alias.to_string()));
                path.clear();
                break;
            }
        }
    }
    path.reverse();

    JoinTraversal {
        builder,
        path,
        position: 0,
        current: None,
        error,
        done: false,
    }
}

/// Entity an alias stands for.
pub fn entity_by_alias<'b>(builder: &'b QueryBuilder, alias: &str) -> QueryResult<&'b EntityMetadata> {
    if alias == builder.root_alias() {
        return builder.root_metadata();
    }
    let mut entity = None;
    for hop in traverse_joins(builder, alias) {
        entity = Some(hop?.metadata);
    }
    entity.ok_or_else(|| QueryError::UnknownAlias(alias.to_string()))
}

/// Where a nested property lands after joining its associations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedColumn {
    /// Alias owning the column.
    pub alias: String,
    /// Column name; embedded segments are folded in with `_`.
    pub column: String,
    /// Relation segments of the property path.
    pub associations: Vec<String>,
}

/// Join every association of `property` from `root_alias`.
///
/// Embedded segments stay on their owner's alias and prefix the column
/// (`address.city` becomes `address_city`). Returns `None` when the property
/// cannot be resolved on `resource`.
pub fn add_joins_for_nested_property(
    builder: &mut QueryBuilder,
    property: &str,
    root_alias: &str,
    resource: &str,
    kind: Option<JoinKind>,
) -> QueryResult<Option<NestedColumn>> {
    let registry = builder.registry();
    let Some(parts) = property::split_property(&registry, resource, property) else {
        return Ok(None);
    };
    let Some(mut entity) = registry.get(resource) else {
        return Ok(None);
    };

    let mut alias = root_alias.to_string();
    let mut prefix = String::new();

    for association in &parts.associations {
        let Some(relation) = entity.relation(association) else {
            return Ok(None);
        };
        if relation.embedded {
            prefix.push_str(association);
            prefix.push('_');
        } else {
            if !prefix.is_empty() {
                return Err(QueryError::mapping(format!(
                    "\"{property}\" traverses a relation inside an embedded object"
                )));
            }
            alias = add_join_once(builder, &alias, association, kind, None)?;
        }
        let Some(target) = registry.get(&relation.target) else {
            return Ok(None);
        };
        entity = target;
    }

    Ok(Some(NestedColumn {
        alias,
        column: format!("{prefix}{}", parts.field),
        associations: parts.associations,
    }))
}
