use serde_json::Value;

use super::resolve_target;
use crate::context::QueryContext;
use crate::error::QueryResult;
use crate::filter::{Filter, FilterProperties, parse_boolean};
use crate::operation::Operation;
use crate::property;
use crate::relational::builder::{JoinKind, QueryBuilder};
use crate::relational::join;

/// Request parameter holding `exists[prop]=bool` pairs.
pub const EXISTS_PARAMETER: &str = "exists";

/// Null checks on fields and associations.
#[derive(Debug, Clone, Default)]
pub struct ExistsFilter {
    properties: FilterProperties,
}

impl ExistsFilter {
    pub fn new(properties: FilterProperties) -> Self {
        Self { properties }
    }
}

impl Filter<QueryBuilder> for ExistsFilter {
    fn apply(
        &self,
        builder: &mut QueryBuilder,
        resource: &str,
        _operation: &Operation,
        ctx: &mut QueryContext,
    ) -> QueryResult<()> {
        let Some(Value::Object(checks)) = ctx.filter(EXISTS_PARAMETER) else {
            return Ok(());
        };
        let registry = builder.registry();

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
            let Some(target) = resolve_target(builder, resource, property, Some(JoinKind::Left))? else {
                continue;
            };

            let column = match owner.relation(&parts.field) {
                Some(relation) if relation.embedded => continue,
                Some(relation) if relation.is_owning_side() && !relation.is_to_many() => {
                    QueryBuilder::column(&target.alias, &relation.local_column(&parts.field))
                }
                Some(relation) => {
                    let Some(related) = registry.get(&relation.target) else {
                        continue;
                    };
                    let alias = join::add_join_once(
                        builder,
                        &target.alias,
                        &parts.field,
                        Some(JoinKind::Left),
                        None,
                    )?;
                    QueryBuilder::column(&alias, related.identifier())
                }
                None => target.expr(),
            };

            builder.and_where(if exists {
                column.is_not_null()
            } else {
                column.is_null()
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::metadata::{EntityMetadata, FieldType, MetadataRegistry, Relation};
    use std::sync::Arc;

    fn run(pairs: &[(&str, &str)]) -> String {
        let registry: MetadataRegistry = vec![
            EntityMetadata::new("Book")
                .with_source("books")
                .with_field("isbn", FieldType::String)
                .with_relation("author", Relation::to_one("Author"))
                .with_relation("reviews", Relation::to_many("Review", "book")),
            EntityMetadata::new("Author").with_source("authors"),
            EntityMetadata::new("Review")
                .with_source("reviews")
                .with_relation("book", Relation::to_one("Book")),
        ]
        .into_iter()
        .collect();
        let mut qb = QueryBuilder::new(Arc::new(registry), "Book").unwrap();
        let mut ctx = QueryContext::from_query_pairs(pairs.iter().copied());
        ExistsFilter::default()
            .apply(&mut qb, "Book", &Operation::collection("Book"), &mut ctx)
            .unwrap();
        qb.to_sql().unwrap()
    }

    #[test]
    fn field_null_checks() {
        assert!(run(&[("exists[isbn]", "true")]).ends_with(r#"WHERE "o"."isbn" IS NOT NULL"#));
        assert!(run(&[("exists[isbn]", "0")]).ends_with(r#"WHERE "o"."isbn" IS NULL"#));
    }

    #[test]
    fn owning_association_checks_foreign_key() {
        let sql = run(&[("exists[author]", "false")]);
        assert!(sql.ends_with(r#"WHERE "o"."author_id" IS NULL"#), "{sql}");
    }

    #[test]
    fn collection_uses_left_join() {
        let sql = run(&[("exists[reviews]", "false")]);
        assert!(sql.contains(r#"LEFT JOIN "reviews" AS "reviews_a1""#), "{sql}");
        assert!(sql.ends_with(r#"WHERE "reviews_a1"."id" IS NULL"#), "{sql}");
    }

    #[test]
    fn invalid_value_is_ignored() {
        assert!(!run(&[("exists[isbn]", "perhaps")]).contains("WHERE"));
    }
}
