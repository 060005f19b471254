//! Default ordering for relational collections.

use super::builder::{JoinKind, QueryBuilder};
use super::join;
use crate::context::QueryContext;
use crate::error::QueryResult;
use crate::extension::QueryCollectionExtension;
use crate::operation::Operation;
use crate::pagination::OrderOptions;

/// Applies the operation's default order, or orders by identifier when a
/// fallback direction is configured. Does nothing once any ORDER BY exists.
#[derive(Debug, Clone, Default)]
pub struct OrderExtension {
    options: OrderOptions,
}

impl OrderExtension {
    pub fn new(options: OrderOptions) -> Self {
        Self { options }
    }
}

impl QueryCollectionExtension<QueryBuilder> for OrderExtension {
    fn apply_to_collection(
        &self,
        builder: &mut QueryBuilder,
        resource: &str,
        operation: &Operation,
        _ctx: &mut QueryContext,
    ) -> QueryResult<()> {
        if !builder.order_by().is_empty() {
            return Ok(());
        }
        let registry = builder.registry();
        let Some(metadata) = registry.get(resource) else {
            return Ok(());
        };
        let root = builder.root_alias().to_string();

        if !operation.order.is_empty() {
            for entry in operation.order.iter() {
                match join::add_joins_for_nested_property(
                    builder,
                    &entry.property,
                    &root,
                    resource,
                    Some(JoinKind::Left),
                )? {
                    Some(nested) => builder.add_order_by(&nested.alias, &nested.column, entry.direction),
                    None => {
                        tracing::debug!(resource, property = %entry.property, "cannot resolve default order property");
                    }
                }
            }
            return Ok(());
        }

        if let Some(direction) = self.options.default_direction {
            for identifier in &metadata.identifiers {
                builder.add_order_by(&root, identifier, direction);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::metadata::{EntityMetadata, FieldType, MetadataRegistry, Relation};
    use crate::operation::{DefaultOrder, SortDirection};
    use std::sync::Arc;

    fn builder(resource: &str) -> QueryBuilder {
        let registry: MetadataRegistry = vec![
            EntityMetadata::new("Book")
                .with_source("books")
                .with_field("status", FieldType::String)
                .with_relation("author", Relation::to_one("Author")),
            EntityMetadata::new("Author")
                .with_source("authors")
                .with_field("name", FieldType::String),
            EntityMetadata::new("Edition").with_identifiers(&["book_id", "number"]),
        ]
        .into_iter()
        .collect();
        QueryBuilder::new(Arc::new(registry), resource).unwrap()
    }

    fn apply(extension: &OrderExtension, qb: &mut QueryBuilder, operation: &Operation) {
        extension
            .apply_to_collection(qb, &operation.resource, operation, &mut QueryContext::new())
            .unwrap();
    }

    #[test]
    fn default_order_on_plain_field() {
        let mut qb = builder("Book");
        let op = Operation::collection("Book").with_order(DefaultOrder::new().then("status", SortDirection::Desc));
        apply(&OrderExtension::default(), &mut qb, &op);

        assert_eq!(qb.order_by().len(), 1);
        assert_eq!(qb.order_by()[0].column, "status");
        assert_eq!(qb.order_by()[0].direction, SortDirection::Desc);
        assert!(qb.joins().is_empty());
    }

    #[test]
    fn nested_default_order_left_joins() {
        let mut qb = builder("Book");
        let op = Operation::collection("Book").with_order(DefaultOrder::new().then("author.name", SortDirection::Asc));
        apply(&OrderExtension::default(), &mut qb, &op);

        let sql = qb.to_sql().unwrap();
        assert!(sql.contains(r#"LEFT JOIN "authors" AS "author_a1""#), "{sql}");
        assert!(sql.ends_with(r#"ORDER BY "author_a1"."name" ASC"#), "{sql}");
    }

    #[test]
    fn existing_order_wins() {
        let mut qb = builder("Book");
        qb.add_order_by("o", "id", SortDirection::Asc);
        let op = Operation::collection("Book").with_order(DefaultOrder::new().then("status", SortDirection::Desc));
        let extension = OrderExtension::default();
        apply(&extension, &mut qb, &op);
        apply(&extension, &mut qb, &op);
        assert_eq!(qb.order_by().len(), 1);
        assert_eq!(qb.order_by()[0].column, "id");
    }

    #[test]
    fn fallback_direction_orders_every_identifier() {
        let mut qb = builder("Edition");
        let extension = OrderExtension::new(OrderOptions {
            default_direction: Some(SortDirection::Desc),
            ..OrderOptions::default()
        });
        apply(&extension, &mut qb, &Operation::collection("Edition"));
        let columns: Vec<&str> = qb.order_by().iter().map(|o| o.column.as_str()).collect();
        assert_eq!(columns, vec!["book_id", "number"]);
        assert!(qb.order_by().iter().all(|o| o.direction == SortDirection::Desc));
    }

    #[test]
    fn no_default_no_fallback_is_a_no_op() {
        let mut qb = builder("Book");
        apply(&OrderExtension::default(), &mut qb, &Operation::collection("Book"));
        assert!(qb.order_by().is_empty());
    }
}
