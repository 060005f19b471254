//! Relational query builder rendered to PostgreSQL with SeaQuery.
//!
//! The builder records joins, conditions, ordering and the page window as
//! plain data; SQL is produced on demand so extensions can inspect what
//! earlier ones did.

use sea_query::{
    Alias, Asterisk, Cond, Expr, JoinType as SqlJoinType, Order, PostgresQueryBuilder, Query,
    SelectStatement, SimpleExpr,
};
use std::sync::Arc;

use super::join;
use crate::error::{QueryError, QueryResult};
use crate::metadata::{EntityMetadata, MetadataRegistry};
use crate::operation::SortDirection;

/// Alias of the root entity in every collection query.
pub const ROOT_ALIAS: &str = "o";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

/// A join from an aliased entity through one of its relations.
#[derive(Debug, Clone)]
pub struct Join {
    pub owner_alias: String,
    pub relation: String,
    pub alias: String,
    pub kind: JoinKind,
    /// Extra condition ANDed into the ON clause.
    pub condition: Option<SimpleExpr>,
}

/// One ORDER BY item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub alias: String,
    pub column: String,
    pub direction: SortDirection,
}

/// How the page query deals with duplicated root rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqlPlan {
    /// `SELECT DISTINCT` root rows and count distinct identifiers.
    pub distinct: bool,
    /// Add joined ORDER BY columns to the select list.
    pub order_in_select: bool,
}

/// Mutable relational query for one collection request.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    metadata: Arc<MetadataRegistry>,
    root_entity: String,
    root_alias: String,
    joins: Vec<Join>,
    conditions: Vec<SimpleExpr>,
    order_by: Vec<OrderItem>,
    first_result: Option<u64>,
    max_results: Option<i64>,
    join_counter: u32,
}

impl QueryBuilder {
    /// Start a query over `resource`, aliased [`ROOT_ALIAS`].
    pub fn new(metadata: Arc<MetadataRegistry>, resource: &str) -> QueryResult<Self> {
        metadata.require(resource)?;
        Ok(Self {
            metadata,
            root_entity: resource.to_string(),
            root_alias: ROOT_ALIAS.to_string(),
            joins: Vec::new(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            first_result: None,
            max_results: None,
            join_counter: 0,
        })
    }

    pub fn metadata(&self) -> &MetadataRegistry {
        &self.metadata
    }

    /// Shared handle on the metadata, for callers that also mutate the builder.
    pub fn registry(&self) -> Arc<MetadataRegistry> {
        Arc::clone(&self.metadata)
    }

    pub fn root_entity(&self) -> &str {
        &self.root_entity
    }

    pub fn root_alias(&self) -> &str {
        &self.root_alias
    }

    pub(crate) fn root_metadata(&self) -> QueryResult<&EntityMetadata> {
        self.metadata.require(&self.root_entity)
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub(crate) fn push_join(&mut self, join: Join) {
        self.joins.push(join);
    }

    /// Next join alias suffix; strictly increasing from 1.
    pub(crate) fn next_join_index(&mut self) -> u32 {
        self.join_counter += 1;
        self.join_counter
    }

    pub fn and_where(&mut self, condition: SimpleExpr) {
        self.conditions.push(condition);
    }

    pub fn conditions(&self) -> &[SimpleExpr] {
        &self.conditions
    }

    pub fn add_order_by(&mut self, alias: &str, column: &str, direction: SortDirection) {
        self.order_by.push(OrderItem {
            alias: alias.to_string(),
            column: column.to_string(),
            direction,
        });
    }

    pub fn order_by(&self) -> &[OrderItem] {
        &self.order_by
    }

    pub fn set_first_result(&mut self, first_result: u64) {
        self.first_result = Some(first_result);
    }

    pub fn first_result(&self) -> Option<u64> {
        self.first_result
    }

    pub fn set_max_results(&mut self, max_results: i64) {
        self.max_results = Some(max_results);
    }

    pub fn max_results(&self) -> Option<i64> {
        self.max_results
    }

    /// Qualified column expression `"alias"."column"`.
    pub fn column(alias: &str, column: &str) -> Expr {
        Expr::col((Alias::new(alias), Alias::new(column)))
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    /// Full query with the page window and the detected DISTINCT plan.
    pub fn to_sql(&self) -> QueryResult<String> {
        self.to_page_sql(super::query_checker::detect_plan(self))
    }

    /// Page query (root rows only) under `plan`.
    pub fn to_page_sql(&self, plan: SqlPlan) -> QueryResult<String> {
        let mut query = self.base_select()?;
        query.column((Alias::new(&self.root_alias), Asterisk));

        if plan.distinct {
            query.distinct();
        }
        if plan.order_in_select {
            for (index, item) in self.order_by.iter().enumerate() {
                if item.alias != self.root_alias {
                    query.expr_as(
                        Self::column(&item.alias, &item.column),
                        Alias::new(format!("_order_{index}")),
                    );
                }
            }
        }

        for item in &self.order_by {
            let order = match item.direction {
                SortDirection::Asc => Order::Asc,
                SortDirection::Desc => Order::Desc,
            };
            query.order_by((Alias::new(&item.alias), Alias::new(&item.column)), order);
        }

        if let Some(limit) = self.max_results
            && limit >= 0
        {
            query.limit(limit as u64);
        }
        if let Some(offset) = self.first_result {
            query.offset(offset);
        }

        Ok(query.to_string(PostgresQueryBuilder))
    }

    /// Count of the rows matched by the joins and conditions.
    pub fn to_count_sql(&self, distinct: bool) -> QueryResult<String> {
        let mut query = self.base_select()?;
        if distinct {
            let root = self.root_metadata()?;
            query.expr(Expr::cust(format!(
                "COUNT(DISTINCT \"{}\".\"{}\")",
                self.root_alias,
                root.identifier()
            )));
        } else {
            query.expr(Expr::col(Asterisk).count());
        }
        Ok(query.to_string(PostgresQueryBuilder))
    }

    /// FROM, JOIN and WHERE clauses shared by page and count queries.
    fn base_select(&self) -> QueryResult<SelectStatement> {
        let root = self.root_metadata()?;
        let mut query = Query::select();
        query.from_as(Alias::new(root.source()), Alias::new(&self.root_alias));

        for join in &self.joins {
            let (table, on) = self.join_condition(join)?;
            let join_type = match join.kind {
                JoinKind::Inner => SqlJoinType::InnerJoin,
                JoinKind::Left => SqlJoinType::LeftJoin,
            };
            query.join_as(join_type, Alias::new(table), Alias::new(&join.alias), on);
        }

        for condition in &self.conditions {
            query.and_where(condition.clone());
        }
        Ok(query)
    }

    /// Target table and ON clause for `join`.
    ///
    /// Owning side: `owner.<fk> = alias.<id>`. Inverse side: the owning
    /// relation on the target names the column, `alias.<fk> = owner.<id>`.
    pub(crate) fn join_condition(&self, join: &Join) -> QueryResult<(String, Cond)> {
        let owner = join::entity_by_alias(self, &join.owner_alias)?;
        let relation = owner.relation(&join.relation).ok_or_else(|| {
            QueryError::mapping(format!(
                "\"{}\" has no relation \"{}\"",
                owner.name, join.relation
            ))
        })?;
        if relation.embedded {
            return Err(QueryError::mapping(format!(
                "embedded relation \"{}.{}\" cannot be joined",
                owner.name, join.relation
            )));
        }
        let target = self.metadata.require(&relation.target)?;

        let on = if relation.is_owning_side() {
            if relation.is_to_many() {
                return Err(join_table_unsupported(&owner.name, &join.relation));
            }
            Self::column(&join.owner_alias, &relation.local_column(&join.relation))
                .equals((Alias::new(&join.alias), Alias::new(target.identifier())))
        } else {
            let mapped_by = relation.mapped_by.as_deref().ok_or_else(|| {
                QueryError::mapping(format!(
                    "inverse relation \"{}.{}\" has no mapped_by",
                    owner.name, join.relation
                ))
            })?;
            let owning = target.relation(mapped_by).ok_or_else(|| {
                QueryError::mapping(format!(
                    "\"{}\" has no relation \"{mapped_by}\"",
                    target.name
                ))
            })?;
            if owning.is_to_many() {
                return Err(join_table_unsupported(&owner.name, &join.relation));
            }
            Self::column(&join.alias, &owning.local_column(mapped_by))
                .equals((Alias::new(&join.owner_alias), Alias::new(owner.identifier())))
        };

        let mut cond = Cond::all().add(on);
        if let Some(extra) = &join.condition {
            cond = cond.add(extra.clone());
        }
        Ok((target.source(), cond))
    }
}

fn join_table_unsupported(entity: &str, relation: &str) -> QueryError {
    QueryError::mapping(format!(
        "\"{entity}.{relation}\" needs a join table, which is not supported"
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::metadata::{FieldType, Relation};

    fn registry() -> Arc<MetadataRegistry> {
        Arc::new(
            vec![
                EntityMetadata::new("Book")
                    .with_source("books")
                    .with_field("title", FieldType::String)
                    .with_relation("author", Relation::to_one("Author"))
                    .with_relation("reviews", Relation::to_many("Review", "book")),
                EntityMetadata::new("Author").with_source("authors"),
                EntityMetadata::new("Review")
                    .with_source("reviews")
                    .with_relation("book", Relation::to_one("Book")),
            ]
            .into_iter()
            .collect(),
        )
    }

    #[test]
    fn unknown_resource() {
        let err = QueryBuilder::new(registry(), "Ghost").unwrap_err();
        assert!(matches!(err, QueryError::ResourceNotFound(_)));
    }

    #[test]
    fn plain_select() {
        let qb = QueryBuilder::new(registry(), "Book").unwrap();
        assert_eq!(qb.to_sql().unwrap(), r#"SELECT "o".* FROM "books" AS "o""#);
        assert_eq!(
            qb.to_count_sql(false).unwrap(),
            r#"SELECT COUNT(*) FROM "books" AS "o""#
        );
    }

    #[test]
    fn window_and_order() {
        let mut qb = QueryBuilder::new(registry(), "Book").unwrap();
        qb.and_where(QueryBuilder::column("o", "title").eq("Dune"));
        qb.add_order_by("o", "title", SortDirection::Desc);
        qb.set_first_result(20);
        qb.set_max_results(10);

        let sql = qb.to_sql().unwrap();
        assert_eq!(
            sql,
            r#"SELECT "o".* FROM "books" AS "o" WHERE "o"."title" = 'Dune' ORDER BY "o"."title" DESC LIMIT 10 OFFSET 20"#
        );
        let count = qb.to_count_sql(false).unwrap();
        assert!(!count.contains("ORDER BY"), "{count}");
        assert!(!count.contains("LIMIT"), "{count}");
    }

    #[test]
    fn owning_and_inverse_join_conditions() {
        let mut qb = QueryBuilder::new(registry(), "Book").unwrap();
        let author = join::add_join_once(&mut qb, "o", "author", None, None).unwrap();
        let reviews = join::add_join_once(&mut qb, "o", "reviews", Some(JoinKind::Left), None).unwrap();
        assert_eq!(author, "author_a1");
        assert_eq!(reviews, "reviews_a2");

        let sql = qb.to_sql().unwrap();
        assert!(
            sql.contains(r#"INNER JOIN "authors" AS "author_a1" ON "o"."author_id" = "author_a1"."id""#),
            "{sql}"
        );
        assert!(
            sql.contains(r#"LEFT JOIN "reviews" AS "reviews_a2" ON "reviews_a2"."book_id" = "o"."id""#),
            "{sql}"
        );
    }

    #[test]
    fn distinct_plan_and_count() {
        let mut qb = QueryBuilder::new(registry(), "Book").unwrap();
        let reviews = join::add_join_once(&mut qb, "o", "reviews", None, None).unwrap();
        qb.add_order_by(&reviews, "id", SortDirection::Asc);
        qb.set_max_results(5);

        let plan = SqlPlan {
            distinct: true,
            order_in_select: true,
        };
        let sql = qb.to_page_sql(plan).unwrap();
        assert!(sql.starts_with(r#"SELECT DISTINCT "o".*, "reviews_a1"."id" AS "_order_0""#), "{sql}");
        let count = qb.to_count_sql(true).unwrap();
        assert!(
            count.starts_with(r#"SELECT COUNT(DISTINCT "o"."id") FROM "books" AS "o" INNER JOIN "reviews""#),
            "{count}"
        );
    }
}
