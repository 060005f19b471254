//! Pagination for relational collections: stamps the page window on the
//! builder and executes the page (and count) queries.

use std::sync::Arc;

use super::builder::QueryBuilder;
use super::query_checker;
use crate::context::QueryContext;
use crate::error::{QueryError, QueryResult};
use crate::extension::{CollectionResult, QueryCollectionExtension, QueryResultCollectionExtension};
use crate::manager::{ManagerRegistry, relational_connection};
use crate::operation::Operation;
use crate::pagination::{OffsetPaginator, Pagination, PartialOffsetPaginator};

pub struct PaginationExtension {
    managers: Arc<dyn ManagerRegistry>,
    pagination: Pagination,
}

impl PaginationExtension {
    pub fn new(managers: Arc<dyn ManagerRegistry>, pagination: Pagination) -> Self {
        Self {
            managers,
            pagination,
        }
    }

    /// Graph `last` without `before` counts from the end of the collection.
    fn needs_count(ctx: &QueryContext) -> bool {
        ctx.is_graphql() && ctx.filter("last").is_some() && ctx.filter("before").is_none()
    }
}

impl QueryCollectionExtension<QueryBuilder> for PaginationExtension {
    fn apply_to_collection(
        &self,
        builder: &mut QueryBuilder,
        resource: &str,
        operation: &Operation,
        ctx: &mut QueryContext,
    ) -> QueryResult<()> {
        if !self.pagination.is_enabled(operation, ctx) {
            return Ok(());
        }

        let limit = self.pagination.limit(operation, ctx)?;
        if limit < 1 {
            return Err(QueryError::invalid("Limit should not be less than 1"));
        }

        if Self::needs_count(ctx) {
            let connection = relational_connection(self.managers.as_ref(), resource)?;
            let plan = query_checker::plan_for(builder, operation);
            let count = connection.fetch_count(&builder.to_count_sql(plan.distinct)?)?;
            ctx.count = Some(count);
        }

        let window = self.pagination.window(operation, ctx)?;
        tracing::debug!(
            resource,
            page = window.page,
            offset = window.offset,
            limit = window.limit,
            "applying pagination"
        );
        builder.set_first_result(window.offset);
        builder.set_max_results(window.limit);
        Ok(())
    }

    fn as_result_extension(&self) -> Option<&dyn QueryResultCollectionExtension<QueryBuilder>> {
        Some(self)
    }
}

impl QueryResultCollectionExtension<QueryBuilder> for PaginationExtension {
    fn supports_result(&self, _resource: &str, operation: &Operation, ctx: &QueryContext) -> bool {
        self.pagination.is_enabled(operation, ctx)
    }

    fn get_result(
        &self,
        builder: &QueryBuilder,
        resource: &str,
        operation: &Operation,
        ctx: &mut QueryContext,
    ) -> QueryResult<CollectionResult> {
        let connection = relational_connection(self.managers.as_ref(), resource)?;
        let plan = query_checker::plan_for(builder, operation);
        tracing::debug!(resource, distinct = plan.distinct, order_in_select = plan.order_in_select, "pagination plan");

        let items = connection.fetch_rows(&builder.to_page_sql(plan)?)?;
        let first_result = builder.first_result().unwrap_or(0);
        let max_results = builder
            .max_results()
            .unwrap_or(self.pagination.options().items_per_page);

        if self.pagination.is_partial_enabled(operation, ctx) {
            return Ok(CollectionResult::Partial(Box::new(PartialOffsetPaginator::new(
                items,
                first_result,
                max_results,
            ))));
        }

        let total = connection.fetch_count(&builder.to_count_sql(plan.distinct)?)?;
        Ok(CollectionResult::Paginated(Box::new(OffsetPaginator::new(
            items,
            first_result,
            max_results,
            total,
        ))))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::manager::{DocumentConnection, Manager, RelationalConnection, StaticManagerRegistry};
    use crate::metadata::{EntityMetadata, MetadataRegistry};
    use crate::pagination::{GraphQlPaginationOptions, PaginationOptions};
    use serde_json::{Value, json};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Rows {
        sql: Mutex<Vec<String>>,
    }

    impl RelationalConnection for Rows {
        fn fetch_rows(&self, sql: &str) -> anyhow::Result<Vec<Value>> {
            self.sql.lock().unwrap().push(sql.to_string());
            Ok(vec![json!({"id": 1}), json!({"id": 2})])
        }

        fn fetch_count(&self, sql: &str) -> anyhow::Result<u64> {
            self.sql.lock().unwrap().push(sql.to_string());
            Ok(45)
        }
    }

    struct Docs;

    impl DocumentConnection for Docs {
        fn aggregate(&self, _collection: &str, _pipeline: &[Value]) -> anyhow::Result<Vec<Value>> {
            Ok(Vec::new())
        }
    }

    fn builder() -> QueryBuilder {
        let registry: MetadataRegistry = vec![EntityMetadata::new("Book").with_source("books")]
            .into_iter()
            .collect();
        QueryBuilder::new(Arc::new(registry), "Book").unwrap()
    }

    fn extension(connection: Arc<Rows>, options: PaginationOptions) -> PaginationExtension {
        let managers = StaticManagerRegistry::new().with_default(Manager::Relational(connection));
        PaginationExtension::new(
            Arc::new(managers),
            Pagination::new(options, GraphQlPaginationOptions::default()),
        )
    }

    #[test]
    fn stamps_window_and_counts() {
        let rows = Arc::new(Rows::default());
        let ext = extension(Arc::clone(&rows), PaginationOptions::default());
        let op = Operation::collection("Book");
        let mut ctx = QueryContext::from_query_pairs([("page", "3")]);
        let mut qb = builder();

        ext.apply_to_collection(&mut qb, "Book", &op, &mut ctx).unwrap();
        assert_eq!(qb.first_result(), Some(60));
        assert_eq!(qb.max_results(), Some(30));

        assert!(ext.supports_result("Book", &op, &ctx));
        let result = ext.get_result(&qb, "Book", &op, &mut ctx).unwrap();
        let paginator = result.paginator().unwrap();
        assert_eq!(paginator.total_items(), 45.0);
        assert_eq!(paginator.current_page(), 3.0);

        let sql = rows.sql.lock().unwrap();
        assert_eq!(sql.len(), 2);
        assert!(sql[0].ends_with("LIMIT 30 OFFSET 60"), "{}", sql[0]);
        assert!(sql[1].starts_with("SELECT COUNT(*)"), "{}", sql[1]);
    }

    #[test]
    fn partial_skips_count() {
        let rows = Arc::new(Rows::default());
        let ext = extension(
            Arc::clone(&rows),
            PaginationOptions {
                partial: true,
                ..PaginationOptions::default()
            },
        );
        let op = Operation::collection("Book");
        let mut ctx = QueryContext::new();
        let mut qb = builder();
        ext.apply_to_collection(&mut qb, "Book", &op, &mut ctx).unwrap();
        let result = ext.get_result(&qb, "Book", &op, &mut ctx).unwrap();
        assert!(matches!(result, CollectionResult::Partial(_)));
        assert_eq!(rows.sql.lock().unwrap().len(), 1);
    }

    #[test]
    fn zero_limit_is_rejected_before_querying() {
        let rows = Arc::new(Rows::default());
        let ext = extension(
            Arc::clone(&rows),
            PaginationOptions {
                client_items_per_page: true,
                ..PaginationOptions::default()
            },
        );
        let mut ctx = QueryContext::from_query_pairs([("itemsPerPage", "0")]);
        let err = ext
            .apply_to_collection(&mut builder(), "Book", &Operation::collection("Book"), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)));
        assert!(rows.sql.lock().unwrap().is_empty());
    }

    #[test]
    fn graphql_last_counts_first() {
        let rows = Arc::new(Rows::default());
        let ext = extension(Arc::clone(&rows), PaginationOptions::default());
        let mut ctx = QueryContext::new().for_graphql("books");
        ctx.filters.insert("last".to_string(), json!(5));
        let mut qb = builder();
        ext.apply_to_collection(&mut qb, "Book", &Operation::collection("Book"), &mut ctx)
            .unwrap();
        assert_eq!(ctx.count, Some(45));
        assert_eq!(qb.first_result(), Some(40));
        assert_eq!(qb.max_results(), Some(5));
    }

    #[test]
    fn disabled_is_a_no_op() {
        let rows = Arc::new(Rows::default());
        let ext = extension(
            rows,
            PaginationOptions {
                client_enabled: true,
                ..PaginationOptions::default()
            },
        );
        let op = Operation::collection("Book");
        let mut ctx = QueryContext::from_query_pairs([("pagination", "false")]);
        let mut qb = builder();
        ext.apply_to_collection(&mut qb, "Book", &op, &mut ctx).unwrap();
        assert_eq!(qb.max_results(), None);
        assert!(!ext.supports_result("Book", &op, &ctx));
    }

    #[test]
    fn wrong_manager_family() {
        let managers = StaticManagerRegistry::new().with_default(Manager::Document(Arc::new(Docs)));
        let ext = PaginationExtension::new(Arc::new(managers), Pagination::default());
        let op = Operation::collection("Book");
        let mut ctx = QueryContext::new();
        let err = ext.get_result(&builder(), "Book", &op, &mut ctx).unwrap_err();
        assert!(matches!(err, QueryError::BackendMismatch { expected: "relational", .. }));
    }
}
