//! Pagination for document collections via a `$facet` stage.

use serde_json::{Map, Value};
use std::sync::Arc;

use super::paginator::paginator_from_facet;
use super::pipeline::{
    FIRST_RESULT_FIELD, LIMIT_ZERO_MARKER, LIMIT_ZERO_MARKER_FIELD, MAX_RESULTS_FIELD, Pipeline, Stage,
};
use crate::context::QueryContext;
use crate::error::QueryResult;
use crate::extension::{CollectionResult, QueryCollectionExtension, QueryResultCollectionExtension};
use crate::manager::{ManagerRegistry, document_connection};
use crate::operation::Operation;
use crate::pagination::Pagination;

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

    /// Matches so far, counted with the pipeline as built.
    fn count(&self, pipeline: &Pipeline, resource: &str) -> QueryResult<u64> {
        let connection = document_connection(self.managers.as_ref(), resource)?;
        let mut stages = pipeline.to_documents();
        stages.push(Stage::Count("count".to_string()).to_document());
        let output = connection.aggregate(pipeline.collection(), &stages)?;
        Ok(output
            .first()
            .and_then(|doc| doc.get("count"))
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }
}

impl QueryCollectionExtension<Pipeline> for PaginationExtension {
    fn apply_to_collection(
        &self,
        pipeline: &mut Pipeline,
        resource: &str,
        operation: &Operation,
        ctx: &mut QueryContext,
    ) -> QueryResult<()> {
        if !self.pagination.is_enabled(operation, ctx) {
            return Ok(());
        }
        document_connection(self.managers.as_ref(), resource)?;

        if ctx.is_graphql() && ctx.filter("last").is_some() && ctx.filter("before").is_none() {
            ctx.count = Some(self.count(pipeline, resource)?);
        }

        let window = self.pagination.window(operation, ctx)?;
        tracing::debug!(
            resource,
            page = window.page,
            offset = window.offset,
            limit = window.limit,
            "applying pagination"
        );

        let mut results = vec![Stage::Skip(window.offset)];
        if window.limit > 0 {
            results.push(Stage::Limit(window.limit as u64));
        } else {
            let mut marker = Map::new();
            marker.insert(
                LIMIT_ZERO_MARKER_FIELD.to_string(),
                Value::from(LIMIT_ZERO_MARKER),
            );
            results.push(Stage::Match(marker));
        }
        pipeline.push(Stage::Facet(vec![
            ("results".to_string(), results),
            ("count".to_string(), vec![Stage::Count("count".to_string())]),
        ]));

        let mut stamps = Map::new();
        stamps.insert(FIRST_RESULT_FIELD.to_string(), Value::from(window.offset));
        stamps.insert(MAX_RESULTS_FIELD.to_string(), Value::from(window.limit));
        pipeline.push(Stage::AddFields(stamps));
        Ok(())
    }

    fn as_result_extension(&self) -> Option<&dyn QueryResultCollectionExtension<Pipeline>> {
        Some(self)
    }
}

impl QueryResultCollectionExtension<Pipeline> for PaginationExtension {
    fn supports_result(&self, _resource: &str, operation: &Operation, ctx: &QueryContext) -> bool {
        self.pagination.is_enabled(operation, ctx)
    }

    fn get_result(
        &self,
        pipeline: &Pipeline,
        resource: &str,
        _operation: &Operation,
        _ctx: &mut QueryContext,
    ) -> QueryResult<CollectionResult> {
        let connection = document_connection(self.managers.as_ref(), resource)?;
        let output = connection.aggregate(pipeline.collection(), &pipeline.to_documents())?;
        Ok(CollectionResult::Paginated(Box::new(paginator_from_facet(output)?)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::manager::{DocumentConnection, Manager, RelationalConnection, StaticManagerRegistry};
    use crate::metadata::{EntityMetadata, MetadataRegistry};
    use crate::pagination::{GraphQlPaginationOptions, PaginationOptions};
    use serde_json::json;

    struct Facet;

    impl DocumentConnection for Facet {
        fn aggregate(&self, _collection: &str, pipeline: &[Value]) -> anyhow::Result<Vec<Value>> {
            if pipeline.last().is_some_and(|stage| stage.get("$count").is_some()) {
                return Ok(vec![json!({"count": 12})]);
            }
            Ok(vec![json!({
                "results": [{"_id": 1}],
                "count": [{"count": 12}],
                "__api_first_result__": 0,
                "__api_max_results__": 5,
            })])
        }
    }

    struct Sql;

    impl RelationalConnection for Sql {
        fn fetch_rows(&self, _sql: &str) -> anyhow::Result<Vec<Value>> {
            Ok(Vec::new())
        }

        fn fetch_count(&self, _sql: &str) -> anyhow::Result<u64> {
            Ok(0)
        }
    }

    fn pipeline() -> Pipeline {
        let registry: MetadataRegistry = vec![EntityMetadata::new("Book").with_source("books")]
            .into_iter()
            .collect();
        Pipeline::new(Arc::new(registry), "Book").unwrap()
    }

    fn extension(options: PaginationOptions) -> PaginationExtension {
        let managers = StaticManagerRegistry::new().with_default(Manager::Document(Arc::new(Facet)));
        PaginationExtension::new(
            Arc::new(managers),
            Pagination::new(options, GraphQlPaginationOptions::default()),
        )
    }

    fn client_limits() -> PaginationOptions {
        PaginationOptions {
            client_items_per_page: true,
            ..PaginationOptions::default()
        }
    }

    #[test]
    fn facet_and_stamps() {
        let mut p = pipeline();
        let mut ctx = QueryContext::from_query_pairs([("page", "2"), ("itemsPerPage", "5")]);
        extension(client_limits())
            .apply_to_collection(&mut p, "Book", &Operation::collection("Book"), &mut ctx)
            .unwrap();
        assert_eq!(
            p.to_documents(),
            vec![
                json!({"$facet": {
                    "results": [{"$skip": 5}, {"$limit": 5}],
                    "count": [{"$count": "count"}],
                }}),
                json!({"$addFields": {"__api_first_result__": 5, "__api_max_results__": 5}}),
            ]
        );
    }

    #[test]
    fn zero_limit_matches_marker() {
        let mut p = pipeline();
        let mut ctx = QueryContext::from_query_pairs([("itemsPerPage", "0")]);
        extension(client_limits())
            .apply_to_collection(&mut p, "Book", &Operation::collection("Book"), &mut ctx)
            .unwrap();
        let rendered = serde_json::to_string(&p.to_documents()).unwrap();
        assert!(!rendered.contains("$limit"), "{rendered}");
        assert!(rendered.contains(r#"{"$match":{"__api_limit_zero_marker__":"limit0"}}"#), "{rendered}");
    }

    #[test]
    fn negative_limit_is_rejected() {
        let mut ctx = QueryContext::from_query_pairs([("itemsPerPage", "-1")]);
        let err = extension(client_limits())
            .apply_to_collection(&mut pipeline(), "Book", &Operation::collection("Book"), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)));
    }

    #[test]
    fn result_is_built_from_facet() {
        let ext = extension(PaginationOptions::default());
        let op = Operation::collection("Book");
        let mut ctx = QueryContext::new();
        let mut p = pipeline();
        ext.apply_to_collection(&mut p, "Book", &op, &mut ctx).unwrap();
        let result = ext.get_result(&p, "Book", &op, &mut ctx).unwrap();
        let paginator = result.paginator().unwrap();
        assert_eq!(paginator.total_items(), 12.0);
        assert_eq!(paginator.last_page(), 3.0);
    }

    #[test]
    fn graphql_last_counts_first() {
        let mut ctx = QueryContext::new().for_graphql("books");
        ctx.filters.insert("last".to_string(), json!(5));
        let mut p = pipeline();
        extension(PaginationOptions::default())
            .apply_to_collection(&mut p, "Book", &Operation::collection("Book"), &mut ctx)
            .unwrap();
        assert_eq!(ctx.count, Some(12));
        assert_eq!(
            p.stage(1).unwrap().to_document(),
            json!({"$addFields": {"__api_first_result__": 7, "__api_max_results__": 5}})
        );
    }

    #[test]
    fn relational_manager_is_rejected() {
        let managers = StaticManagerRegistry::new().with_default(Manager::Relational(Arc::new(Sql)));
        let ext = PaginationExtension::new(Arc::new(managers), Pagination::default());
        let err = ext
            .apply_to_collection(&mut pipeline(), "Book", &Operation::collection("Book"), &mut QueryContext::new())
            .unwrap_err();
        assert!(matches!(err, QueryError::BackendMismatch { expected: "document", .. }));
    }
}
