#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Document collection pipeline integration tests.
//!
//! Runs the default filter, order and pagination chain against the library
//! schema and inspects the aggregation stages handed to a recording
//! connection.

use std::sync::Arc;

use quarry_kernel::document::{self, CollectionProvider};
use quarry_kernel::extension::CollectionResult;
use quarry_kernel::filter::{FilterDeclaration, FilterKind, FilterProperties};
use quarry_kernel::manager::ManagerRegistry;
use quarry_kernel::pagination::{ConnectionArgs, GraphQlPaginationOptions, encode_cursor};
use quarry_kernel::{
    DefaultOrder, Operation, OperationPagination, OrderOptions, Pagination, PaginationOptions, QueryContext,
    QueryError, SortDirection,
};
use quarry_test_utils::{
    LIBRARY_FILTERS, RecordingDocuments, RecordingSql, assert, document_managers, library_schema,
    relational_managers,
};
use serde_json::{Value, json};

fn facet(results: usize, count: u64, first: u64, max: i64) -> Vec<Value> {
    let results: Vec<Value> = (0..results).map(|i| json!({"_id": i + 1})).collect();
    vec![json!({
        "results": results,
        "count": [{"count": count}],
        "__api_first_result__": first,
        "__api_max_results__": max,
    })]
}

fn provider_with(connection: Arc<RecordingDocuments>, order: OrderOptions) -> CollectionProvider {
    let schema = library_schema();
    let managers: Arc<dyn ManagerRegistry> = Arc::new(document_managers(connection));
    let filters = Arc::new(document::filter_registry(&schema, &order));
    let pagination = Pagination::new(PaginationOptions::default(), GraphQlPaginationOptions::default());
    let chain = document::default_chain(filters, order, Arc::clone(&managers), pagination);
    CollectionProvider::new(Arc::new(schema.registry()), managers, chain)
}

fn provider(connection: Arc<RecordingDocuments>) -> CollectionProvider {
    provider_with(connection, OrderOptions::default())
}

fn books() -> Operation {
    Operation::collection("Book").with_filters(&LIBRARY_FILTERS)
}

#[test]
fn filtered_ordered_second_page() {
    let docs = Arc::new(RecordingDocuments::new(facet(2, 32, 30, 30), 0));
    let mut ctx = QueryContext::from_query_pairs([
        ("title", "DUNE"),
        ("price[gte]", "5"),
        ("available", "1"),
        ("order[author.name]", "desc"),
        ("order[title]", "asc"),
        ("page", "2"),
    ]);

    let result = provider(Arc::clone(&docs)).provide(&books(), &mut ctx).unwrap();

    let pipelines = docs.pipelines();
    assert_eq!(pipelines.len(), 1);
    let (collection, stages) = &pipelines[0];
    assert_eq!(collection, "books");
    assert::json_eq(
        &Value::Array(stages.clone()),
        &json!([
            {"$match": {"title": {"$regex": "DUNE", "$options": "i"}}},
            {"$match": {"price": {"$gte": 5}}},
            {"$match": {"available": true}},
            {"$lookup": {"from": "authors", "localField": "author", "foreignField": "_id", "as": "author_lkup"}},
            {"$unwind": "$author_lkup"},
            {"$sort": {"author_lkup.name": -1, "title": 1}},
            {"$facet": {
                "results": [{"$skip": 30}, {"$limit": 30}],
                "count": [{"$count": "count"}],
            }},
            {"$addFields": {"__api_first_result__": 30, "__api_max_results__": 30}},
        ]),
    );
    assert_eq!(
        serde_json::to_string(&stages[5]).unwrap(),
        r#"{"$sort":{"author_lkup.name":-1,"title":1}}"#
    );
    assert_eq!(
        ctx.sort_fields,
        vec![
            ("author_lkup.name".to_string(), SortDirection::Desc),
            ("title".to_string(), SortDirection::Asc),
        ]
    );

    let paginator = result.paginator().unwrap();
    assert_eq!(paginator.count(), 2);
    assert_eq!(paginator.current_page(), 2.0);
    assert_eq!(paginator.last_page(), 2.0);
    assert_eq!(paginator.total_items(), 32.0);
}

#[test]
fn owning_reference_matches_stored_identifier() {
    let docs = Arc::new(RecordingDocuments::new(facet(1, 1, 0, 30), 0));
    let mut ctx = QueryContext::from_query_pairs([("author", "/authors/7"), ("exists[isbn]", "true")]);
    provider(Arc::clone(&docs)).provide(&books(), &mut ctx).unwrap();

    let stages = &docs.pipelines()[0].1;
    assert_eq!(stages[0], json!({"$match": {"author": 7}}));
    assert_eq!(stages[1], json!({"$match": {"isbn": {"$ne": null}}}));
    let rendered = serde_json::to_string(stages).unwrap();
    assert::not_contains(&rendered, "$lookup");
}

#[test]
fn exists_on_inverse_reference_keeps_unmatched_books() {
    let mut schema = library_schema();
    schema.filters.push(FilterDeclaration::new(
        "book.reviewed",
        FilterKind::Exists,
        FilterProperties::only(&["reviews"]),
    ));
    let order = OrderOptions::default();
    let docs = Arc::new(RecordingDocuments::new(facet(1, 1, 0, 30), 0));
    let managers: Arc<dyn ManagerRegistry> = Arc::new(document_managers(Arc::clone(&docs)));
    let chain = document::default_chain(
        Arc::new(document::filter_registry(&schema, &order)),
        order,
        Arc::clone(&managers),
        Pagination::default(),
    );
    let provider = CollectionProvider::new(Arc::new(schema.registry()), managers, chain);
    let op = Operation::collection("Book").with_filters(&["book.reviewed"]);

    for flag in ["false", "true"] {
        let mut ctx = QueryContext::from_query_pairs([("exists[reviews]", flag)]);
        provider.provide(&op, &mut ctx).unwrap();
    }

    let pipelines = docs.pipelines();
    assert_eq!(pipelines.len(), 2);
    for ((_, stages), condition) in pipelines.iter().zip([json!({"$eq": null}), json!({"$ne": null})]) {
        assert_eq!(
            stages[1],
            json!({"$unwind": {"path": "$reviews_lkup", "preserveNullAndEmptyArrays": true}})
        );
        assert_eq!(stages[2], json!({"$match": {"reviews_lkup._id": condition}}));
    }
}

#[test]
fn declared_order_then_fallback_identifier_order() {
    let docs = Arc::new(RecordingDocuments::new(facet(0, 0, 0, 30), 0));
    let op = books().with_order(DefaultOrder::new().then("author.name", SortDirection::Asc));
    provider(Arc::clone(&docs)).provide(&op, &mut QueryContext::new()).unwrap();
    let stages = &docs.pipelines()[0].1;
    assert_eq!(stages[2], json!({"$sort": {"author_lkup.name": 1}}));

    let docs = Arc::new(RecordingDocuments::new(facet(0, 0, 0, 30), 0));
    let order = OrderOptions {
        default_direction: Some(SortDirection::Desc),
        ..OrderOptions::default()
    };
    provider_with(Arc::clone(&docs), order)
        .provide(&books(), &mut QueryContext::new())
        .unwrap();
    assert_eq!(docs.pipelines()[0].1[0], json!({"$sort": {"_id": -1}}));
}

#[test]
fn disabled_pagination_returns_raw_output() {
    let docs = Arc::new(RecordingDocuments::new(vec![json!({"_id": 1}), json!({"_id": 2})], 0));
    let op = books().with_pagination(OperationPagination {
        enabled: Some(false),
        ..OperationPagination::default()
    });
    let mut ctx = QueryContext::from_query_pairs([("available", "false")]);
    let result = provider(Arc::clone(&docs)).provide(&op, &mut ctx).unwrap();

    assert!(matches!(result, CollectionResult::Items(ref items) if items.len() == 2));
    assert_eq!(docs.pipelines()[0].1, vec![json!({"$match": {"available": false}})]);
}

#[test]
fn empty_result_has_one_page() {
    let docs = Arc::new(RecordingDocuments::new(
        vec![json!({
            "results": [],
            "count": [],
            "__api_first_result__": 0,
            "__api_max_results__": 30,
        })],
        0,
    ));
    let result = provider(docs).provide(&books(), &mut QueryContext::new()).unwrap();
    let paginator = result.paginator().unwrap();
    assert_eq!(paginator.total_items(), 0.0);
    assert_eq!(paginator.last_page(), 1.0);
    assert!(!paginator.has_next_page());
}

#[test]
fn explain_does_not_aggregate() {
    let docs = Arc::new(RecordingDocuments::default());
    let mut ctx = QueryContext::from_query_pairs([("title", "emma")]);
    let pipeline = provider(Arc::clone(&docs)).explain(&books(), &mut ctx).unwrap();
    assert_eq!(pipeline.collection(), "books");
    assert_eq!(pipeline.len(), 3);
    assert!(docs.pipelines().is_empty());
}

#[test]
fn graphql_last_counts_then_pages() {
    let docs = Arc::new(RecordingDocuments::new(facet(3, 10, 7, 3), 10));
    let mut ctx = QueryContext::from_query_pairs([("last", "3")]).for_graphql("books");
    let result = provider(Arc::clone(&docs)).provide(&books(), &mut ctx).unwrap();

    assert_eq!(ctx.count, Some(10));
    let pipelines = docs.pipelines();
    assert_eq!(pipelines.len(), 2);
    assert_eq!(pipelines[0].1, vec![json!({"$count": "count"})]);
    assert_eq!(
        pipelines[1].1[0],
        json!({"$facet": {"results": [{"$skip": 7}, {"$limit": 3}], "count": [{"$count": "count"}]}})
    );

    let connection = result
        .to_connection(&ConnectionArgs::from_context(&ctx))
        .unwrap()
        .unwrap();
    let cursors: Vec<&str> = connection.edges.iter().map(|e| e.cursor.as_str()).collect();
    assert_eq!(cursors, vec![encode_cursor(7), encode_cursor(8), encode_cursor(9)]);
    assert!(connection.page_info.has_previous_page);
    assert_eq!(connection.page_info.end_cursor, Some(encode_cursor(9)));
}

#[test]
fn relational_manager_is_rejected() {
    let schema = library_schema();
    let order = OrderOptions::default();
    let managers: Arc<dyn ManagerRegistry> = Arc::new(relational_managers(Arc::new(RecordingSql::default())));
    let chain = document::default_chain(
        Arc::new(document::filter_registry(&schema, &order)),
        order,
        Arc::clone(&managers),
        Pagination::default(),
    );
    let provider = CollectionProvider::new(Arc::new(schema.registry()), managers, chain);
    let err = provider.provide(&books(), &mut QueryContext::new()).unwrap_err();
    assert!(matches!(err, QueryError::BackendMismatch { expected: "document", .. }));
}
