#![allow(clippy::unwrap_used, clippy::expect_used)]
//! The sample schema and operation under `demos/` stay loadable and render
//! on both backends.

use std::sync::Arc;

use quarry_kernel::document;
use quarry_kernel::manager::ManagerRegistry;
use quarry_kernel::relational::{self, query_checker};
use quarry_kernel::{Operation, OrderOptions, Pagination, QueryContext, Schema, SortDirection};
use quarry_test_utils::{RecordingDocuments, RecordingSql, assert, document_managers, relational_managers};

const SCHEMA: &str = include_str!("../../../demos/library.yaml");
const OPERATION: &str = include_str!("../../../demos/books.yaml");

fn load() -> (Schema, Operation) {
    let schema = Schema::from_yaml_str(SCHEMA).unwrap();
    let operation: Operation = serde_yml::from_str(OPERATION).unwrap();
    (schema, operation)
}

#[test]
fn demo_files_parse() {
    let (schema, operation) = load();
    assert_eq!(schema.entities.len(), 4);
    assert_eq!(schema.filters.len(), 5);
    assert_eq!(operation.resource, "Book");
    assert_eq!(operation.pagination.maximum_items_per_page, Some(50));

    let order: Vec<(&str, SortDirection)> = operation
        .order
        .iter()
        .map(|entry| (entry.property.as_str(), entry.direction))
        .collect();
    assert_eq!(order, vec![("published_at", SortDirection::Desc), ("title", SortDirection::Asc)]);
}

#[test]
fn demo_renders_sql() {
    let (schema, operation) = load();
    let order = OrderOptions::default();
    let managers: Arc<dyn ManagerRegistry> = Arc::new(relational_managers(Arc::new(RecordingSql::default())));
    let chain = relational::default_chain(
        Arc::new(relational::filter_registry(&schema, &order)),
        order,
        Arc::clone(&managers),
        Pagination::default(),
    );
    let provider = relational::CollectionProvider::new(Arc::new(schema.registry()), managers, chain);

    let mut ctx = QueryContext::from_query_pairs([("itemsPerPage", "80"), ("isbn", "978-0441013593")]);
    let builder = provider.explain(&operation, &mut ctx).unwrap();
    let sql = builder.to_page_sql(query_checker::plan_for(&builder, &operation)).unwrap();
    assert::contains(&sql, r#""o"."isbn" = '978-0441013593'"#);
    assert::contains(&sql, r#"ORDER BY "o"."published_at" DESC, "o"."title" ASC LIMIT 50"#);
}

#[test]
fn demo_renders_pipeline() {
    let (schema, operation) = load();
    let order = OrderOptions::default();
    let managers: Arc<dyn ManagerRegistry> =
        Arc::new(document_managers(Arc::new(RecordingDocuments::default())));
    let chain = document::default_chain(
        Arc::new(document::filter_registry(&schema, &order)),
        order,
        Arc::clone(&managers),
        Pagination::default(),
    );
    let provider = document::CollectionProvider::new(Arc::new(schema.registry()), managers, chain);

    let mut ctx = QueryContext::from_query_pairs([("order[price]", "desc")]);
    let pipeline = provider.explain(&operation, &mut ctx).unwrap();
    let rendered = serde_json::to_string(&pipeline.to_documents()).unwrap();
    assert!(rendered.starts_with(r#"[{"$sort":{"price":-1}},{"$facet":"#), "{rendered}");
}
