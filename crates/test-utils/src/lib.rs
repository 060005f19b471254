//! Quarry test utilities.
//!
//! Helpers for integration testing: a small library schema, recording
//! in-memory connections for both backend families, and assertion helpers
//! for rendered queries.

use std::sync::Arc;

use parking_lot::Mutex;
use quarry_kernel::filter::{FilterDeclaration, FilterKind, FilterProperties};
use quarry_kernel::manager::{DocumentConnection, Manager, RelationalConnection, StaticManagerRegistry};
use quarry_kernel::metadata::{EntityMetadata, FieldType, Relation};
use quarry_kernel::schema::Schema;
use serde_json::Value;

/// Books, authors, publishers and reviews with one declaration per filter kind.
///
/// Filter ids: `book.search`, `book.range`, `book.boolean`, `book.exists`,
/// `book.order`.
pub fn library_schema() -> Schema {
    let entities = vec![
        EntityMetadata::new("Book")
            .with_source("books")
            .with_field("title", FieldType::String)
            .with_field("isbn", FieldType::String)
            .with_field("price", FieldType::Float)
            .with_field("pages", FieldType::Integer)
            .with_field("available", FieldType::Boolean)
            .with_field("published_at", FieldType::DateTime)
            .with_relation("author", Relation::to_one("Author"))
            .with_relation("publisher", Relation::to_one("Publisher"))
            .with_relation("reviews", Relation::to_many("Review", "book")),
        EntityMetadata::new("Author")
            .with_source("authors")
            .with_field("name", FieldType::String)
            .with_field("born", FieldType::Integer)
            .with_relation("books", Relation::to_many("Book", "author")),
        EntityMetadata::new("Publisher")
            .with_source("publishers")
            .with_field("name", FieldType::String),
        EntityMetadata::new("Review")
            .with_source("reviews")
            .with_field("rating", FieldType::Integer)
            .with_field("body", FieldType::String)
            .with_relation("book", Relation::to_one("Book")),
    ];

    let filters = vec![
        FilterDeclaration::new(
            "book.search",
            FilterKind::Search,
            FilterProperties::only(&["isbn", "author"])
                .with("title", "ipartial")
                .with("author.name", "istart"),
        ),
        FilterDeclaration::new("book.range", FilterKind::Range, FilterProperties::only(&["price", "pages"])),
        FilterDeclaration::new("book.boolean", FilterKind::Boolean, FilterProperties::only(&["available"])),
        FilterDeclaration::new("book.exists", FilterKind::Exists, FilterProperties::only(&["isbn", "author"])),
        FilterDeclaration::new(
            "book.order",
            FilterKind::Order,
            FilterProperties::only(&["title", "price", "author.name"]),
        ),
    ];

    Schema { entities, filters }
}

/// Every filter id declared by [`library_schema`].
pub const LIBRARY_FILTERS: [&str; 5] = ["book.search", "book.range", "book.boolean", "book.exists", "book.order"];

/// Relational connection that records every statement and answers with
/// canned rows and a canned count.
#[derive(Debug, Default)]
pub struct RecordingSql {
    rows: Vec<Value>,
    count: u64,
    statements: Mutex<Vec<String>>,
}

impl RecordingSql {
    pub fn new(rows: Vec<Value>, count: u64) -> Self {
        Self {
            rows,
            count,
            statements: Mutex::new(Vec::new()),
        }
    }

    /// Statements executed so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }
}

impl RelationalConnection for RecordingSql {
    fn fetch_rows(&self, sql: &str) -> anyhow::Result<Vec<Value>> {
        self.statements.lock().push(sql.to_string());
        Ok(self.rows.clone())
    }

    fn fetch_count(&self, sql: &str) -> anyhow::Result<u64> {
        self.statements.lock().push(sql.to_string());
        Ok(self.count)
    }
}

/// Document connection that records every pipeline and answers with a
/// canned output. A pipeline ending in `$count` gets `[{count: n}]`.
#[derive(Debug, Default)]
pub struct RecordingDocuments {
    output: Vec<Value>,
    count: u64,
    pipelines: Mutex<Vec<(String, Vec<Value>)>>,
}

impl RecordingDocuments {
    pub fn new(output: Vec<Value>, count: u64) -> Self {
        Self {
            output,
            count,
            pipelines: Mutex::new(Vec::new()),
        }
    }

    /// `(collection, stages)` of every aggregation run so far.
    pub fn pipelines(&self) -> Vec<(String, Vec<Value>)> {
        self.pipelines.lock().clone()
    }
}

impl DocumentConnection for RecordingDocuments {
    fn aggregate(&self, collection: &str, pipeline: &[Value]) -> anyhow::Result<Vec<Value>> {
        self.pipelines.lock().push((collection.to_string(), pipeline.to_vec()));
        if pipeline.last().is_some_and(|stage| stage.get("$count").is_some()) {
            return Ok(vec![serde_json::json!({ "count": self.count })]);
        }
        Ok(self.output.clone())
    }
}

/// Manager registry routing every resource to `connection`.
pub fn relational_managers(connection: Arc<RecordingSql>) -> StaticManagerRegistry {
    StaticManagerRegistry::new().with_default(Manager::Relational(connection))
}

pub fn document_managers(connection: Arc<RecordingDocuments>) -> StaticManagerRegistry {
    StaticManagerRegistry::new().with_default(Manager::Document(connection))
}

/// Assertion helpers for rendered queries.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value equals expected.
    pub fn json_eq(actual: &Value, expected: &Value) {
        assert_eq!(actual, expected, "JSON mismatch:\nactual: {actual:#}\nexpected: {expected:#}");
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that a string does not contain a substring.
    pub fn not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "Expected string to NOT contain '{needle}'\nActual: {haystack}"
        );
    }
}
