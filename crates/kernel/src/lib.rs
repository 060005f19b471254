//! Quarry Kernel Library
//!
//! Collection query extensions for relational and document backends:
//! request filters, ordering and pagination applied to a query builder
//! (SQL via sea-query) or an aggregation pipeline (JSON stages), plus the
//! paginators and cursor connections that wrap the results.
//!
//! The `quarry` binary renders the query a request would produce.

pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod extension;
pub mod filter;
pub mod manager;
pub mod metadata;
pub mod operation;
pub mod pagination;
pub mod property;
pub mod relational;
pub mod schema;

pub use config::Config;
pub use context::QueryContext;
pub use error::{ErrorKind, QueryError, QueryResult};
pub use extension::{CollectionResult, ExtensionChain, QueryCollectionExtension, QueryResultCollectionExtension};
pub use manager::{DocumentConnection, Manager, ManagerRegistry, RelationalConnection, StaticManagerRegistry};
pub use metadata::{EntityMetadata, FieldType, MetadataRegistry, Relation};
pub use operation::{DefaultOrder, Operation, OperationPagination, SortDirection};
pub use pagination::{Connection, ConnectionArgs, OrderOptions, Pagination, PaginationOptions, Paginator};
pub use schema::Schema;
