//! Relational backend: query builder, join resolution, filters and the
//! order and pagination extensions.

pub mod builder;
pub mod filter;
pub mod join;
pub mod order;
pub mod pagination;
pub mod provider;
pub mod query_checker;

pub use builder::{JoinKind, QueryBuilder, ROOT_ALIAS, SqlPlan};
pub use join::{add_join_once, add_joins_for_nested_property, entity_by_alias, traverse_joins};
pub use order::OrderExtension;
pub use pagination::PaginationExtension;
pub use provider::{CollectionProvider, default_chain, filter_registry};
