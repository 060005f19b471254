//! Document backend: aggregation pipeline, lookups, filters and the order
//! and pagination extensions.

pub mod filter;
pub mod lookup;
pub mod order;
pub mod pagination;
pub mod paginator;
pub mod pipeline;
pub mod provider;

pub use lookup::{LookupPath, add_lookup, add_lookups_for_nested_property, add_optional_lookup};
pub use order::OrderExtension;
pub use pagination::PaginationExtension;
pub use paginator::paginator_from_facet;
pub use pipeline::{Pipeline, Stage};
pub use provider::{CollectionProvider, default_chain, filter_registry};
