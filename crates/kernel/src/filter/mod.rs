//! Collection filters, their registry and the filter extension.
//!
//! Filters are registered by identifier at start-up and activated per
//! operation through its declared filter list. Capabilities are captured at
//! registration so the extension never has to inspect concrete types.

pub mod declaration;
pub mod request;

pub use declaration::{FilterDeclaration, FilterKind};
pub use request::{
    FilterProperties, RangeCondition, RangeOperator, SearchMode, SearchStrategy,
    extract_identifier, parse_boolean, scalar_values, typed_value,
};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::context::QueryContext;
use crate::error::QueryResult;
use crate::extension::QueryCollectionExtension;
use crate::operation::Operation;

/// What a filter does besides restricting rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterCapabilities {
    /// Adds sort clauses; applied after every non-sorting filter.
    pub sorts: bool,
    /// Restricts without affecting relevance scoring.
    pub constant_score: bool,
    /// Replaces the query result instead of narrowing it.
    pub produces_result: bool,
    /// Accepts `prop[]=a&prop[]=b` array values.
    pub array_values: bool,
}

/// A request-driven mutation of a builder `B`.
pub trait Filter<B>: Send + Sync {
    fn apply(
        &self,
        builder: &mut B,
        resource: &str,
        operation: &Operation,
        ctx: &mut QueryContext,
    ) -> QueryResult<()>;

    fn capabilities(&self) -> FilterCapabilities {
        FilterCapabilities::default()
    }
}

/// Validate a filter identifier: non-empty, alphanumeric plus `_`, `-` and
/// `.`, starting with a letter or underscore, at most 64 chars.
fn is_valid_filter_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        && id.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
}

struct Registration<B> {
    filter: Arc<dyn Filter<B>>,
    capabilities: FilterCapabilities,
}

/// Filter implementations keyed by identifier.
pub struct FilterRegistry<B> {
    filters: HashMap<String, Registration<B>>,
}

impl<B> Default for FilterRegistry<B> {
    fn default() -> Self {
        Self {
            filters: HashMap::new(),
        }
    }
}

impl<B> FilterRegistry<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter. Returns a warning when the identifier is rejected
    /// or replaces an existing registration.
    pub fn register(&mut self, id: &str, filter: Arc<dyn Filter<B>>) -> Option<String> {
        if !is_valid_filter_id(id) {
            return Some(format!(
                "filter id '{id}' is invalid (must be alphanumeric/underscore/hyphen/dot, start with letter or underscore)"
            ));
        }
        let capabilities = filter.capabilities();
        let previous = self.filters.insert(
            id.to_string(),
            Registration {
                filter,
                capabilities,
            },
        );
        previous.map(|_| format!("filter '{id}' overwrites existing registration"))
    }

    /// Register declared filters, building each with `build`.
    pub fn apply_declarations<F>(&mut self, declarations: &[FilterDeclaration], build: F) -> Vec<String>
    where
        F: Fn(&FilterDeclaration) -> Arc<dyn Filter<B>>,
    {
        declarations
            .iter()
            .filter_map(|declaration| self.register(&declaration.id, build(declaration)))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Filter<B>>> {
        self.filters.get(id).map(|r| &r.filter)
    }

    pub fn capabilities(&self, id: &str) -> Option<FilterCapabilities> {
        self.filters.get(id).map(|r| r.capabilities)
    }

    pub fn has(&self, id: &str) -> bool {
        self.filters.contains_key(id)
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Resolve an operation's declared filters, in declaration order.
    /// Unknown identifiers are skipped.
    pub fn resolve(&self, operation: &Operation) -> ResolvedFilters<B> {
        let mut entries = Vec::with_capacity(operation.filters.len());
        for id in &operation.filters {
            match self.filters.get(id) {
                Some(registration) => entries.push(ResolvedFilter {
                    id: id.clone(),
                    filter: Arc::clone(&registration.filter),
                    capabilities: registration.capabilities,
                }),
                None => {
                    tracing::debug!(filter = %id, operation = %operation.name, "skipping unknown filter");
                }
            }
        }
        ResolvedFilters { entries }
    }
}

/// One filter handle resolved for an operation.
pub struct ResolvedFilter<B> {
    pub id: String,
    pub filter: Arc<dyn Filter<B>>,
    pub capabilities: FilterCapabilities,
}

/// An operation's filters, resolved once.
pub struct ResolvedFilters<B> {
    entries: Vec<ResolvedFilter<B>>,
}

impl<B> ResolvedFilters<B> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResolvedFilter<B>> {
        self.entries.iter()
    }

    /// Non-sorting filters first, then sorting ones, each group in declaration order.
    pub fn in_application_order(&self) -> impl Iterator<Item = &ResolvedFilter<B>> {
        let restricting = self.entries.iter().filter(|f| !f.capabilities.sorts);
        let sorting = self.entries.iter().filter(|f| f.capabilities.sorts);
        restricting.chain(sorting)
    }
}

/// Applies the operation's declared filters to a builder.
///
/// Each distinct filter list is resolved against the registry once and
/// reused for later requests.
pub struct FilterExtension<B> {
    registry: Arc<FilterRegistry<B>>,
    resolved: RwLock<HashMap<Vec<String>, Arc<ResolvedFilters<B>>>>,
}

impl<B> FilterExtension<B> {
    pub fn new(registry: Arc<FilterRegistry<B>>) -> Self {
        Self {
            registry,
            resolved: RwLock::new(HashMap::new()),
        }
    }

    /// Resolved filters for `operation`, cached by its filter list.
    pub fn resolved(&self, operation: &Operation) -> Arc<ResolvedFilters<B>> {
        if let Some(cached) = self.resolved.read().get(&operation.filters) {
            return Arc::clone(cached);
        }
        let mut cache = self.resolved.write();
        let entry = cache
            .entry(operation.filters.clone())
            .or_insert_with(|| Arc::new(self.registry.resolve(operation)));
        Arc::clone(entry)
    }
}

impl<B> QueryCollectionExtension<B> for FilterExtension<B> {
    fn apply_to_collection(
        &self,
        builder: &mut B,
        resource: &str,
        operation: &Operation,
        ctx: &mut QueryContext,
    ) -> QueryResult<()> {
        let resolved = self.resolved(operation);
        for entry in resolved.in_application_order() {
            tracing::trace!(filter = %entry.id, resource, "applying filter");
            entry.filter.apply(builder, resource, operation, ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    struct Tag {
        name: &'static str,
        sorts: bool,
    }

    impl Filter<Vec<&'static str>> for Tag {
        fn apply(
            &self,
            builder: &mut Vec<&'static str>,
            _resource: &str,
            _operation: &Operation,
            _ctx: &mut QueryContext,
        ) -> QueryResult<()> {
            builder.push(self.name);
            Ok(())
        }

        fn capabilities(&self) -> FilterCapabilities {
            FilterCapabilities {
                sorts: self.sorts,
                ..Default::default()
            }
        }
    }

    fn registry() -> FilterRegistry<Vec<&'static str>> {
        let mut registry = FilterRegistry::new();
        for (id, sorts) in [("book.order", true), ("book.search", false), ("book.range", false)] {
            assert!(registry.register(id, Arc::new(Tag { name: id, sorts })).is_none());
        }
        registry
    }

    #[test]
    fn invalid_ids_are_rejected() {
        let mut registry = registry();
        let long = "x".repeat(65);
        for bad in ["", "9lives", "has space", "semi;colon", long.as_str()] {
            let warning = registry.register(bad, Arc::new(Tag { name: "x", sorts: false }));
            assert!(warning.is_some(), "{bad:?} should be rejected");
        }
        assert_eq!(registry.ids(), vec!["book.order", "book.range", "book.search"]);
    }

    #[test]
    fn overwrite_warns() {
        let mut registry = registry();
        let warning = registry
            .register("book.search", Arc::new(Tag { name: "again", sorts: false }))
            .unwrap();
        assert!(warning.contains("overwrites"));
        assert!(registry.has("book.search"));
    }

    #[test]
    fn capabilities_are_captured() {
        let registry = registry();
        assert!(registry.capabilities("book.order").unwrap().sorts);
        assert!(!registry.capabilities("book.search").unwrap().sorts);
        assert!(registry.capabilities("missing").is_none());
    }

    #[test]
    fn sorting_filters_apply_last_and_unknown_are_skipped() {
        let registry = Arc::new(registry());
        let extension = FilterExtension::new(Arc::clone(&registry));
        let op = Operation::collection("Book").with_filters(&[
            "book.order",
            "missing",
            "book.search",
            "book.range",
        ]);

        assert_eq!(registry.resolve(&op).len(), 3);

        let mut builder = Vec::new();
        extension
            .apply_to_collection(&mut builder, "Book", &op, &mut QueryContext::new())
            .unwrap();
        assert_eq!(builder, vec!["book.search", "book.range", "book.order"]);
    }

    #[test]
    fn resolution_is_cached_per_filter_list() {
        let extension = FilterExtension::new(Arc::new(registry()));
        let search = Operation::collection("Book").with_filters(&["book.search", "book.order"]);
        let first = extension.resolved(&search);
        let again = extension.resolved(&search.clone());
        assert!(Arc::ptr_eq(&first, &again));

        let range = Operation::collection("Book").with_filters(&["book.range"]);
        let other = extension.resolved(&range);
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(other.len(), 1);
    }
}
