//! Collection extension seams shared by both backends.
//!
//! An extension mutates a builder (`relational::QueryBuilder` or
//! `document::Pipeline`). A *result* extension may additionally take over
//! execution and return the final view; the chain stops at the first one that
//! supports the request.

use serde_json::Value;
use std::sync::Arc;

use crate::context::QueryContext;
use crate::error::QueryResult;
use crate::operation::Operation;
use crate::pagination::{Connection, ConnectionArgs, Paginator, PartialPaginator};

/// Mutates a collection query builder.
pub trait QueryCollectionExtension<B>: Send + Sync {
    fn apply_to_collection(
        &self,
        builder: &mut B,
        resource: &str,
        operation: &Operation,
        ctx: &mut QueryContext,
    ) -> QueryResult<()>;

    /// The result capability of this extension, if it has one.
    fn as_result_extension(&self) -> Option<&dyn QueryResultCollectionExtension<B>> {
        None
    }
}

/// Produces the final collection result instead of the default execution.
pub trait QueryResultCollectionExtension<B>: Send + Sync {
    fn supports_result(&self, resource: &str, operation: &Operation, ctx: &QueryContext) -> bool;

    fn get_result(
        &self,
        builder: &B,
        resource: &str,
        operation: &Operation,
        ctx: &mut QueryContext,
    ) -> QueryResult<CollectionResult>;
}

/// Outcome of running a collection query.
pub enum CollectionResult {
    Paginated(Box<dyn Paginator>),
    Partial(Box<dyn PartialPaginator>),
    Items(Vec<Value>),
}

impl CollectionResult {
    pub fn items(&self) -> &[Value] {
        match self {
            CollectionResult::Paginated(paginator) => paginator.items(),
            CollectionResult::Partial(paginator) => paginator.items(),
            CollectionResult::Items(items) => items,
        }
    }

    pub fn paginator(&self) -> Option<&dyn Paginator> {
        match self {
            CollectionResult::Paginated(paginator) => Some(paginator.as_ref()),
            _ => None,
        }
    }

    /// Relay connection for the graph layer; plain item lists get no cursor view.
    pub fn to_connection(&self, args: &ConnectionArgs) -> QueryResult<Option<Connection>> {
        match self {
            CollectionResult::Paginated(paginator) => {
                Connection::from_paginator(paginator.as_ref(), args).map(Some)
            }
            CollectionResult::Partial(paginator) => {
                Connection::from_partial(paginator.as_ref(), args).map(Some)
            }
            CollectionResult::Items(_) => Ok(None),
        }
    }
}

impl std::fmt::Debug for CollectionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionResult::Paginated(p) => f
                .debug_struct("Paginated")
                .field("count", &p.count())
                .field("current_page", &p.current_page())
                .field("total_items", &p.total_items())
                .finish(),
            CollectionResult::Partial(p) => f
                .debug_struct("Partial")
                .field("count", &p.count())
                .field("current_page", &p.current_page())
                .finish(),
            CollectionResult::Items(items) => f.debug_tuple("Items").field(&items.len()).finish(),
        }
    }
}

/// Ordered list of extensions run over one builder.
pub struct ExtensionChain<B> {
    extensions: Vec<Arc<dyn QueryCollectionExtension<B>>>,
}

impl<B> Default for ExtensionChain<B> {
    fn default() -> Self {
        Self {
            extensions: Vec::new(),
        }
    }
}

impl<B> ExtensionChain<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, extension: Arc<dyn QueryCollectionExtension<B>>) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Apply every extension, then let the first supporting result extension
    /// produce the result. Falls back to `execute` on the mutated builder.
    pub fn run<F>(
        &self,
        builder: &mut B,
        resource: &str,
        operation: &Operation,
        ctx: &mut QueryContext,
        execute: F,
    ) -> QueryResult<CollectionResult>
    where
        F: FnOnce(&B) -> QueryResult<Vec<Value>>,
    {
        for extension in &self.extensions {
            extension.apply_to_collection(builder, resource, operation, ctx)?;

            if let Some(result) = extension.as_result_extension()
                && result.supports_result(resource, operation, ctx)
            {
                return result.get_result(builder, resource, operation, ctx);
            }
        }

        Ok(CollectionResult::Items(execute(builder)?))
    }

    /// Apply every extension without executing anything.
    pub fn apply(
        &self,
        builder: &mut B,
        resource: &str,
        operation: &Operation,
        ctx: &mut QueryContext,
    ) -> QueryResult<()> {
        for extension in &self.extensions {
            extension.apply_to_collection(builder, resource, operation, ctx)?;
        }
        Ok(())
    }
}
