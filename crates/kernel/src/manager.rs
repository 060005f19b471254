//! Backend connections and the registry that hands them out per resource.
//!
//! Execution is synchronous and blocking; the traits are small enough for
//! tests to implement in memory.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{QueryError, QueryResult};

/// Executes rendered SQL against a relational store.
pub trait RelationalConnection: Send + Sync {
    /// Run a SELECT and return one JSON object per row.
    fn fetch_rows(&self, sql: &str) -> anyhow::Result<Vec<Value>>;

    /// Run a single-column COUNT query.
    fn fetch_count(&self, sql: &str) -> anyhow::Result<u64>;
}

/// Runs aggregation pipelines against a document store.
pub trait DocumentConnection: Send + Sync {
    fn aggregate(&self, collection: &str, pipeline: &[Value]) -> anyhow::Result<Vec<Value>>;
}

/// A manager of one backend family.
#[derive(Clone)]
pub enum Manager {
    Relational(Arc<dyn RelationalConnection>),
    Document(Arc<dyn DocumentConnection>),
}

impl Manager {
    pub fn family(&self) -> &'static str {
        match self {
            Manager::Relational(_) => "relational",
            Manager::Document(_) => "document",
        }
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Manager").field(&self.family()).finish()
    }
}

/// Resolves the manager responsible for a resource.
pub trait ManagerRegistry: Send + Sync {
    fn manager_for(&self, resource: &str) -> Option<Manager>;
}

/// Relational connection for `resource`, or [`QueryError::BackendMismatch`].
pub fn relational_connection(
    registry: &dyn ManagerRegistry,
    resource: &str,
) -> QueryResult<Arc<dyn RelationalConnection>> {
    match registry.manager_for(resource) {
        Some(Manager::Relational(connection)) => Ok(connection),
        _ => Err(QueryError::BackendMismatch {
            resource: resource.to_string(),
            expected: "relational",
        }),
    }
}

/// Document connection for `resource`, or [`QueryError::BackendMismatch`].
pub fn document_connection(
    registry: &dyn ManagerRegistry,
    resource: &str,
) -> QueryResult<Arc<dyn DocumentConnection>> {
    match registry.manager_for(resource) {
        Some(Manager::Document(connection)) => Ok(connection),
        _ => Err(QueryError::BackendMismatch {
            resource: resource.to_string(),
            expected: "document",
        }),
    }
}

/// Fixed mapping of resources to managers with an optional fallback.
#[derive(Debug, Clone, Default)]
pub struct StaticManagerRegistry {
    default: Option<Manager>,
    resources: HashMap<String, Manager>,
}

impl StaticManagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager used for every resource without an explicit entry.
    pub fn with_default(mut self, manager: Manager) -> Self {
        self.default = Some(manager);
        self
    }

    pub fn with_resource(mut self, resource: &str, manager: Manager) -> Self {
        self.resources.insert(resource.to_string(), manager);
        self
    }
}

impl ManagerRegistry for StaticManagerRegistry {
    fn manager_for(&self, resource: &str) -> Option<Manager> {
        self.resources
            .get(resource)
            .or(self.default.as_ref())
            .cloned()
    }
}
