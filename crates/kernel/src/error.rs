//! Query pipeline error types.

use thiserror::Error;

/// Errors raised while shaping or executing a collection query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A request parameter was out of range or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The resource or metadata declaration cannot be expressed by the backend.
    #[error("mapping error: {0}")]
    Mapping(String),

    /// An extension was handed a manager of the wrong backend family.
    #[error("the manager for \"{resource}\" must be a {expected} manager")]
    BackendMismatch {
        resource: String,
        expected: &'static str,
    },

    /// An alias was referenced that the query builder does not contain.
    #[error("the alias \"{0}\" does not exist in the query builder")]
    UnknownAlias(String),

    /// No metadata is registered for the requested resource.
    #[error("resource \"{0}\" is not mapped")]
    ResourceNotFound(String),

    #[error("backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Coarse classification used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request is wrong; retrying with other parameters may succeed.
    Client,
    /// The resource declaration is wrong.
    Configuration,
    /// Wiring bug or backend failure.
    Internal,
}

impl QueryError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::InvalidArgument(_) => ErrorKind::Client,
            QueryError::Mapping(_) | QueryError::ResourceNotFound(_) => ErrorKind::Configuration,
            QueryError::BackendMismatch { .. }
            | QueryError::UnknownAlias(_)
            | QueryError::Backend(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status a REST layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Client => 400,
            ErrorKind::Configuration | ErrorKind::Internal => {
                tracing::error!(error = %self, "collection query failed");
                500
            }
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        QueryError::InvalidArgument(message.into())
    }

    pub(crate) fn mapping(message: impl Into<String>) -> Self {
        QueryError::Mapping(message.into())
    }
}

/// Result type alias using QueryError.
pub type QueryResult<T> = Result<T, QueryError>;
