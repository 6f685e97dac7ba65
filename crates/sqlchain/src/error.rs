//! Error types for sqlchain

use thiserror::Error;

/// Result type alias for sqlchain operations
pub type ChainResult<T> = Result<T, ChainError>;

/// Error types for command building and execution
#[derive(Debug, Error)]
pub enum ChainError {
    /// A member, dictionary key, desired column or sort column could not be
    /// correlated to a column of the named object.
    #[error("Mapping error on {object}: {message}")]
    Mapping { object: String, message: String },

    /// The dialect cannot do what was asked.
    #[error("Not supported: {0}")]
    Unsupported(String),

    /// A required argument was missing.
    #[error("Argument '{0}' must not be null")]
    ArgumentNull(&'static str),

    /// A required argument was empty.
    #[error("Argument '{0}' must not be empty")]
    ArgumentEmpty(&'static str),

    /// An argument was present but unusable.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The calling layer misused the builder.
    #[error("Internal invariant violated: {0}")]
    Invariant(String),

    /// The metadata cache could not resolve an object.
    #[error("Database object not found: {0}")]
    MissingObject(String),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// More rows than the requested shape allows
    #[error("Too many rows: expected {expected}, got {got}")]
    TooManyRows { expected: usize, got: usize },

    /// A write touched a different number of rows than expected
    #[error("Unexpected row count: expected {expected}, got {got}")]
    UnexpectedRowCount { expected: u64, got: u64 },

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),
}

impl ChainError {
    /// Create a mapping error for a table, view or routine.
    pub fn mapping(object: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::Mapping {
            object: object.to_string(),
            message: message.into(),
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an unsupported-operation error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Create an invariant error
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }

    /// Create a too-many-rows error
    pub fn too_many_rows(expected: usize, got: usize) -> Self {
        Self::TooManyRows { expected, got }
    }

    /// Check if this is a mapping error
    pub fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping { .. })
    }

    /// Check if this is an unsupported-operation error
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for ChainError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
