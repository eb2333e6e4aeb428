//! # Structured Error Types
//!
//! Every producer failure that reaches a state container is converted into a
//! [`QueryError`] and stored in the container's `error` field. Producers are free to
//! return their own error types as long as they convert `Into<QueryError>`.
//!
//! ## Examples
//!
//! ```rust
//! use store_query::errors::QueryError;
//!
//! fn parse_total(raw: &str) -> Result<u64, QueryError> {
//!     raw.parse()
//!         .map_err(|_| QueryError::DataParsing(format!("invalid total: {raw}")))
//! }
//!
//! assert!(parse_total("45").is_ok());
//! assert!(parse_total("many").is_err());
//! ```
//!
//! ### Using custom domain-specific errors:
//! ```rust
//! use store_query::errors::QueryError;
//! use thiserror::Error;
//!
//! #[derive(Error, Debug, Clone, PartialEq)]
//! pub enum TodoError {
//!     #[error("Todo not found: {id}")]
//!     NotFound { id: u32 },
//! }
//!
//! impl From<TodoError> for QueryError {
//!     fn from(error: TodoError) -> Self {
//!         QueryError::Generic(error.to_string())
//!     }
//! }
//! ```

use thiserror::Error;

/// Common error types for query and mutation operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Network or HTTP errors
    #[error("Network error: {0}")]
    Network(String),

    /// External service errors
    #[error("External service '{service}' error: {error}")]
    ExternalService { service: String, error: String },

    /// Data parsing or serialization errors
    #[error("Data parsing error: {0}")]
    DataParsing(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization errors
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The requested resource does not exist
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Cache errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// Generic errors for cases not covered above
    #[error("Query error: {0}")]
    Generic(String),
}

/// Convenience type alias for Results with QueryError
pub type QueryResult<T> = Result<T, QueryError>;

impl From<String> for QueryError {
    fn from(error: String) -> Self {
        QueryError::Generic(error)
    }
}

impl From<&str> for QueryError {
    fn from(error: &str) -> Self {
        QueryError::Generic(error.to_string())
    }
}

impl From<QueryError> for String {
    fn from(error: QueryError) -> Self {
        error.to_string()
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(error: serde_json::Error) -> Self {
        QueryError::DataParsing(error.to_string())
    }
}
