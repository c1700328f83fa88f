//! Error types for the data-access layer
//!
//! This module defines all error types that can occur while building,
//! executing and materializing queries.

/// Result type alias for data-access operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Error types for data-access operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Malformed input to a builder or field API
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Missing field, relation or collection key
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Operation not allowed in the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Mutation attempted on a view-backed entity
    #[error("Entity '{0}' is read-only")]
    ReadOnlyEntity(String),

    /// Unique or primary-key constraint violation
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Generic backend failure while executing a command
    #[error("Query execution error: {message} [{sql}]")]
    QueryExecute { message: String, sql: String },

    /// Failure to establish a backend connection
    #[error("Connection error: {0}")]
    DbConnection(String),

    /// Malformed predicate text
    #[error("Parse error at token {position} ('{token}'): {message}")]
    Parse {
        message: String,
        token: String,
        position: usize,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[source] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// IO errors that wrap a [`DatabaseError`] (raised through `std::io::Read`
/// impls) unwrap back to it; anything else becomes [`DatabaseError::Io`]
impl From<std::io::Error> for DatabaseError {
    fn from(e: std::io::Error) -> Self {
        if !e.get_ref().is_some_and(|inner| inner.is::<DatabaseError>()) {
            return DatabaseError::Io(e);
        }
        let kind = e.kind();
        match e.into_inner().map(|inner| inner.downcast::<DatabaseError>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(inner)) => DatabaseError::Io(std::io::Error::new(kind, inner)),
            None => DatabaseError::Io(kind.into()),
        }
    }
}

impl DatabaseError {
    /// Create an invalid parameter error
    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        DatabaseError::InvalidParameter(msg.into())
    }

    /// Create a key not found error
    pub fn key_not_found<S: Into<String>>(key: S) -> Self {
        DatabaseError::KeyNotFound(key.into())
    }

    /// Create an invalid operation error
    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        DatabaseError::InvalidOperation(msg.into())
    }

    /// Create a read-only entity error
    pub fn read_only<S: Into<String>>(entity: S) -> Self {
        DatabaseError::ReadOnlyEntity(entity.into())
    }

    /// Create a duplicate key error
    pub fn duplicate_key<S: Into<String>>(msg: S) -> Self {
        DatabaseError::DuplicateKey(msg.into())
    }

    /// Create a query execution error carrying the driver message and SQL text
    pub fn query_execute(message: impl Into<String>, sql: impl Into<String>) -> Self {
        DatabaseError::QueryExecute {
            message: message.into(),
            sql: sql.into(),
        }
    }

    /// Create a connection error
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        DatabaseError::DbConnection(msg.into())
    }

    /// Create a parse error for the token at `position`
    pub fn parse(message: impl Into<String>, token: impl Into<String>, position: usize) -> Self {
        DatabaseError::Parse {
            message: message.into(),
            token: token.into(),
            position,
        }
    }

    /// Whether this error is a unique-constraint violation
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, DatabaseError::DuplicateKey(_))
    }
}
