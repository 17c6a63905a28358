//! Error types for rivven-bulk
//!
//! Load-level failures are split so callers can react to each one:
//! - Mapping errors (empty record shape, everything excluded)
//! - Timeouts (a batch handoff exceeded the configured deadline)
//! - Store errors (the destination rejected a batch, with batch context)
//! - Cancellation (the caller aborted a non-blocking load)
//!
//! Nothing in this crate retries. Every error crosses the call boundary as-is.

use std::fmt;
use std::ops::Range;
use thiserror::Error;

/// Result type for rivven-bulk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Column mapping could not be derived
    Mapping,
    /// Client-side deadline exceeded
    Timeout,
    /// Destination store rejected a batch
    Store,
    /// Load cancelled by the caller
    Cancelled,
    /// Connection-related errors
    Connection,
    /// Query execution errors
    Query,
    /// Transaction errors
    Transaction,
    /// Constraint violation
    Constraint,
    /// Type conversion errors
    TypeConversion,
    /// Configuration error
    Configuration,
    /// Unknown/other errors
    Other,
}

/// Main error type for rivven-bulk
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    /// Record shape produced no usable column mapping
    #[error("mapping error for {record}: {message}")]
    Mapping { record: String, message: String },

    /// A batch write exceeded the configured timeout
    #[error("timeout: {message}")]
    Timeout { message: String },

    /// The destination store failed while writing a batch
    #[error("store error on {table} batch {batch} (rows {}..{}): {source}", .rows.start, .rows.end)]
    Store {
        table: String,
        batch: u64,
        rows: Range<u64>,
        #[source]
        source: Box<Error>,
    },

    /// The caller cancelled the load
    #[error("load cancelled after {rows_written} rows")]
    Cancelled { rows_written: u64 },

    /// Connection failed
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query execution failed
    #[error("query error: {message}")]
    Query {
        message: String,
        sql: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Transaction error
    #[error("transaction error: {message}")]
    Transaction { message: String },

    /// Constraint violation (PK, FK, unique, check)
    #[error("constraint violation: {constraint_name} - {message}")]
    Constraint {
        constraint_name: String,
        message: String,
    },

    /// Type conversion failed
    #[error("type conversion error: {message}")]
    TypeConversion { message: String },

    /// Configuration error
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Unsupported operation for this backend
    #[error("unsupported: {message}")]
    Unsupported { message: String },
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Mapping { .. } => ErrorCategory::Mapping,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Store { .. } => ErrorCategory::Store,
            Self::Cancelled { .. } => ErrorCategory::Cancelled,
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::Query { .. } => ErrorCategory::Query,
            Self::Transaction { .. } => ErrorCategory::Transaction,
            Self::Constraint { .. } => ErrorCategory::Constraint,
            Self::TypeConversion { .. } => ErrorCategory::TypeConversion,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Unsupported { .. } => ErrorCategory::Other,
        }
    }

    /// Whether this is a mapping error
    #[inline]
    pub fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping { .. })
    }

    /// Whether this is a client-side timeout
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether the caller cancelled the load
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Whether the destination store rejected a batch
    #[inline]
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store { .. })
    }

    /// The backend error behind a store failure, if any
    pub fn store_cause(&self) -> Option<&Error> {
        match self {
            Self::Store { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Create a mapping error
    pub fn mapping(record: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Mapping {
            record: record.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Wrap a backend error with the batch that caused it
    pub fn store(table: impl Into<String>, batch: u64, rows: Range<u64>, source: Error) -> Self {
        Self::Store {
            table: table.into(),
            batch,
            rows,
            source: Box::new(source),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(rows_written: u64) -> Self {
        Self::Cancelled { rows_written }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a query error
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql: None,
            source: None,
        }
    }

    /// Create a query error with SQL
    pub fn query_with_sql(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql: Some(sql.into()),
            source: None,
        }
    }

    /// Create a transaction error
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Create a constraint violation
    pub fn constraint(constraint_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Constraint {
            constraint_name: constraint_name.into(),
            message: message.into(),
        }
    }

    /// Create a type conversion error
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::TypeConversion {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an unsupported operation error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::config(format!("invalid load options: {}", errors))
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mapping => write!(f, "mapping"),
            Self::Timeout => write!(f, "timeout"),
            Self::Store => write!(f, "store"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Connection => write!(f, "connection"),
            Self::Query => write!(f, "query"),
            Self::Transaction => write!(f, "transaction"),
            Self::Constraint => write!(f, "constraint"),
            Self::TypeConversion => write!(f, "type_conversion"),
            Self::Configuration => write!(f, "configuration"),
            Self::Other => write!(f, "other"),
        }
    }
}
