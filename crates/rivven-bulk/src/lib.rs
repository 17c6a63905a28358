//! # rivven-bulk
//!
//! Typed bulk loading of record streams into relational tables.
//!
//! A record shape is described once by a static field-descriptor table
//! (usually `#[derive(BulkRecord)]`). Exclusions drop fields by marker kind
//! or by name, the remaining fields are mapped onto destination columns,
//! and records are streamed to the store in fixed-size batches through a
//! connection or a caller-owned transaction.
//!
//! ## Features
//!
//! - **Descriptor cache**: record types and column mappings are built once per shape
//! - **Exclusions**: by marker kind (`#[bulk(marker = "audit")]`) or by field name
//! - **Batched streaming**: bounded memory, per-batch timeout, cooperative cancellation
//! - **Transactions**: batches join the caller's transaction; no implicit commit
//! - **T-SQL helpers**: truncate, drop, rename, scalar and existence queries
//! - **In-memory store**: a [`memory::MemoryStore`] backend for tests and dry runs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rivven_bulk::prelude::*;
//!
//! #[derive(BulkRecord)]
//! struct User {
//!     id: i64,
//!     name: String,
//!     #[bulk(skip)]
//!     secret: String,
//! }
//!
//! let conn = SqlServerConnection::from_url("sqlserver://sa:pw@localhost/app").await?;
//! let summary = BulkLoader::new(LoadOptions::new().with_batch_size(5000))
//!     .load(LoadExecutor::connection(&conn), "dbo.Users", users)
//!     .await?;
//! println!("{} rows in {} batches", summary.rows_written, summary.batches_written);
//! ```
//!
//! ## Feature Flags
//!
//! - `derive` (default) - `#[derive(BulkRecord)]`
//! - `sqlserver` - SQL Server backend via tiberius
//! - `full` - All features enabled

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

// Lets the derive's `::rivven_bulk::` paths resolve inside this crate's tests.
extern crate self as rivven_bulk;

pub mod commands;
pub mod config;
pub mod connection;
pub mod diagnostics;
pub mod error;
pub mod exclusion;
pub mod loader;
pub mod mapping;
pub mod memory;
pub mod record;
pub mod security;
pub mod source;
pub mod types;
pub mod writer;

#[cfg(feature = "sqlserver")]
pub mod sqlserver;

/// Prelude module for convenient imports
pub mod prelude {
    // Error types
    pub use crate::error::{Error, ErrorCategory, Result};

    // Value and record model
    pub use crate::record::{BulkRecord, FieldDescriptor, RecordType, RecordTypeBuilder};
    pub use crate::types::{Row, SqlTyped, ToValue, Value, ValueKind};

    #[cfg(feature = "derive")]
    pub use rivven_bulk_derive::BulkRecord;

    // Exclusions and mapping
    pub use crate::exclusion::ExclusionConfig;
    pub use crate::mapping::{
        ColumnMapper, ColumnMapping, ColumnNamingStrategy, IdentityNaming, MappingCache,
    };

    // Connections
    pub use crate::connection::{
        Connection, ConnectionConfig, ConnectionFactory, LoadExecutor, Transaction,
    };

    // Loading
    pub use crate::config::{LoadOptions, LoadTarget};
    pub use crate::loader::{bulk_load, bulk_load_blocking, BulkLoader};
    pub use crate::source::{IterSource, RecordSource, StreamSource};
    pub use crate::writer::{BatchWriter, LoadStats, LoadSummary};

    pub use crate::memory::MemoryStore;

    #[cfg(feature = "sqlserver")]
    pub use crate::sqlserver::{SqlServerConnection, SqlServerConnectionFactory};

    pub use tokio_util::sync::CancellationToken;
}

// Re-export commonly used items at crate root
pub use error::{Error, Result};
pub use record::{BulkRecord, FieldDescriptor};
pub use types::{ToValue, Value, ValueKind};

#[cfg(feature = "derive")]
pub use rivven_bulk_derive::BulkRecord;
