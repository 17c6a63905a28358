//! Load configuration for rivven-bulk
//!
//! # Example
//!
//! ```yaml
//! batch_size: 5000
//! timeout_secs: 3600
//! exclude_marker_kinds: ["audit", "computed"]
//! exclude_field_names: ["display_name"]
//! table_lock: true
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use validator::Validate;

use crate::error::{Error, Result};
use crate::exclusion::ExclusionConfig;
use crate::security::validate_table_name;

/// Default maximum rows per batch
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Default per-batch timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

/// Options for one bulk load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, JsonSchema)]
pub struct LoadOptions {
    /// Maximum rows per batch (default: 5000)
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, max = 1000000))]
    pub batch_size: usize,

    /// Per-batch timeout in seconds (default: 3600)
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,

    /// Exclude fields carrying any of these marker kinds
    #[serde(default)]
    pub exclude_marker_kinds: BTreeSet<String>,

    /// Exclude fields with these names
    #[serde(default)]
    pub exclude_field_names: BTreeSet<String>,

    /// Request a table-level lock for the load
    #[serde(default)]
    pub table_lock: bool,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            exclude_marker_kinds: BTreeSet::new(),
            exclude_field_names: BTreeSet::new(),
            table_lock: false,
        }
    }
}

impl LoadOptions {
    /// Options with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set batch size
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set per-batch timeout
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Exclude fields carrying this marker kind
    pub fn with_exclude_marker_kind(mut self, kind: impl Into<String>) -> Self {
        self.exclude_marker_kinds.insert(kind.into());
        self
    }

    /// Exclude the named field
    pub fn with_exclude_field_name(mut self, name: impl Into<String>) -> Self {
        self.exclude_field_names.insert(name.into());
        self
    }

    /// Request a table lock
    pub fn with_table_lock(mut self, table_lock: bool) -> Self {
        self.table_lock = table_lock;
        self
    }

    /// Per-batch timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate option values
    pub fn validate_options(&self) -> Result<()> {
        self.validate().map_err(Error::from)
    }

    /// Exclusion rules carried by these options
    pub fn exclusion(&self) -> ExclusionConfig {
        ExclusionConfig {
            marker_kinds: self.exclude_marker_kinds.clone(),
            field_names: self.exclude_field_names.clone(),
        }
    }

    /// Validate and build the load target for a table
    pub fn target(&self, table: impl Into<String>) -> Result<LoadTarget> {
        self.validate_options()?;
        let target = LoadTarget {
            table: table.into(),
            batch_size: self.batch_size,
            timeout: self.timeout(),
            table_lock: self.table_lock,
        };
        target.validate()?;
        Ok(target)
    }
}

/// Destination and limits of one load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTarget {
    /// Destination table
    pub table: String,
    /// Maximum rows per batch
    pub batch_size: usize,
    /// Per-batch timeout
    pub timeout: Duration,
    /// Request a table-level lock
    pub table_lock: bool,
}

impl LoadTarget {
    /// Target with default batch size and timeout
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            table_lock: false,
        }
    }

    /// Set batch size
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set per-batch timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Request a table lock
    pub fn with_table_lock(mut self, table_lock: bool) -> Self {
        self.table_lock = table_lock;
        self
    }

    /// Check the table name and limits
    pub fn validate(&self) -> Result<()> {
        validate_table_name(&self.table)?;
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be positive"));
        }
        if self.timeout.is_zero() {
            return Err(Error::config("timeout must be positive"));
        }
        Ok(())
    }
}
