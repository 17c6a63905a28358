//! Exclusion rules for rivven-bulk
//!
//! A field is left out of the column mapping when any of these hold:
//! - it carries the structural skip tag (`#[bulk(skip)]`)
//! - one of its markers is in [`ExclusionConfig::marker_kinds`]
//! - its name is in [`ExclusionConfig::field_names`]

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::record::{FieldDescriptor, RecordType};

/// Caller-supplied exclusion rules for one load
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExclusionConfig {
    /// Marker kinds whose fields are excluded
    #[serde(default)]
    pub marker_kinds: BTreeSet<String>,
    /// Field names that are excluded (exact, case-sensitive)
    #[serde(default)]
    pub field_names: BTreeSet<String>,
}

impl ExclusionConfig {
    /// Rules that only honour the structural skip tag
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude fields carrying this marker kind
    pub fn with_marker_kind(mut self, kind: impl Into<String>) -> Self {
        self.marker_kinds.insert(kind.into());
        self
    }

    /// Exclude fields carrying any of these marker kinds
    pub fn with_marker_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.marker_kinds.extend(kinds.into_iter().map(Into::into));
        self
    }

    /// Exclude the named field
    pub fn with_field_name(mut self, name: impl Into<String>) -> Self {
        self.field_names.insert(name.into());
        self
    }

    /// Exclude all of the named fields
    pub fn with_field_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field_names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Whether no caller rules are configured
    pub fn is_empty(&self) -> bool {
        self.marker_kinds.is_empty() && self.field_names.is_empty()
    }

    /// Whether this field is left out of the mapping
    pub fn excludes<T>(&self, field: &FieldDescriptor<T>) -> bool {
        field.is_always_excluded()
            || field
                .markers()
                .iter()
                .any(|m| self.marker_kinds.contains(*m))
            || self.field_names.contains(field.name())
    }

    /// Keep the fields that pass, preserving input order
    pub fn filter<T>(&self, fields: &[FieldDescriptor<T>]) -> Vec<FieldDescriptor<T>> {
        fields.iter().filter(|f| !self.excludes(f)).copied().collect()
    }
}

/// Resolve the fields of a record type that survive the exclusion rules.
///
/// Returns a mapping error when nothing survives.
pub fn resolve<T>(
    record: &RecordType<T>,
    config: &ExclusionConfig,
) -> Result<Vec<FieldDescriptor<T>>> {
    let fields = config.filter(record.fields());
    if fields.is_empty() {
        return Err(Error::mapping(
            record.name(),
            "every field is excluded, nothing left to load",
        ));
    }
    Ok(fields)
}
