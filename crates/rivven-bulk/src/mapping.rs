//! Column mapping for rivven-bulk
//!
//! Turns the surviving field descriptors into an ordered field → column list.
//! Column names come from a [`ColumnNamingStrategy`]; the default
//! [`IdentityNaming`] keeps the field name unchanged.
//!
//! Mappings are cached per (record type, exclusion rules, naming strategy).

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::trace;

use crate::error::{Error, Result};
use crate::exclusion::{self, ExclusionConfig};
use crate::record::{BulkRecord, FieldAccessor, FieldDescriptor, RecordType};
use crate::types::Value;

/// Strategy for deriving a column name from a field name.
///
/// Cached mappings are keyed on the strategy's type, so every value of one
/// strategy type must produce the same column names.
pub trait ColumnNamingStrategy: Send + Sync {
    /// Name of the strategy, used in logs
    fn name(&self) -> &'static str;

    /// Column name for the given field
    fn column_name(&self, field: &str) -> String;
}

/// Default identity naming (column name equals field name)
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityNaming;

impl ColumnNamingStrategy for IdentityNaming {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn column_name(&self, field: &str) -> String {
        field.to_string()
    }
}

/// One mapped field
pub struct MappedColumn<T> {
    field: &'static str,
    column: String,
    accessor: FieldAccessor<T>,
}

impl<T> MappedColumn<T> {
    /// Source field name
    #[inline]
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Destination column name
    #[inline]
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Read the mapped value from a record
    #[inline]
    pub fn value(&self, record: &T) -> Value {
        (self.accessor)(record)
    }
}

impl<T> fmt::Debug for MappedColumn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedColumn")
            .field("field", &self.field)
            .field("column", &self.column)
            .finish()
    }
}

/// Ordered field → column mapping for one record type. Never empty.
pub struct ColumnMapping<T> {
    record: &'static str,
    columns: Vec<MappedColumn<T>>,
}

impl<T> ColumnMapping<T> {
    /// Record shape this mapping was built for
    #[inline]
    pub fn record_name(&self) -> &'static str {
        self.record
    }

    /// Mapped columns in order
    #[inline]
    pub fn columns(&self) -> &[MappedColumn<T>] {
        &self.columns
    }

    /// Number of mapped columns
    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always false for a built mapping
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Destination column names in order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.column.clone()).collect()
    }

    /// Source field names in order
    pub fn field_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.field).collect()
    }

    /// (field, column) pairs in order
    pub fn pairs(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.columns.iter().map(|c| (c.field, c.column.as_str()))
    }

    /// Whether the given field is mapped
    pub fn contains_field(&self, field: &str) -> bool {
        self.columns.iter().any(|c| c.field == field)
    }

    /// Build the row tuple for one record, in column order
    pub fn row_tuple(&self, record: &T) -> Vec<Value> {
        self.columns.iter().map(|c| c.value(record)).collect()
    }
}

impl<T> fmt::Debug for ColumnMapping<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnMapping")
            .field("record", &self.record)
            .field("columns", &self.columns)
            .finish()
    }
}

/// Maps resolved field descriptors to columns
#[derive(Clone)]
pub struct ColumnMapper {
    naming: Arc<dyn ColumnNamingStrategy>,
    naming_type: TypeId,
}

impl ColumnMapper {
    /// Mapper using the given naming strategy
    pub fn new<S: ColumnNamingStrategy + 'static>(naming: S) -> Self {
        Self {
            naming: Arc::new(naming),
            naming_type: TypeId::of::<S>(),
        }
    }

    /// Mapper using identity naming
    pub fn identity() -> Self {
        Self::new(IdentityNaming)
    }

    /// Naming strategy in use
    pub fn naming(&self) -> &dyn ColumnNamingStrategy {
        self.naming.as_ref()
    }

    /// Map resolved fields to columns. Fails on an empty field list.
    pub fn map<T>(
        &self,
        record: &'static str,
        fields: &[FieldDescriptor<T>],
    ) -> Result<ColumnMapping<T>> {
        if fields.is_empty() {
            return Err(Error::mapping(record, "no fields to map"));
        }

        let columns = fields
            .iter()
            .map(|f| MappedColumn {
                field: f.name(),
                column: self.naming.column_name(f.name()),
                accessor: f.accessor(),
            })
            .collect();

        Ok(ColumnMapping { record, columns })
    }

    /// Build the mapping for a record type under the given exclusion rules
    pub fn build<T>(
        &self,
        record: &RecordType<T>,
        exclusions: &ExclusionConfig,
    ) -> Result<ColumnMapping<T>> {
        let fields = exclusion::resolve(record, exclusions)?;
        self.map(record.name(), &fields)
    }
}

impl Default for ColumnMapper {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Debug for ColumnMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnMapper")
            .field("naming", &self.naming.name())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MappingKey {
    record: TypeId,
    exclusions: ExclusionConfig,
    naming: TypeId,
}

/// In-process cache of column mappings
#[derive(Default)]
pub struct MappingCache {
    entries: RwLock<HashMap<MappingKey, Arc<dyn Any + Send + Sync>>>,
}

impl MappingCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache shared by loaders that don't bring their own
    pub fn global() -> Arc<MappingCache> {
        static GLOBAL: OnceLock<Arc<MappingCache>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(MappingCache::new())).clone()
    }

    /// Get the mapping for `T`, building and caching it on a miss
    pub fn get_or_build<T: BulkRecord>(
        &self,
        mapper: &ColumnMapper,
        exclusions: &ExclusionConfig,
    ) -> Result<Arc<ColumnMapping<T>>> {
        let key = MappingKey {
            record: TypeId::of::<T>(),
            exclusions: exclusions.clone(),
            naming: mapper.naming_type,
        };

        if let Some(cached) = self.entries.read().get(&key).cloned() {
            if let Ok(mapping) = cached.downcast::<ColumnMapping<T>>() {
                trace!(record = T::record_name(), "column mapping cache hit");
                return Ok(mapping);
            }
        }

        let record = RecordType::<T>::of()?;
        let built = Arc::new(mapper.build(&record, exclusions)?);

        let mut entries = self.entries.write();
        let entry = entries
            .entry(key)
            .or_insert_with(|| built.clone() as Arc<dyn Any + Send + Sync>);
        Ok(entry.clone().downcast::<ColumnMapping<T>>().unwrap_or(built))
    }

    /// Number of cached mappings
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every cached mapping
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl fmt::Debug for MappingCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingCache")
            .field("entries", &self.len())
            .finish()
    }
}
