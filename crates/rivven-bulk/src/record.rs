//! Record descriptors for rivven-bulk
//!
//! A record shape is described once by a static table of field descriptors,
//! normally generated by `#[derive(BulkRecord)]`:
//!
//! ```rust,ignore
//! #[derive(BulkRecord)]
//! struct User {
//!     id: i64,
//!     name: String,
//!     #[bulk(marker = "audit")]
//!     modified_by: String,
//!     #[bulk(skip)]
//!     display_name: String,
//! }
//! ```
//!
//! [`RecordType::of`] builds the ordered descriptor list the first time a
//! shape is used and hands out the cached copy afterwards.

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::trace;

use crate::error::{Error, Result};
use crate::types::Value;

/// Reads one field of a record as a SQL value
pub type FieldAccessor<T> = fn(&T) -> Value;

/// A record type that can be bulk loaded
pub trait BulkRecord: Sized + Send + 'static {
    /// Name of the record shape, used in diagnostics and errors
    fn record_name() -> &'static str;

    /// Field descriptors in declaration order
    fn field_descriptors() -> Vec<FieldDescriptor<Self>>;
}

/// Describes one readable field of a record
pub struct FieldDescriptor<T> {
    name: &'static str,
    accessor: FieldAccessor<T>,
    always_excluded: bool,
    markers: &'static [&'static str],
}

impl<T> FieldDescriptor<T> {
    /// Create a descriptor with no exclusion markers
    pub const fn new(name: &'static str, accessor: FieldAccessor<T>) -> Self {
        Self {
            name,
            accessor,
            always_excluded: false,
            markers: &[],
        }
    }

    /// Never bulk load this field
    pub fn always_excluded(mut self) -> Self {
        self.always_excluded = true;
        self
    }

    /// Attach marker kinds a caller may exclude at load time
    pub fn with_markers(mut self, markers: &'static [&'static str]) -> Self {
        self.markers = markers;
        self
    }

    /// Field name
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Field accessor
    #[inline]
    pub fn accessor(&self) -> FieldAccessor<T> {
        self.accessor
    }

    /// Read this field from a record
    #[inline]
    pub fn value(&self, record: &T) -> Value {
        (self.accessor)(record)
    }

    /// Whether the field carries the structural skip tag
    #[inline]
    pub fn is_always_excluded(&self) -> bool {
        self.always_excluded
    }

    /// Marker kinds attached to this field
    #[inline]
    pub fn markers(&self) -> &'static [&'static str] {
        self.markers
    }

    /// Whether the field carries the given marker kind
    pub fn has_marker(&self, kind: &str) -> bool {
        self.markers.iter().any(|m| *m == kind)
    }
}

impl<T> Clone for FieldDescriptor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FieldDescriptor<T> {}

impl<T> fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("always_excluded", &self.always_excluded)
            .field("markers", &self.markers)
            .finish()
    }
}

/// Ordered, immutable field list of one record shape
pub struct RecordType<T> {
    name: &'static str,
    fields: Vec<FieldDescriptor<T>>,
}

type TypeRegistry = RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

fn registry() -> &'static TypeRegistry {
    static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

impl<T: BulkRecord> RecordType<T> {
    /// Get the descriptor list for `T`, building it on first use
    pub fn of() -> Result<Arc<Self>> {
        let type_id = TypeId::of::<T>();

        if let Some(cached) = registry().read().get(&type_id).cloned() {
            if let Ok(record) = cached.downcast::<Self>() {
                trace!(record = T::record_name(), "record type cache hit");
                return Ok(record);
            }
        }

        let built = Arc::new(Self::build()?);
        let mut types = registry().write();
        let entry = types
            .entry(type_id)
            .or_insert_with(|| built.clone() as Arc<dyn Any + Send + Sync>);
        Ok(entry.clone().downcast::<Self>().unwrap_or(built))
    }

    /// Build the descriptor list for `T` without consulting the cache
    pub fn build() -> Result<Self> {
        Self::from_descriptors(T::record_name(), T::field_descriptors())
    }
}

impl<T> RecordType<T> {
    /// Build a record type from an explicit descriptor table.
    ///
    /// Fails if the table is empty or names a field twice.
    pub fn from_descriptors(name: &'static str, fields: Vec<FieldDescriptor<T>>) -> Result<Self> {
        if fields.is_empty() {
            return Err(Error::mapping(name, "record exposes no readable fields"));
        }

        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name) {
                return Err(Error::config(format!(
                    "record {} declares field '{}' more than once",
                    name, field.name
                )));
            }
        }

        Ok(Self { name, fields })
    }

    /// Record shape name
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Field descriptors in declaration order
    #[inline]
    pub fn fields(&self) -> &[FieldDescriptor<T>] {
        &self.fields
    }

    /// Number of fields
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always false for a built record type
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor<T>> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl<T> fmt::Debug for RecordType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordType")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Builder for registering a record shape by hand
pub struct RecordTypeBuilder<T> {
    name: &'static str,
    fields: Vec<FieldDescriptor<T>>,
}

impl<T> RecordTypeBuilder<T> {
    /// Start a descriptor table for the named shape
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
        }
    }

    /// Add a plain field
    pub fn field(mut self, name: &'static str, accessor: FieldAccessor<T>) -> Self {
        self.fields.push(FieldDescriptor::new(name, accessor));
        self
    }

    /// Add a field carrying marker kinds
    pub fn marked_field(
        mut self,
        name: &'static str,
        accessor: FieldAccessor<T>,
        markers: &'static [&'static str],
    ) -> Self {
        self.fields
            .push(FieldDescriptor::new(name, accessor).with_markers(markers));
        self
    }

    /// Add a field that is never bulk loaded
    pub fn skipped_field(mut self, name: &'static str, accessor: FieldAccessor<T>) -> Self {
        self.fields
            .push(FieldDescriptor::new(name, accessor).always_excluded());
        self
    }

    /// Add a prepared descriptor
    pub fn descriptor(mut self, descriptor: FieldDescriptor<T>) -> Self {
        self.fields.push(descriptor);
        self
    }

    /// Finish the descriptor list
    pub fn descriptors(self) -> Vec<FieldDescriptor<T>> {
        self.fields
    }

    /// Build the record type
    pub fn build(self) -> Result<RecordType<T>> {
        RecordType::from_descriptors(self.name, self.fields)
    }
}
