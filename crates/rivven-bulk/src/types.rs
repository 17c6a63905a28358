//! Value types for rivven-bulk
//!
//! The value set covers what a bulk copy stream can carry:
//! - Primitive types (bool, integers, floats, decimal)
//! - Date/time types with timezone support
//! - Text, binary, UUID and JSON

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Column type of a [`Value`], kept on typed NULLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// BIT
    Bool,
    /// TINYINT
    UInt8,
    /// Signed byte, widened to SMALLINT
    Int8,
    /// SMALLINT
    Int16,
    /// INT
    Int32,
    /// BIGINT
    Int64,
    /// REAL
    Float32,
    /// FLOAT
    Float64,
    /// DECIMAL
    Decimal,
    /// NVARCHAR
    String,
    /// VARBINARY
    Bytes,
    /// DATE
    Date,
    /// TIME
    Time,
    /// DATETIME2
    DateTime,
    /// DATETIMEOFFSET
    DateTimeTz,
    /// UNIQUEIDENTIFIER
    Uuid,
    /// JSON stored as NVARCHAR
    Json,
}

impl ValueKind {
    /// Get SQL type name
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Bool => "BIT",
            Self::UInt8 => "TINYINT",
            Self::Int8 | Self::Int16 => "SMALLINT",
            Self::Int32 => "INT",
            Self::Int64 => "BIGINT",
            Self::Float32 => "REAL",
            Self::Float64 => "FLOAT",
            Self::Decimal => "DECIMAL",
            Self::String | Self::Json => "NVARCHAR",
            Self::Bytes => "VARBINARY",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::DateTime => "DATETIME2",
            Self::DateTimeTz => "DATETIMEOFFSET",
            Self::Uuid => "UNIQUEIDENTIFIER",
        }
    }
}

/// SQL value produced by a field accessor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL of unknown column type
    Null,
    /// SQL NULL of a known column type, produced by `None` fields
    TypedNull(ValueKind),
    /// Boolean value (BIT)
    Bool(bool),
    /// Unsigned byte (TINYINT)
    UInt8(u8),
    /// 8-bit signed integer, widened to SMALLINT
    Int8(i8),
    /// 16-bit signed integer (SMALLINT)
    Int16(i16),
    /// 32-bit signed integer (INT)
    Int32(i32),
    /// 64-bit signed integer (BIGINT)
    Int64(i64),
    /// 32-bit floating point (REAL)
    Float32(f32),
    /// 64-bit floating point (FLOAT)
    Float64(f64),
    /// Arbitrary precision decimal (DECIMAL, NUMERIC)
    Decimal(Decimal),
    /// Text string (NVARCHAR, VARCHAR)
    String(String),
    /// Binary data (VARBINARY)
    Bytes(Vec<u8>),
    /// Date without time (DATE)
    Date(NaiveDate),
    /// Time without date (TIME)
    Time(NaiveTime),
    /// Timestamp without timezone (DATETIME2)
    DateTime(NaiveDateTime),
    /// Timestamp with timezone (DATETIMEOFFSET)
    DateTimeTz(DateTime<Utc>),
    /// UUID (UNIQUEIDENTIFIER)
    Uuid(Uuid),
    /// JSON document, stored as text
    Json(serde_json::Value),
}

impl Value {
    /// Check if value is NULL
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::TypedNull(_))
    }

    /// Column type of this value, `None` only for an untyped NULL
    pub const fn kind(&self) -> Option<ValueKind> {
        let kind = match self {
            Self::Null => return None,
            Self::TypedNull(kind) => *kind,
            Self::Bool(_) => ValueKind::Bool,
            Self::UInt8(_) => ValueKind::UInt8,
            Self::Int8(_) => ValueKind::Int8,
            Self::Int16(_) => ValueKind::Int16,
            Self::Int32(_) => ValueKind::Int32,
            Self::Int64(_) => ValueKind::Int64,
            Self::Float32(_) => ValueKind::Float32,
            Self::Float64(_) => ValueKind::Float64,
            Self::Decimal(_) => ValueKind::Decimal,
            Self::String(_) => ValueKind::String,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Date(_) => ValueKind::Date,
            Self::Time(_) => ValueKind::Time,
            Self::DateTime(_) => ValueKind::DateTime,
            Self::DateTimeTz(_) => ValueKind::DateTimeTz,
            Self::Uuid(_) => ValueKind::Uuid,
            Self::Json(_) => ValueKind::Json,
        };
        Some(kind)
    }

    /// Get SQL type name
    pub fn sql_type(&self) -> &'static str {
        self.kind().map_or("NULL", ValueKind::sql_type)
    }

    /// Try to convert to bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::UInt8(n) => Some(*n != 0),
            Self::Int8(n) => Some(*n != 0),
            Self::Int16(n) => Some(*n != 0),
            Self::Int32(n) => Some(*n != 0),
            Self::Int64(n) => Some(*n != 0),
            _ => None,
        }
    }

    /// Try to convert to i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::UInt8(n) => Some(i64::from(*n)),
            Self::Int8(n) => Some(i64::from(*n)),
            Self::Int16(n) => Some(i64::from(*n)),
            Self::Int32(n) => Some(i64::from(*n)),
            Self::Int64(n) => Some(*n),
            Self::Decimal(d) => d.to_string().parse().ok(),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to convert to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::UInt8(n) => Some(f64::from(*n)),
            Self::Int8(n) => Some(f64::from(*n)),
            Self::Int16(n) => Some(f64::from(*n)),
            Self::Int32(n) => Some(f64::from(*n)),
            Self::Int64(n) => Some(*n as f64),
            Self::Float32(n) => Some(f64::from(*n)),
            Self::Float64(n) => Some(*n),
            Self::Decimal(d) => d.to_string().parse().ok(),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to borrow as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Try to borrow as bytes
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }
}

/// Conversion used by generated field accessors.
///
/// Blanket-implemented for anything that is `Clone + Into<Value>`, so record
/// fields only need a `From` impl on [`Value`].
pub trait ToValue {
    /// Produce the SQL value for this field
    fn to_value(&self) -> Value;
}

impl<T> ToValue for T
where
    T: Clone + Into<Value>,
{
    #[inline]
    fn to_value(&self) -> Value {
        self.clone().into()
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Self::Int8(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::Int16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Self::UInt8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Self::Int32(i32::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int64(i64::from(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Self::Time(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTimeTz(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

/// Field types with a fixed column type, so `None` becomes a typed NULL
pub trait SqlTyped {
    /// Column type of every value of this type
    const KIND: ValueKind;
}

macro_rules! sql_typed {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl SqlTyped for $ty {
                const KIND: ValueKind = ValueKind::$kind;
            }
        )*
    };
}

sql_typed! {
    bool => Bool,
    u8 => UInt8,
    i8 => Int8,
    i16 => Int16,
    u16 => Int32,
    i32 => Int32,
    u32 => Int64,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    Decimal => Decimal,
    String => String,
    &str => String,
    Vec<u8> => Bytes,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    DateTime<Utc> => DateTimeTz,
    Uuid => Uuid,
    serde_json::Value => Json,
}

impl<T: Into<Value> + SqlTyped> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Self::TypedNull(T::KIND),
        }
    }
}

/// Database row as ordered column values
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Create a new row
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Get column count
    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if row is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Get column names
    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Get all values
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Get value by column index
    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Get value by column name (case-insensitive, as SQL Server collations are by default)
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|idx| self.values.get(idx))
    }

    /// Convert row to HashMap
    pub fn into_map(self) -> HashMap<String, Value> {
        self.columns.into_iter().zip(self.values).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from_impl() {
        let v: Value = 42_i32.into();
        assert!(matches!(v, Value::Int32(42)));

        let v: Value = "hello".into();
        assert!(matches!(v, Value::String(s) if s == "hello"));

        let v: Value = None::<i32>.into();
        assert!(v.is_null());
    }

    #[test]
    fn test_to_value_clones_field() {
        let name = String::from("Alice");
        assert_eq!(name.to_value(), Value::String("Alice".into()));
        assert_eq!(name, "Alice");

        let missing: Option<i64> = None;
        assert_eq!(missing.to_value(), Value::TypedNull(ValueKind::Int64));
    }

    #[test]
    fn test_none_keeps_column_type() {
        let v = Value::from(None::<String>);
        assert!(v.is_null());
        assert_eq!(v.kind(), Some(ValueKind::String));
        assert_eq!(v.sql_type(), "NVARCHAR");

        assert_eq!(Value::from(None::<Decimal>).sql_type(), "DECIMAL");
        assert_eq!(Value::Null.kind(), None);
        assert_eq!(Value::Null.sql_type(), "NULL");
    }

    #[test]
    fn test_unsigned_widening() {
        assert_eq!(Value::from(255_u8), Value::UInt8(255));
        assert_eq!(Value::UInt8(255).sql_type(), "TINYINT");
        assert_eq!(Value::UInt8(255).as_i64(), Some(255));
        assert_eq!(Value::Int8(-1).sql_type(), "SMALLINT");
        assert_eq!(Value::from(u32::MAX), Value::Int64(i64::from(u32::MAX)));
    }

    #[test]
    fn test_row_operations() {
        let row = Row::new(
            vec!["id".into(), "name".into()],
            vec![Value::Int32(1), Value::String("Alice".into())],
        );

        assert_eq!(row.len(), 2);
        assert_eq!(row.get(0), Some(&Value::Int32(1)));
        assert_eq!(
            row.get_by_name("NAME"),
            Some(&Value::String("Alice".into()))
        );
    }
}
