//! Tests for rivven-bulk value types

use chrono::{NaiveDate, TimeZone, Utc};
use rivven_bulk::types::{Row, ToValue, Value, ValueKind};
use rust_decimal::Decimal;
use uuid::Uuid;

// ==================== Conversion Tests ====================

#[test]
fn test_primitive_conversions() {
    assert_eq!(Value::from(true), Value::Bool(true));
    assert_eq!(Value::from(7_i8), Value::Int8(7));
    assert_eq!(Value::from(7_u8), Value::UInt8(7));
    assert_eq!(Value::from(7_i16), Value::Int16(7));
    assert_eq!(Value::from(7_i32), Value::Int32(7));
    assert_eq!(Value::from(7_i64), Value::Int64(7));
    assert_eq!(Value::from(1.5_f64), Value::Float64(1.5));
    assert_eq!(Value::from("a"), Value::String("a".into()));
}

#[test]
fn test_option_none_is_null() {
    let missing: Option<i32> = None;
    assert!(Value::from(missing).is_null());
    assert_eq!(Value::from(missing), Value::TypedNull(ValueKind::Int32));
    assert_eq!(Value::from(None::<bool>).sql_type(), "BIT");
    assert_eq!(Value::from(Some(3_i32)), Value::Int32(3));
}

#[test]
fn test_temporal_and_identity_values() {
    let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    assert_eq!(Value::from(date).sql_type(), "DATE");

    let ts = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    assert_eq!(Value::from(ts).sql_type(), "DATETIMEOFFSET");

    let id = Uuid::new_v4();
    assert_eq!(Value::from(id), Value::Uuid(id));
    assert_eq!(Value::from(Decimal::new(1050, 2)).sql_type(), "DECIMAL");
}

#[test]
fn test_to_value_does_not_consume() {
    let name = String::from("ada");
    assert_eq!(name.to_value(), Value::String("ada".into()));
    assert_eq!(name, "ada");
}

// ==================== Accessor Tests ====================

#[test]
fn test_numeric_accessors() {
    assert_eq!(Value::Int16(5).as_i64(), Some(5));
    assert_eq!(Value::Float32(0.5).as_f64(), Some(0.5));
    assert_eq!(Value::Int32(0).as_bool(), Some(false));
    assert_eq!(Value::Bytes(vec![1]).as_i64(), None);
}

#[test]
fn test_borrowing_accessors() {
    assert_eq!(Value::String("x".into()).as_str(), Some("x"));
    assert_eq!(Value::Bytes(vec![1, 2]).as_bytes(), Some(&[1u8, 2][..]));
    assert_eq!(Value::Int32(1).as_str(), None);
}

// ==================== Row Tests ====================

#[test]
fn test_row_lookup() {
    let row = Row::new(
        vec!["id".into(), "name".into()],
        vec![Value::Int32(1), Value::from("ada")],
    );

    assert_eq!(row.len(), 2);
    assert_eq!(row.get(0), Some(&Value::Int32(1)));
    assert_eq!(row.get_by_name("name").and_then(Value::as_str), Some("ada"));
    assert!(row.get_by_name("missing").is_none());

    let map = row.into_map();
    assert_eq!(map.get("id"), Some(&Value::Int32(1)));
}
