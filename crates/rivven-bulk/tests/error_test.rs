//! Unit tests for rivven-bulk error module

use rivven_bulk::error::{Error, ErrorCategory};
use std::error::Error as _;

#[test]
fn test_error_mapping() {
    let err = Error::mapping("User", "every field is excluded");

    assert_eq!(err.category(), ErrorCategory::Mapping);
    assert!(err.is_mapping());
    assert!(err.to_string().contains("User"));
}

#[test]
fn test_error_timeout() {
    let err = Error::timeout("batch 3 exceeded 5s");

    assert_eq!(err.category(), ErrorCategory::Timeout);
    assert!(err.is_timeout());
    assert!(!err.is_store());
}

#[test]
fn test_error_store_wraps_backend_error() {
    let err = Error::store(
        "dbo.Users",
        2,
        5000..10000,
        Error::query_with_sql("Invalid column name", "INSERT BULK"),
    );

    assert_eq!(err.category(), ErrorCategory::Store);
    assert!(err.is_store());
    let msg = err.to_string();
    assert!(msg.contains("dbo.Users"));
    assert!(msg.contains("batch 2"));
    assert!(msg.contains("5000..10000"));
    assert_eq!(err.store_cause().unwrap().category(), ErrorCategory::Query);
    assert!(err.source().is_some());
}

#[test]
fn test_error_cancelled_is_distinct_from_store() {
    let err = Error::cancelled(5000);

    assert_eq!(err.category(), ErrorCategory::Cancelled);
    assert!(err.is_cancelled());
    assert!(!err.is_store());
    assert!(err.store_cause().is_none());
    assert!(err.to_string().contains("5000"));
}

#[test]
fn test_error_connection_with_source() {
    let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
    let err = Error::connection_with_source("Failed to connect", io);

    assert_eq!(err.category(), ErrorCategory::Connection);
    assert!(err.source().is_some());
}

#[test]
fn test_error_constraint() {
    let err = Error::constraint("PK_Users", "duplicate key");

    assert_eq!(err.category(), ErrorCategory::Constraint);
    assert!(err.to_string().contains("PK_Users"));
}

#[test]
fn test_error_unsupported_is_other() {
    assert_eq!(Error::unsupported("nope").category(), ErrorCategory::Other);
}

#[test]
fn test_category_display() {
    assert_eq!(ErrorCategory::Mapping.to_string(), "mapping");
    assert_eq!(ErrorCategory::Store.to_string(), "store");
    assert_eq!(ErrorCategory::TypeConversion.to_string(), "type_conversion");
}
