//! T-SQL table and command helpers
//!
//! Thin wrappers over a [`LoadExecutor`]. Each takes an explicit timeout;
//! `None` leaves the statement unbounded on the client side. Table names are
//! validated and bracket-quoted before they are placed in SQL text.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::connection::LoadExecutor;
use crate::error::{Error, Result};
use crate::security::{escape_string_literal, quote_table_name, validate_sql_identifier};
use crate::types::Value;

async fn with_timeout<F, T>(timeout: Option<Duration>, sql: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            Error::timeout(format!("statement exceeded {:?}: {}", limit, sql))
        })?,
        None => fut.await,
    }
}

fn if_user_table_exists(quoted: &str, statement: &str) -> String {
    format!(
        "IF EXISTS (SELECT * FROM sys.objects WHERE object_id = OBJECT_ID(N'{}') AND type in (N'U')) {} {}",
        escape_string_literal(quoted),
        statement,
        quoted
    )
}

/// SQL for [`truncate_table`]
pub fn truncate_table_sql(table: &str) -> Result<String> {
    Ok(if_user_table_exists(&quote_table_name(table)?, "TRUNCATE TABLE"))
}

/// SQL for [`drop_existing_table`]
pub fn drop_table_sql(table: &str) -> Result<String> {
    Ok(if_user_table_exists(&quote_table_name(table)?, "DROP TABLE"))
}

/// SQL for [`rename_table`]
pub fn rename_table_sql(old_name: &str, new_name: &str) -> Result<String> {
    let old = quote_table_name(old_name)?;
    validate_sql_identifier(new_name)?;
    Ok(format!(
        "EXECUTE sp_rename N'{}', N'{}', 'OBJECT'",
        escape_string_literal(&old),
        escape_string_literal(new_name)
    ))
}

/// Empty a table if it exists
pub async fn truncate_table(
    executor: LoadExecutor<'_>,
    table: &str,
    timeout: Option<Duration>,
) -> Result<u64> {
    let sql = truncate_table_sql(table)?;
    debug!(table, "Truncating table");
    with_timeout(timeout, &sql, executor.execute(&sql, &[])).await
}

/// Drop a table if it exists
pub async fn drop_existing_table(
    executor: LoadExecutor<'_>,
    table: &str,
    timeout: Option<Duration>,
) -> Result<u64> {
    let sql = drop_table_sql(table)?;
    debug!(table, "Dropping table");
    with_timeout(timeout, &sql, executor.execute(&sql, &[])).await
}

/// Rename a table. `new_name` is the bare new object name, as `sp_rename`
/// expects.
pub async fn rename_table(
    executor: LoadExecutor<'_>,
    old_name: &str,
    new_name: &str,
    timeout: Option<Duration>,
) -> Result<u64> {
    let sql = rename_table_sql(old_name, new_name)?;
    debug!(old_name, new_name, "Renaming table");
    with_timeout(timeout, &sql, executor.execute(&sql, &[])).await
}

/// Switch the session's current database
pub async fn use_database(
    executor: LoadExecutor<'_>,
    database: &str,
    timeout: Option<Duration>,
) -> Result<()> {
    validate_sql_identifier(database)?;
    let sql = format!("USE [{}]", database);
    with_timeout(timeout, &sql, executor.execute(&sql, &[])).await?;
    Ok(())
}

/// Execute a statement, returns affected row count
pub async fn execute_non_query(
    executor: LoadExecutor<'_>,
    sql: &str,
    params: &[Value],
    timeout: Option<Duration>,
) -> Result<u64> {
    with_timeout(timeout, sql, executor.execute(sql, params)).await
}

/// First column of the first row. `None` when there is no row or the value
/// is SQL NULL.
pub async fn execute_scalar(
    executor: LoadExecutor<'_>,
    sql: &str,
    params: &[Value],
    timeout: Option<Duration>,
) -> Result<Option<Value>> {
    let row = with_timeout(timeout, sql, executor.query_one(sql, params)).await?;
    Ok(row
        .and_then(|r| r.get(0).cloned())
        .filter(|v| !v.is_null()))
}

/// Whether `sql` yields the integer 1, e.g.
/// `SELECT CASE WHEN EXISTS(SELECT 1 FROM dbo.T WHERE ...) THEN 1 ELSE 0 END`
pub async fn exists(
    executor: LoadExecutor<'_>,
    sql: &str,
    params: &[Value],
    timeout: Option<Duration>,
) -> Result<bool> {
    let value = execute_scalar(executor, sql, params, timeout).await?;
    Ok(matches!(
        value,
        Some(
            Value::UInt8(1)
                | Value::Int8(1)
                | Value::Int16(1)
                | Value::Int32(1)
                | Value::Int64(1)
        )
    ))
}
