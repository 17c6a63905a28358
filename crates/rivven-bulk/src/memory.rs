//! In-memory destination store
//!
//! `MemoryStore` implements [`Connection`] over process memory. It keeps
//! every accepted row, every bulk copy handoff and every executed statement,
//! and can be told to fail a given batch or to stall each handoff. Clones
//! share state, so a test can hand one clone to the loader and inspect the
//! other.
//!
//! Transactions buffer their batches until commit. Rollback, or dropping
//! the transaction unfinished, discards them.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::connection::{
    BulkWriteRequest, Connection, ConnectionConfig, ConnectionFactory, Transaction,
};
use crate::error::{Error, Result};
use crate::security::validate_table_name;
use crate::types::{Row, Value};

/// One bulk copy handoff seen by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBatch {
    /// Destination table as requested
    pub table: String,
    /// Column list sent with the batch
    pub columns: Vec<String>,
    /// Rows in the batch
    pub rows: usize,
    /// Batch size forwarded by the writer
    pub batch_size: usize,
    /// Whether a table lock was requested
    pub table_lock: bool,
    /// Whether the batch ran inside a transaction
    pub transactional: bool,
}

#[derive(Debug, Default)]
struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

#[derive(Default)]
struct StoreState {
    tables: HashMap<String, MemoryTable>,
    batches: Vec<RecordedBatch>,
    statements: Vec<String>,
    query_results: HashMap<String, Vec<Row>>,
    handoffs: u64,
    fail_on_batch: Option<u64>,
    write_delay: Option<Duration>,
}

/// Shared in-memory store
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

fn table_key(table: &str) -> String {
    let name = match validate_table_name(table) {
        Ok(parts) => parts.join("."),
        Err(_) => table.to_string(),
    };
    name.to_lowercase()
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the n-th bulk copy handoff (1-based, counted across the store)
    pub fn fail_on_batch(&self, batch: u64) {
        self.state.lock().fail_on_batch = Some(batch);
    }

    /// Stall every bulk copy handoff for the given duration
    pub fn set_write_delay(&self, delay: Duration) {
        self.state.lock().write_delay = Some(delay);
    }

    /// Answer `sql` with these rows from `query`
    pub fn set_query_result(&self, sql: impl Into<String>, rows: Vec<Row>) {
        self.state.lock().query_results.insert(sql.into(), rows);
    }

    /// Rows stored in a table, in insertion order
    pub fn rows(&self, table: &str) -> Vec<Row> {
        let state = self.state.lock();
        match state.tables.get(&table_key(table)) {
            Some(t) => t
                .rows
                .iter()
                .map(|values| Row::new(t.columns.clone(), values.clone()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Number of rows stored in a table
    pub fn row_count(&self, table: &str) -> usize {
        self.state
            .lock()
            .tables
            .get(&table_key(table))
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    /// Every bulk copy handoff, including ones later rolled back
    pub fn batches(&self) -> Vec<RecordedBatch> {
        self.state.lock().batches.clone()
    }

    /// Every statement passed to `execute` or `query`
    pub fn statements(&self) -> Vec<String> {
        self.state.lock().statements.clone()
    }

    /// Register one handoff and decide whether it fails
    fn admit(
        &self,
        request: &BulkWriteRequest<'_>,
        rows: usize,
        transactional: bool,
    ) -> Result<Option<Duration>> {
        let mut state = self.state.lock();
        state.handoffs += 1;
        state.batches.push(RecordedBatch {
            table: request.table.to_string(),
            columns: request.columns.to_vec(),
            rows,
            batch_size: request.batch_size,
            table_lock: request.table_lock,
            transactional,
        });

        if state.fail_on_batch == Some(state.handoffs) {
            return Err(Error::constraint(
                format!("PK_{}", table_key(request.table).replace('.', "_")),
                format!("duplicate key in handoff {}", state.handoffs),
            ));
        }
        Ok(state.write_delay)
    }

    fn apply(&self, table: &str, columns: &[String], rows: Vec<Vec<Value>>) -> Result<u64> {
        let mut state = self.state.lock();
        let entry = state.tables.entry(table_key(table)).or_default();
        if entry.columns.is_empty() {
            entry.columns = columns.to_vec();
        } else if entry.columns != columns {
            return Err(Error::query(format!(
                "column list {:?} does not match table {} {:?}",
                columns, table, entry.columns
            )));
        }
        let count = rows.len() as u64;
        entry.rows.extend(rows);
        Ok(count)
    }

    fn record_statement(&self, sql: &str) -> Vec<Row> {
        let mut state = self.state.lock();
        state.statements.push(sql.to_string());
        state.query_results.get(sql).cloned().unwrap_or_default()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryStore")
            .field("tables", &state.tables.len())
            .field("batches", &state.batches.len())
            .field("statements", &state.statements.len())
            .finish()
    }
}

#[async_trait]
impl Connection for MemoryStore {
    async fn query(&self, sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
        Ok(self.record_statement(sql))
    }

    async fn execute(&self, sql: &str, _params: &[Value]) -> Result<u64> {
        self.record_statement(sql);
        Ok(0)
    }

    async fn bulk_write(
        &self,
        request: &BulkWriteRequest<'_>,
        rows: Vec<Vec<Value>>,
    ) -> Result<u64> {
        if let Some(delay) = self.admit(request, rows.len(), false)? {
            tokio::time::sleep(delay).await;
        }
        self.apply(request.table, request.columns, rows)
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            pending: Mutex::new(Vec::new()),
            finished: AtomicBool::new(false),
        }))
    }

    async fn is_valid(&self) -> bool {
        true
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ConnectionFactory for MemoryStore {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
        Ok(Box::new(self.clone()))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

struct PendingBatch {
    table: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// Transaction over a [`MemoryStore`]
pub struct MemoryTransaction {
    store: MemoryStore,
    pending: Mutex<Vec<PendingBatch>>,
    finished: AtomicBool,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn query(&self, sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
        Ok(self.store.record_statement(sql))
    }

    async fn execute(&self, sql: &str, _params: &[Value]) -> Result<u64> {
        self.store.record_statement(sql);
        Ok(0)
    }

    async fn bulk_write(
        &self,
        request: &BulkWriteRequest<'_>,
        rows: Vec<Vec<Value>>,
    ) -> Result<u64> {
        if let Some(delay) = self.store.admit(request, rows.len(), true)? {
            tokio::time::sleep(delay).await;
        }
        let count = rows.len() as u64;
        self.pending.lock().push(PendingBatch {
            table: request.table.to_string(),
            columns: request.columns.to_vec(),
            rows,
        });
        Ok(count)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if self.finished.swap(true, Ordering::SeqCst) {
            return Err(Error::transaction("Transaction already finished"));
        }
        let pending = std::mem::take(&mut *self.pending.lock());
        for batch in pending {
            self.store.apply(&batch.table, &batch.columns, batch.rows)?;
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.finished.store(true, Ordering::SeqCst);
        self.pending.lock().clear();
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.finished.load(Ordering::SeqCst) {
            let discarded = self.pending.get_mut().len();
            debug!(batches = discarded, "MemoryTransaction dropped without commit");
        }
    }
}
