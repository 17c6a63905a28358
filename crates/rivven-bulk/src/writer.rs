//! Batch streaming writer
//!
//! Pulls records from a [`RecordSource`], turns each into a row tuple in
//! column-mapping order and hands the store at most `batch_size` rows at a
//! time. Only one batch is ever buffered.
//!
//! Each handoff runs under the target's timeout. When a cancellation token
//! is attached, cancelling it aborts the in-flight handoff and the load
//! fails with [`Error::Cancelled`]. Store failures carry the batch index and
//! row range and are never retried.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::LoadTarget;
use crate::connection::{BulkWriteRequest, LoadExecutor};
use crate::error::{Error, Result};
use crate::mapping::ColumnMapping;
use crate::source::RecordSource;
use crate::types::Value;

/// Upper bound on the initial batch buffer allocation
const INITIAL_BATCH_CAPACITY: usize = 1024;

/// Outcome of a completed load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadSummary {
    /// Rows acknowledged by the store
    pub rows_written: u64,
    /// Batches handed to the store
    pub batches_written: u64,
    /// Wall time of the load
    pub elapsed: Duration,
}

/// Load statistics snapshot
#[derive(Debug, Clone, Default)]
pub struct LoadStats {
    /// Total rows written
    pub rows_written: u64,
    /// Total batches written
    pub batches_written: u64,
    /// Batches that failed or timed out
    pub batches_failed: u64,
    /// Loads ended by cancellation
    pub loads_cancelled: u64,
    /// Loads that completed
    pub loads_completed: u64,
    /// Time spent in batch handoffs (milliseconds)
    pub total_write_time_ms: u64,
    /// Average rows per second of handoff time
    pub rows_per_second: f64,
}

/// Atomic load statistics
#[derive(Debug, Default)]
#[allow(missing_docs)]
pub struct AtomicLoadStats {
    pub rows_written: AtomicU64,
    pub batches_written: AtomicU64,
    pub batches_failed: AtomicU64,
    pub loads_cancelled: AtomicU64,
    pub loads_completed: AtomicU64,
    pub total_write_time_ms: AtomicU64,
}

impl AtomicLoadStats {
    /// Record a successful batch
    pub fn record_batch(&self, rows: u64, duration: Duration) {
        self.rows_written.fetch_add(rows, Ordering::Relaxed);
        self.batches_written.fetch_add(1, Ordering::Relaxed);
        self.total_write_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Record a failed or timed out batch
    pub fn record_batch_failure(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cancelled load
    pub fn record_cancellation(&self) {
        self.loads_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed load
    pub fn record_completion(&self) {
        self.loads_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot
    pub fn snapshot(&self) -> LoadStats {
        let rows = self.rows_written.load(Ordering::Relaxed);
        let time_ms = self.total_write_time_ms.load(Ordering::Relaxed);
        let rps = if time_ms > 0 {
            (rows as f64 * 1000.0) / time_ms as f64
        } else {
            0.0
        };

        LoadStats {
            rows_written: rows,
            batches_written: self.batches_written.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            loads_cancelled: self.loads_cancelled.load(Ordering::Relaxed),
            loads_completed: self.loads_completed.load(Ordering::Relaxed),
            total_write_time_ms: time_ms,
            rows_per_second: rps,
        }
    }
}

/// Drives one load against a borrowed executor
pub struct BatchWriter<'a, T> {
    executor: LoadExecutor<'a>,
    mapping: Arc<ColumnMapping<T>>,
    target: LoadTarget,
    cancel: Option<CancellationToken>,
    stats: Arc<AtomicLoadStats>,
}

impl<'a, T: Send> BatchWriter<'a, T> {
    /// Writer for one table through the given executor
    pub fn new(
        executor: LoadExecutor<'a>,
        mapping: Arc<ColumnMapping<T>>,
        target: LoadTarget,
    ) -> Self {
        Self {
            executor,
            mapping,
            target,
            cancel: None,
            stats: Arc::new(AtomicLoadStats::default()),
        }
    }

    /// Abort the load when this token is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Report into shared statistics
    pub fn with_stats(mut self, stats: Arc<AtomicLoadStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Statistics this writer reports into
    pub fn stats(&self) -> LoadStats {
        self.stats.snapshot()
    }

    /// Run the load. The source is closed on every exit path.
    pub async fn write<S>(&self, source: &mut S) -> Result<LoadSummary>
    where
        S: RecordSource<T> + ?Sized,
    {
        let result = self.drive(source).await;

        match source.close().await {
            Ok(()) => result,
            Err(close_err) => match result {
                Ok(_) => Err(close_err),
                Err(e) => {
                    warn!(table = %self.target.table, error = %close_err, "Closing record source failed");
                    Err(e)
                }
            },
        }
    }

    async fn drive<S>(&self, source: &mut S) -> Result<LoadSummary>
    where
        S: RecordSource<T> + ?Sized,
    {
        self.target.validate()?;
        if self.mapping.is_empty() {
            return Err(Error::mapping(
                self.mapping.record_name(),
                "no columns to write",
            ));
        }

        let started = Instant::now();
        let table = self.target.table.as_str();
        let batch_size = self.target.batch_size;
        let columns = self.mapping.column_names();
        let request = BulkWriteRequest {
            table,
            columns: &columns,
            batch_size,
            timeout: self.target.timeout,
            table_lock: self.target.table_lock,
        };

        info!(
            table,
            record = self.mapping.record_name(),
            columns = columns.len(),
            batch_size,
            timeout_secs = self.target.timeout.as_secs(),
            table_lock = self.target.table_lock,
            transactional = self.executor.is_transactional(),
            "Starting bulk load"
        );

        let mut rows_written = 0u64;
        let mut batches = 0u64;
        let mut exhausted = false;

        while !exhausted {
            self.check_cancelled(rows_written)?;

            let mut batch: Vec<Vec<Value>> =
                Vec::with_capacity(batch_size.min(INITIAL_BATCH_CAPACITY));
            while batch.len() < batch_size {
                match source.next_record().await? {
                    Some(record) => batch.push(self.mapping.row_tuple(&record)),
                    None => {
                        exhausted = true;
                        break;
                    }
                }
            }

            if batch.is_empty() {
                break;
            }

            batches += 1;
            rows_written += self
                .write_batch(&request, batches, rows_written, batch)
                .await?;
        }

        let elapsed = started.elapsed();
        self.stats.record_completion();
        info!(
            table,
            rows = rows_written,
            batches,
            elapsed_ms = elapsed.as_millis() as u64,
            "Bulk load completed"
        );

        Ok(LoadSummary {
            rows_written,
            batches_written: batches,
            elapsed,
        })
    }

    async fn write_batch(
        &self,
        request: &BulkWriteRequest<'_>,
        batch: u64,
        first_row: u64,
        rows: Vec<Vec<Value>>,
    ) -> Result<u64> {
        let rows_range = first_row..first_row + rows.len() as u64;
        let started = Instant::now();
        let handoff = tokio::time::timeout(request.timeout, self.executor.bulk_write(request, rows));

        let outcome = match &self.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return Err(self.cancelled(first_row, Some(batch)));
                    }
                    outcome = handoff => outcome,
                }
            }
            None => handoff.await,
        };

        match outcome {
            Ok(Ok(written)) => {
                let elapsed = started.elapsed();
                self.stats.record_batch(written, elapsed);
                debug!(
                    table = request.table,
                    batch,
                    rows = written,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Batch written"
                );
                Ok(written)
            }
            Ok(Err(e)) => {
                self.stats.record_batch_failure();
                error!(
                    table = request.table,
                    batch,
                    rows = %format!("{}..{}", rows_range.start, rows_range.end),
                    error = %e,
                    "Batch write failed"
                );
                Err(Error::store(request.table, batch, rows_range, e))
            }
            Err(_) => {
                self.stats.record_batch_failure();
                error!(
                    table = request.table,
                    batch,
                    timeout_secs = request.timeout.as_secs(),
                    "Batch write timed out"
                );
                Err(Error::timeout(format!(
                    "batch {} of {} (rows {}..{}) exceeded {:?}",
                    batch, request.table, rows_range.start, rows_range.end, request.timeout
                )))
            }
        }
    }

    fn check_cancelled(&self, rows_written: u64) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(self.cancelled(rows_written, None)),
            _ => Ok(()),
        }
    }

    fn cancelled(&self, rows_written: u64, in_flight: Option<u64>) -> Error {
        self.stats.record_cancellation();
        warn!(
            table = %self.target.table,
            rows = rows_written,
            in_flight_batch = ?in_flight,
            "Bulk load cancelled"
        );
        Error::cancelled(rows_written)
    }
}
