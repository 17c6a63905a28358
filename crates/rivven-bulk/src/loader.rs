//! Bulk load entry points
//!
//! [`BulkLoader`] ties the pieces together for one destination:
//! options → load target, record type → cached column mapping, then a
//! [`BatchWriter`] run against the caller's executor.
//!
//! ```rust,ignore
//! use rivven_bulk::prelude::*;
//!
//! #[derive(BulkRecord)]
//! struct User {
//!     id: i64,
//!     name: String,
//!     #[bulk(marker = "audit")]
//!     modified_by: String,
//! }
//!
//! let loader = BulkLoader::new(LoadOptions::new().with_exclude_marker_kind("audit"));
//! let summary = loader.load(LoadExecutor::connection(&conn), "dbo.Users", users).await?;
//! ```

use futures::Stream;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::LoadOptions;
use crate::connection::LoadExecutor;
use crate::error::{Error, Result};
use crate::mapping::{ColumnMapper, ColumnMapping, ColumnNamingStrategy, MappingCache};
use crate::record::BulkRecord;
use crate::source::{IterSource, RecordSource, StreamSource};
use crate::writer::{AtomicLoadStats, BatchWriter, LoadStats, LoadSummary};

/// Reusable bulk loader
#[derive(Debug, Clone)]
pub struct BulkLoader {
    options: LoadOptions,
    mapper: ColumnMapper,
    cache: Arc<MappingCache>,
    stats: Arc<AtomicLoadStats>,
}

impl Default for BulkLoader {
    fn default() -> Self {
        Self::new(LoadOptions::default())
    }
}

impl BulkLoader {
    /// Loader with identity naming and the process-wide mapping cache
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            mapper: ColumnMapper::identity(),
            cache: MappingCache::global(),
            stats: Arc::new(AtomicLoadStats::default()),
        }
    }

    /// Use a different column naming strategy
    pub fn with_naming<S: ColumnNamingStrategy + 'static>(mut self, naming: S) -> Self {
        self.mapper = ColumnMapper::new(naming);
        self
    }

    /// Use a private mapping cache
    pub fn with_cache(mut self, cache: Arc<MappingCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Options in effect
    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Statistics across every load run by this loader
    pub fn stats(&self) -> LoadStats {
        self.stats.snapshot()
    }

    /// Column mapping this loader would use for `T`
    pub fn mapping<T: BulkRecord>(&self) -> Result<Arc<ColumnMapping<T>>> {
        self.cache
            .get_or_build::<T>(&self.mapper, &self.options.exclusion())
    }

    /// Load records from any iterator
    pub async fn load<T, I>(
        &self,
        executor: LoadExecutor<'_>,
        table: &str,
        records: I,
    ) -> Result<LoadSummary>
    where
        T: BulkRecord,
        I: IntoIterator<Item = T>,
        I::IntoIter: Send,
    {
        let mut source = IterSource::new(records);
        self.run(executor, table, &mut source, None).await
    }

    /// Load records from a stream
    pub async fn load_stream<T, S>(
        &self,
        executor: LoadExecutor<'_>,
        table: &str,
        stream: S,
    ) -> Result<LoadSummary>
    where
        T: BulkRecord,
        S: Stream<Item = Result<T>> + Send + Unpin,
    {
        let mut source = StreamSource::new(stream);
        self.run(executor, table, &mut source, None).await
    }

    /// Load records from a caller-built source, such as a reader over
    /// another query
    pub async fn load_source<T, S>(
        &self,
        executor: LoadExecutor<'_>,
        table: &str,
        source: &mut S,
    ) -> Result<LoadSummary>
    where
        T: BulkRecord,
        S: RecordSource<T> + ?Sized,
    {
        self.run(executor, table, source, None).await
    }

    /// Load records from any iterator, aborting when `cancel` fires
    pub async fn load_with_cancel<T, I>(
        &self,
        executor: LoadExecutor<'_>,
        table: &str,
        records: I,
        cancel: CancellationToken,
    ) -> Result<LoadSummary>
    where
        T: BulkRecord,
        I: IntoIterator<Item = T>,
        I::IntoIter: Send,
    {
        let mut source = IterSource::new(records);
        self.run(executor, table, &mut source, Some(cancel)).await
    }

    /// Blocking load on a private current-thread runtime.
    ///
    /// Must not be called from inside an async runtime. The executor must
    /// not depend on another runtime's I/O driver; see
    /// [`BulkLoader::load_blocking_on`] for connections opened elsewhere.
    pub fn load_blocking<T, I>(
        &self,
        executor: LoadExecutor<'_>,
        table: &str,
        records: I,
    ) -> Result<LoadSummary>
    where
        T: BulkRecord,
        I: IntoIterator<Item = T>,
        I::IntoIter: Send,
    {
        ensure_outside_runtime()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::config(format!("Failed to start runtime: {}", e)))?;
        runtime.block_on(self.load(executor, table, records))
    }

    /// Blocking load driven by an existing runtime, typically the one that
    /// opened the connection.
    pub fn load_blocking_on<T, I>(
        &self,
        handle: &tokio::runtime::Handle,
        executor: LoadExecutor<'_>,
        table: &str,
        records: I,
    ) -> Result<LoadSummary>
    where
        T: BulkRecord,
        I: IntoIterator<Item = T>,
        I::IntoIter: Send,
    {
        ensure_outside_runtime()?;
        handle.block_on(self.load(executor, table, records))
    }

    async fn run<T, S>(
        &self,
        executor: LoadExecutor<'_>,
        table: &str,
        source: &mut S,
        cancel: Option<CancellationToken>,
    ) -> Result<LoadSummary>
    where
        T: BulkRecord,
        S: RecordSource<T> + ?Sized,
    {
        let prepared = self
            .options
            .target(table)
            .and_then(|target| Ok((target, self.mapping::<T>()?)));

        let (target, mapping) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                // Nothing reached the store; still release the source.
                if let Err(close_err) = source.close().await {
                    warn!(table, error = %close_err, "Closing record source failed");
                }
                return Err(e);
            }
        };

        let mut writer =
            BatchWriter::new(executor, mapping, target).with_stats(self.stats.clone());
        if let Some(token) = cancel {
            writer = writer.with_cancellation(token);
        }
        writer.write(source).await
    }
}

fn ensure_outside_runtime() -> Result<()> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(Error::unsupported(
            "blocking load called from within an async runtime; use load() instead",
        ));
    }
    Ok(())
}

/// Load records with a default loader for `options`
pub async fn bulk_load<T, I>(
    executor: LoadExecutor<'_>,
    table: &str,
    records: I,
    options: &LoadOptions,
) -> Result<LoadSummary>
where
    T: BulkRecord,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send,
{
    BulkLoader::new(options.clone())
        .load(executor, table, records)
        .await
}

/// Blocking variant of [`bulk_load`]
pub fn bulk_load_blocking<T, I>(
    executor: LoadExecutor<'_>,
    table: &str,
    records: I,
    options: &LoadOptions,
) -> Result<LoadSummary>
where
    T: BulkRecord,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send,
{
    BulkLoader::new(options.clone()).load_blocking(executor, table, records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::record::{FieldDescriptor, RecordTypeBuilder};
    use crate::types::Value;

    struct Metric {
        host: String,
        cpu: f64,
        note: String,
    }

    impl BulkRecord for Metric {
        fn record_name() -> &'static str {
            "Metric"
        }

        fn field_descriptors() -> Vec<FieldDescriptor<Self>> {
            RecordTypeBuilder::new("Metric")
                .field("host", |m: &Metric| Value::from(m.host.clone()))
                .field("cpu", |m: &Metric| Value::from(m.cpu))
                .marked_field("note", |m: &Metric| Value::from(m.note.clone()), &["computed"])
                .descriptors()
        }
    }

    fn metrics(n: usize) -> Vec<Metric> {
        (0..n)
            .map(|i| Metric {
                host: format!("h{}", i),
                cpu: i as f64,
                note: String::new(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_load_uses_options() {
        let store = MemoryStore::new();
        let loader = BulkLoader::new(
            LoadOptions::new()
                .with_batch_size(2)
                .with_exclude_marker_kind("computed")
                .with_table_lock(true),
        )
        .with_cache(Arc::new(MappingCache::new()));

        let summary = loader
            .load(LoadExecutor::connection(&store), "metrics", metrics(5))
            .await
            .unwrap();

        assert_eq!(summary.rows_written, 5);
        let batches = store.batches();
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b.table_lock && !b.transactional));
        assert_eq!(batches[0].columns, vec!["host", "cpu"]);
        assert_eq!(loader.stats().rows_written, 5);
    }

    #[tokio::test]
    async fn test_blocking_inside_runtime_is_rejected() {
        let store = MemoryStore::new();
        let err = BulkLoader::default()
            .load_blocking(LoadExecutor::connection(&store), "metrics", metrics(1))
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
        assert!(store.batches().is_empty());
    }

    #[test]
    fn test_free_function_blocking() {
        let store = MemoryStore::new();
        let summary = bulk_load_blocking(
            LoadExecutor::connection(&store),
            "metrics",
            metrics(3),
            &LoadOptions::new(),
        )
        .unwrap();
        assert_eq!(summary.rows_written, 3);
        assert_eq!(summary.batches_written, 1);
    }
}
