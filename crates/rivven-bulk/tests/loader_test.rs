//! End-to-end load tests against the in-memory store

use async_trait::async_trait;
use futures::stream;
use rivven_bulk::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, BulkRecord)]
struct Account {
    id: i32,
    name: String,
    #[bulk(marker = "audit")]
    secret: String,
}

fn accounts(n: usize) -> Vec<Account> {
    (0..n)
        .map(|i| Account {
            id: i as i32,
            name: format!("user-{}", i),
            secret: format!("s-{}", i),
        })
        .collect()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn loader(options: LoadOptions) -> BulkLoader {
    BulkLoader::new(options).with_cache(Arc::new(MappingCache::new()))
}

/// Source that counts how often it is closed
struct CountingSource {
    remaining: Vec<Account>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl RecordSource<Account> for CountingSource {
    async fn next_record(&mut self) -> Result<Option<Account>> {
        Ok(self.remaining.pop())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ==================== Batching Tests ====================

#[tokio::test]
async fn test_twelve_thousand_rows_in_three_batches() {
    init_tracing();
    let store = MemoryStore::new();
    let summary = loader(LoadOptions::new().with_exclude_marker_kind("audit"))
        .load(LoadExecutor::connection(&store), "dbo.Accounts", accounts(12_001))
        .await
        .unwrap();

    assert_eq!(summary.rows_written, 12_001);
    assert_eq!(summary.batches_written, 3);

    let batches = store.batches();
    let sizes: Vec<_> = batches.iter().map(|b| b.rows).collect();
    assert_eq!(sizes, vec![5000, 5000, 2001]);
    for batch in &batches {
        assert_eq!(batch.columns, vec!["id", "name"]);
        assert_eq!(batch.batch_size, 5000);
    }

    let rows = store.rows("dbo.Accounts");
    assert_eq!(rows.len(), 12_001);
    assert!(rows.iter().all(|r| r.get_by_name("secret").is_none()));
}

#[tokio::test]
async fn test_batch_count_is_ceiling_of_rows_over_size() {
    for (rows, size, expected) in [(1, 3, 1), (3, 3, 1), (4, 3, 2), (9, 3, 3), (10, 1, 10)] {
        let store = MemoryStore::new();
        let summary = loader(LoadOptions::new().with_batch_size(size))
            .load(LoadExecutor::connection(&store), "Accounts", accounts(rows))
            .await
            .unwrap();

        assert_eq!(summary.batches_written, expected, "{} rows / {}", rows, size);
        assert_eq!(store.row_count("Accounts"), rows);
        assert!(store.batches().iter().all(|b| b.rows <= size));
    }
}

#[tokio::test]
async fn test_empty_input_issues_no_batches() {
    let store = MemoryStore::new();
    let summary = loader(LoadOptions::new())
        .load(LoadExecutor::connection(&store), "Accounts", Vec::<Account>::new())
        .await
        .unwrap();

    assert_eq!(summary.rows_written, 0);
    assert_eq!(summary.batches_written, 0);
    assert!(store.batches().is_empty());
}

#[tokio::test]
async fn test_round_trip_preserves_values_and_order() {
    let store = MemoryStore::new();
    loader(LoadOptions::new().with_batch_size(2).with_exclude_field_name("name"))
        .load(LoadExecutor::connection(&store), "[dbo].[Accounts]", accounts(5))
        .await
        .unwrap();

    let rows = store.rows("dbo.accounts");
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0].columns(), &["id".to_string(), "secret".to_string()]);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.get(0), Some(&Value::Int32(i as i32)));
        assert_eq!(row.get_by_name("secret"), Some(&Value::String(format!("s-{}", i))));
    }
}

// ==================== Failure Tests ====================

#[tokio::test]
async fn test_store_error_on_second_batch_keeps_first_under_autocommit() {
    init_tracing();
    let store = MemoryStore::new();
    store.fail_on_batch(2);

    let err = loader(LoadOptions::new().with_batch_size(5000))
        .load(LoadExecutor::connection(&store), "Accounts", accounts(12_001))
        .await
        .unwrap_err();

    match &err {
        Error::Store { batch, rows, .. } => {
            assert_eq!(*batch, 2);
            assert_eq!(rows.clone(), 5000..10_000);
        }
        other => panic!("expected store error, got {:?}", other),
    }
    assert_eq!(err.store_cause().unwrap().category(), ErrorCategory::Constraint);
    assert_eq!(store.row_count("Accounts"), 5000);
    // No batch is attempted after the failure.
    assert_eq!(store.batches().len(), 2);
}

#[tokio::test]
async fn test_store_error_inside_transaction_rolls_back_everything() {
    let store = MemoryStore::new();
    store.fail_on_batch(2);

    let tx = store.begin().await.unwrap();
    let err = loader(LoadOptions::new().with_batch_size(5000))
        .load(LoadExecutor::transaction(tx.as_ref()), "Accounts", accounts(12_001))
        .await
        .unwrap_err();
    assert!(err.is_store());

    tx.rollback().await.unwrap();
    assert_eq!(store.row_count("Accounts"), 0);
    assert!(store.batches().iter().all(|b| b.transactional));
}

#[tokio::test]
async fn test_transactional_load_is_visible_only_after_commit() {
    let store = MemoryStore::new();
    let tx = store.begin().await.unwrap();

    loader(LoadOptions::new().with_batch_size(10).with_table_lock(true))
        .load(LoadExecutor::transaction(tx.as_ref()), "Accounts", accounts(25))
        .await
        .unwrap();
    assert_eq!(store.row_count("Accounts"), 0);

    tx.commit().await.unwrap();
    assert_eq!(store.row_count("Accounts"), 25);
    assert!(store.batches().iter().all(|b| b.table_lock));
}

#[tokio::test]
async fn test_source_error_is_propagated_unchanged() {
    let store = MemoryStore::new();
    let records = stream::iter(vec![
        Ok(accounts(1).remove(0)),
        Err(Error::query("cursor lost")),
    ]);

    let err = loader(LoadOptions::new())
        .load_stream(LoadExecutor::connection(&store), "Accounts", records)
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Query);
    assert!(store.batches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_slow_batch_times_out() {
    let store = MemoryStore::new();
    store.set_write_delay(Duration::from_secs(30));

    let err = loader(LoadOptions::new().with_timeout_secs(5))
        .load(LoadExecutor::connection(&store), "Accounts", accounts(3))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(!err.is_store());
    assert_eq!(store.row_count("Accounts"), 0);
}

// ==================== Cancellation Tests ====================

#[tokio::test(start_paused = true)]
async fn test_cancel_aborts_in_flight_batch() {
    let store = MemoryStore::new();
    store.set_write_delay(Duration::from_secs(60));
    let token = CancellationToken::new();

    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = loader(LoadOptions::new())
        .load_with_cancel(LoadExecutor::connection(&store), "Accounts", accounts(10), token)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(!err.is_store());
    assert_eq!(store.batches().len(), 1);
    assert_eq!(store.row_count("Accounts"), 0);
}

#[tokio::test]
async fn test_cancel_before_start_touches_nothing() {
    let store = MemoryStore::new();
    let token = CancellationToken::new();
    token.cancel();

    let loader = loader(LoadOptions::new());
    let err = loader
        .load_with_cancel(LoadExecutor::connection(&store), "Accounts", accounts(10), token)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled { rows_written: 0 }));
    assert!(store.batches().is_empty());
    assert_eq!(loader.stats().loads_cancelled, 1);
}

// ==================== Preparation Tests ====================

#[derive(BulkRecord)]
struct OnlySecret {
    #[bulk(marker = "audit")]
    secret: String,
}

#[tokio::test]
async fn test_mapping_error_happens_before_store_access() {
    let store = MemoryStore::new();
    let closed = Arc::new(AtomicUsize::new(0));
    let mut source = CountingSource {
        remaining: accounts(3),
        closed: closed.clone(),
    };

    let options = LoadOptions::new()
        .with_exclude_field_name("id")
        .with_exclude_field_name("name")
        .with_exclude_field_name("secret");
    let err = loader(options)
        .load_source(LoadExecutor::connection(&store), "Accounts", &mut source)
        .await
        .unwrap_err();

    assert!(err.is_mapping());
    assert!(store.batches().is_empty());
    assert!(store.statements().is_empty());
    assert_eq!(closed.load(Ordering::SeqCst), 1);

    let err = loader(LoadOptions::new().with_exclude_marker_kind("audit"))
        .load(
            LoadExecutor::connection(&store),
            "Secrets",
            vec![OnlySecret {
                secret: "x".into(),
            }],
        )
        .await
        .unwrap_err();
    assert!(err.is_mapping());
    assert!(store.batches().is_empty());
}

/// Source whose close always fails
struct FailingCloseSource {
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl RecordSource<Account> for FailingCloseSource {
    async fn next_record(&mut self) -> Result<Option<Account>> {
        Ok(None)
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Err(Error::connection("handle already released"))
    }
}

#[tokio::test]
async fn test_close_failure_does_not_mask_preparation_error() {
    init_tracing();
    let store = MemoryStore::new();
    let closed = Arc::new(AtomicUsize::new(0));
    let mut source = FailingCloseSource {
        closed: closed.clone(),
    };

    let err = loader(LoadOptions::new())
        .load_source(LoadExecutor::connection(&store), "bad name!", &mut source)
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert!(store.statements().is_empty());
}

#[tokio::test]
async fn test_source_is_closed_after_success() {
    let store = MemoryStore::new();
    let closed = Arc::new(AtomicUsize::new(0));
    let mut source = CountingSource {
        remaining: accounts(4),
        closed: closed.clone(),
    };

    let summary = loader(LoadOptions::new())
        .load_source(LoadExecutor::connection(&store), "Accounts", &mut source)
        .await
        .unwrap();

    assert_eq!(summary.rows_written, 4);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_invalid_table_name_is_rejected() {
    let store = MemoryStore::new();
    let err = loader(LoadOptions::new())
        .load(LoadExecutor::connection(&store), "Accounts; DROP TABLE x", accounts(1))
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert!(store.batches().is_empty());
}

#[tokio::test]
async fn test_temp_and_bracketed_table_names_load() {
    let store = MemoryStore::new();

    for table in ["#staging", "[Order Details]", "dbo.[Order-Lines]"] {
        let summary = loader(LoadOptions::new())
            .load(LoadExecutor::connection(&store), table, accounts(2))
            .await
            .unwrap();
        assert_eq!(summary.rows_written, 2);
        assert_eq!(store.row_count(table), 2);
    }

    assert_eq!(store.row_count("[#staging]"), 2);
    assert_eq!(store.row_count("[dbo].[order-lines]"), 2);
}

#[tokio::test]
async fn test_loader_reuses_cached_mapping() {
    let store = MemoryStore::new();
    let cache = Arc::new(MappingCache::new());
    let loader = BulkLoader::new(LoadOptions::new()).with_cache(cache.clone());

    for _ in 0..3 {
        loader
            .load(LoadExecutor::connection(&store), "Accounts", accounts(2))
            .await
            .unwrap();
    }

    assert_eq!(cache.len(), 1);
    let stats = loader.stats();
    assert_eq!(stats.loads_completed, 3);
    assert_eq!(stats.rows_written, 6);
}

// ==================== Blocking Tests ====================

#[test]
fn test_blocking_load_from_plain_thread() {
    let store = MemoryStore::new();
    let summary = loader(LoadOptions::new().with_batch_size(4))
        .load_blocking(LoadExecutor::connection(&store), "Accounts", accounts(10))
        .unwrap();

    assert_eq!(summary.batches_written, 3);
    assert_eq!(store.row_count("Accounts"), 10);
}

#[test]
fn test_blocking_load_on_existing_runtime() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let store = MemoryStore::new();

    let summary = loader(LoadOptions::new())
        .load_blocking_on(
            runtime.handle(),
            LoadExecutor::connection(&store),
            "Accounts",
            accounts(3),
        )
        .unwrap();
    assert_eq!(summary.rows_written, 3);
}
