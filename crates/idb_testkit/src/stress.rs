//! Stress tests for the engine.
//!
//! These push many requests and transactions through one event loop and
//! count how many commit.

use crate::fixtures::{open_with_stores, transaction};
use idb_core::{Connection, Engine, Event, Key, Query, StructuredValue, TransactionMode};
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Length of each stored string value.
    pub value_size: usize,
    /// Number of distinct keys.
    pub key_count: usize,
    /// Records written per transaction in batched tests.
    pub batch_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            value_size: 256,
            key_count: 1_000,
            batch_size: 100,
        }
    }
}

/// An engine with stores `a` and `b`, ready for stress runs.
pub fn stress_engine() -> (Engine, Connection) {
    let engine = Engine::new();
    let db = open_with_stores(&engine, "stress", &["a", "b"]);
    (engine, db)
}

fn value(config: &StressConfig) -> StructuredValue {
    StructuredValue::from("x".repeat(config.value_size))
}

fn key(i: usize, config: &StressConfig) -> Key {
    Key::Number((i % config.key_count.max(1)) as f64)
}

/// Counts `complete` and `abort` events.
fn tally(events: &[Event]) -> (usize, usize) {
    events.iter().fold((0, 0), |(ok, failed), event| match event {
        Event::Complete { .. } => (ok + 1, failed),
        Event::Abort { .. } => (ok, failed + 1),
        _ => (ok, failed),
    })
}

/// One put per transaction, each committed before the next starts.
pub fn stress_sequential_writes(engine: &Engine, db: &Connection, config: &StressConfig) -> StressTestResult {
    let data = value(config);
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let txn = transaction(db, &["a"], TransactionMode::ReadWrite);
        let queued = txn
            .object_store("a")
            .and_then(|store| store.put(&data, Some(key(i, config))));
        if queued.is_err() {
            failed += 1;
            continue;
        }
        let (ok, aborted) = tally(&engine.run_until_idle());
        successful += ok;
        failed += aborted;
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Gets spread over readonly transactions that all run side by side.
pub fn stress_parallel_reads(engine: &Engine, db: &Connection, config: &StressConfig) -> StressTestResult {
    let data = value(config);
    let txn = transaction(db, &["a"], TransactionMode::ReadWrite);
    if let Ok(store) = txn.object_store("a") {
        for i in 0..config.key_count {
            let _ = store.put(&data, Some(key(i, config)));
        }
    }
    engine.run_until_idle();

    let start = Instant::now();
    let mut requests = Vec::with_capacity(config.operations);
    for chunk in 0..config.operations.div_ceil(config.batch_size.max(1)) {
        let txn = transaction(db, &["a"], TransactionMode::ReadOnly);
        let Ok(store) = txn.object_store("a") else { continue };
        for i in 0..config.batch_size.max(1) {
            let n = chunk * config.batch_size + i;
            if n >= config.operations {
                break;
            }
            if let Ok(request) = store.get(key(n, config)) {
                requests.push(request);
            }
        }
    }
    engine.run_until_idle();

    let successful = requests
        .iter()
        .filter(|r| matches!(r.error(), Ok(None)))
        .count();
    StressTestResult::new(successful, config.operations - successful, start.elapsed())
}

/// Many readwrite transactions created at once over overlapping scopes.
/// They must run one at a time in creation order; returns the result with
/// one operation per transaction.
pub fn stress_overlapping_writers(engine: &Engine, db: &Connection, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let mut created = Vec::with_capacity(config.operations);
    for i in 0..config.operations {
        let scope: &[&str] = if i % 3 == 0 { &["a", "b"] } else { &["a"] };
        let txn = transaction(db, scope, TransactionMode::ReadWrite);
        if let Ok(store) = txn.object_store("a") {
            let _ = store.put(&StructuredValue::from(i as f64), Some(Key::from("last")));
        }
        created.push(txn.id());
    }
    let events = engine.run_until_idle();
    let completed: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            Event::Complete { transaction } => Some(transaction.id()),
            _ => None,
        })
        .collect();
    assert_eq!(completed, created, "overlapping writers completed out of order");

    let (ok, failed) = tally(&events);
    StressTestResult::new(ok, failed, start.elapsed())
}

/// Every other transaction aborts after writing.
pub fn stress_transaction_aborts(engine: &Engine, db: &Connection, config: &StressConfig) -> StressTestResult {
    let data = value(config);
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let txn = transaction(db, &["b"], TransactionMode::ReadWrite);
        if let Ok(store) = txn.object_store("b") {
            let _ = store.put(&data, Some(key(i, config)));
        }
        if i % 2 == 0 {
            let _ = txn.abort();
        }
        let (ok, aborted) = tally(&engine.run_until_idle());
        successful += ok;
        failed += aborted;
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// `batch_size` puts per transaction.
pub fn stress_large_transactions(engine: &Engine, db: &Connection, config: &StressConfig) -> StressTestResult {
    let data = value(config);
    let batch_size = config.batch_size.max(1);
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for batch in 0..(config.operations / batch_size) {
        let txn = transaction(db, &["a"], TransactionMode::ReadWrite);
        let Ok(store) = txn.object_store("a") else {
            failed += batch_size;
            continue;
        };
        for i in 0..batch_size {
            let _ = store.put(&data, Some(Key::from((batch * batch_size + i) as f64)));
        }
        let (ok, _) = tally(&engine.run_until_idle());
        if ok == 1 {
            successful += batch_size;
        } else {
            failed += batch_size;
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Counts the records in `store`.
pub fn record_count(engine: &Engine, db: &Connection, store: &str) -> u64 {
    let txn = transaction(db, &[store], TransactionMode::ReadOnly);
    let request = txn
        .object_store(store)
        .and_then(|s| s.count(Query::All))
        .expect("count");
    engine.run_until_idle();
    request
        .result()
        .ok()
        .and_then(|outcome| outcome.as_count())
        .unwrap_or(0)
}
