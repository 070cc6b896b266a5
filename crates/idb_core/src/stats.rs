//! Engine statistics.
//!
//! Counters for monitoring what the engine does.
//!
//! # Usage
//!
//! ```rust
//! use idb_core::Engine;
//!
//! let engine = Engine::new();
//! let stats = engine.stats();
//! assert_eq!(stats.transactions_committed, 0);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Engine statistics.
///
/// All counters are atomic and can be read while the engine is working.
/// Values only ever increase.
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Records read by get, getAll and cursor steps.
    reads: AtomicU64,
    /// Records written by put and add.
    writes: AtomicU64,
    /// Records removed by delete and clear.
    deletes: AtomicU64,
    /// Cursor iterations executed.
    cursor_steps: AtomicU64,

    transactions_started: AtomicU64,
    transactions_committed: AtomicU64,
    transactions_aborted: AtomicU64,

    /// Values stored out-of-line.
    wrapped_values: AtomicU64,
    /// Bytes written to the value backend.
    bytes_wrapped: AtomicU64,

    /// Requests that completed with an error.
    failed_requests: AtomicU64,
}

impl EngineStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_read(&self, records: u64) {
        self.reads.fetch_add(records, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self, records: u64) {
        self.deletes.fetch_add(records, Ordering::Relaxed);
    }

    pub(crate) fn record_cursor_step(&self) {
        self.cursor_steps.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_start(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_abort(&self) {
        self.transactions_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_wrapped_value(&self, bytes: u64) {
        self.wrapped_values.fetch_add(1, Ordering::Relaxed);
        self.bytes_wrapped.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_failed_request(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of records read.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the number of records written.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns the number of records deleted.
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Returns the number of cursor iterations.
    pub fn cursor_steps(&self) -> u64 {
        self.cursor_steps.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions started.
    pub fn transactions_started(&self) -> u64 {
        self.transactions_started.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions committed.
    pub fn transactions_committed(&self) -> u64 {
        self.transactions_committed.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions aborted.
    pub fn transactions_aborted(&self) -> u64 {
        self.transactions_aborted.load(Ordering::Relaxed)
    }

    /// Returns the number of values stored out-of-line.
    pub fn wrapped_values(&self) -> u64 {
        self.wrapped_values.load(Ordering::Relaxed)
    }

    /// Returns the number of bytes written to the value backend.
    pub fn bytes_wrapped(&self) -> u64 {
        self.bytes_wrapped.load(Ordering::Relaxed)
    }

    /// Returns the number of requests that failed.
    pub fn failed_requests(&self) -> u64 {
        self.failed_requests.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads(),
            writes: self.writes(),
            deletes: self.deletes(),
            cursor_steps: self.cursor_steps(),
            transactions_started: self.transactions_started(),
            transactions_committed: self.transactions_committed(),
            transactions_aborted: self.transactions_aborted(),
            wrapped_values: self.wrapped_values(),
            bytes_wrapped: self.bytes_wrapped(),
            failed_requests: self.failed_requests(),
        }
    }
}

/// A point-in-time snapshot of engine statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Records read.
    pub reads: u64,
    /// Records written.
    pub writes: u64,
    /// Records deleted.
    pub deletes: u64,
    /// Cursor iterations.
    pub cursor_steps: u64,
    /// Transactions started.
    pub transactions_started: u64,
    /// Transactions committed.
    pub transactions_committed: u64,
    /// Transactions aborted.
    pub transactions_aborted: u64,
    /// Values stored out-of-line.
    pub wrapped_values: u64,
    /// Bytes written to the value backend.
    pub bytes_wrapped: u64,
    /// Requests that failed.
    pub failed_requests: u64,
}
