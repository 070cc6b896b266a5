//! Test fixtures and engine helpers.
//!
//! Provides engines backed by memory or a temporary file, and helpers that
//! drive the event loop through the common open/upgrade dance.

use idb_core::{
    Config, Connection, Engine, Event, Heap, IdbError, Key, ObjectStoreParameters, Outcome, Request, StructuredValue,
    Transaction, TransactionMode, TransactionOptions, Value,
};
use idb_storage::FileBackend;
use std::path::PathBuf;
use tempfile::TempDir;

/// A test engine with automatic cleanup.
pub struct TestEngine {
    /// The engine instance.
    pub engine: Engine,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestEngine {
    /// Creates an engine whose large values stay in memory.
    pub fn memory() -> Self {
        Self {
            engine: Engine::new(),
            _temp_dir: None,
        }
    }

    /// Creates an engine whose large values go to a file in a temporary
    /// directory. Every value larger than `threshold` bytes is written out.
    pub fn file(threshold: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let backend = FileBackend::open_with_create_dirs(&temp_dir.path().join("values").join("blobs.log"))
            .expect("Failed to create value backend");
        let engine = Engine::with_backend(Config::new().large_value_threshold(threshold), Box::new(backend));
        Self {
            engine,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the value file path if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir
            .as_ref()
            .map(|d| d.path().join("values").join("blobs.log"))
    }
}

impl std::ops::Deref for TestEngine {
    type Target = Engine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

/// Opens `name` at `version`, calling `upgrade` from the `upgradeneeded`
/// event if one fires, and runs the event loop until the engine is idle.
///
/// Panics if the open fails.
pub fn open_db<F>(engine: &Engine, name: &str, version: u64, upgrade: F) -> Connection
where
    F: FnOnce(&Connection, &Transaction),
{
    let request = engine.open(name, Some(version)).expect("open should be accepted");
    let mut upgrade = Some(upgrade);
    while let Some(event) = engine.next_event() {
        if let Event::UpgradeNeeded {
            connection, transaction, ..
        } = &event
        {
            if let Some(f) = upgrade.take() {
                f(connection, transaction);
            }
        }
    }
    match request.error() {
        Ok(None) => {}
        Ok(Some(error)) => panic!("open of {name} failed: {error}"),
        Err(error) => panic!("open of {name} still pending: {error}"),
    }
    request.connection().expect("open should produce a connection")
}

/// Opens `name` at version 1 with one out-of-line store per entry of
/// `stores`.
pub fn open_with_stores(engine: &Engine, name: &str, stores: &[&str]) -> Connection {
    open_db(engine, name, 1, |db, _| {
        for store in stores {
            db.create_object_store(store, ObjectStoreParameters::new())
                .expect("create_object_store");
        }
    })
}

/// Starts a transaction with default options.
pub fn transaction(db: &Connection, stores: &[&str], mode: TransactionMode) -> Transaction {
    db.transaction(stores.iter().copied(), mode, TransactionOptions::new())
        .expect("transaction should start")
}

/// Runs the event loop until idle and returns the names of the events
/// delivered.
pub fn drain(engine: &Engine) -> Vec<&'static str> {
    engine.run_until_idle().iter().map(Event::name).collect()
}

/// The result of a completed request; panics if it failed.
pub fn outcome(request: &Request) -> Outcome {
    match request.error().expect("request should be done") {
        None => request.result().expect("request should be done"),
        Some(error) => panic!("request failed: {error}"),
    }
}

/// The error of a completed request; panics if it succeeded.
pub fn failure(request: &Request) -> IdbError {
    request
        .error()
        .expect("request should be done")
        .expect("request should have failed")
}

/// Runs the event loop until idle, continuing `request`'s cursor after
/// every success. Returns the `(key, primary key)` pairs visited.
pub fn collect_cursor(engine: &Engine, request: &Request) -> Vec<(Key, Key)> {
    let mut seen = Vec::new();
    while let Some(event) = engine.next_event() {
        let Event::Success { request: done } = &event else {
            continue;
        };
        if done != request {
            continue;
        }
        if let Some(cursor) = done.cursor() {
            let key = cursor.key().expect("positioned cursor has a key");
            let primary_key = cursor.primary_key().expect("positioned cursor has a primary key");
            seen.push((key, primary_key));
            cursor.continue_(None).expect("continue");
        }
    }
    seen
}

/// Writes `records` to `store` in one readwrite transaction and waits for
/// it to commit.
pub fn seed(engine: &Engine, db: &Connection, store: &str, records: &[(Key, StructuredValue)]) {
    let txn = transaction(db, &[store], TransactionMode::ReadWrite);
    let handle = txn.object_store(store).expect("object_store");
    for (key, value) in records {
        handle.put(value, Some(key.clone())).expect("put");
    }
    let events = drain(engine);
    assert_eq!(events.last(), Some(&"complete"), "seeding {store} did not commit: {events:?}");
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// An engine with a `people` store keyed on `id`, an `by_name` index
    /// and `count` records named `person-<n>`.
    pub fn people(count: usize) -> (TestEngine, Connection) {
        let test_engine = TestEngine::memory();
        let db = open_db(&test_engine, "people", 1, |db, _| {
            let store = db
                .create_object_store("people", ObjectStoreParameters::new().key_path("id"))
                .expect("create_object_store");
            store
                .create_index("by_name", "name", idb_core::IndexParameters::new())
                .expect("create_index");
        });

        let txn = transaction(&db, &["people"], TransactionMode::ReadWrite);
        let store = txn.object_store("people").expect("object_store");
        for i in 0..count {
            let mut heap = Heap::new();
            let root = heap.object([("id", Value::from(i as f64)), ("name", Value::from(format!("person-{i}")))]);
            let value = StructuredValue::new(heap, root);
            store.add(&value, None).expect("add");
        }
        drain(&test_engine);
        (test_engine, db)
    }
}
