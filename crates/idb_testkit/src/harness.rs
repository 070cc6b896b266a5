//! Model-checking harness.
//!
//! Runs operations against a real engine and a `BTreeMap` model side by
//! side, then checks that every read path (`getAll`, cursors in both
//! directions, index lookups) agrees with the model.

use crate::fixtures::{collect_cursor, drain, open_db, outcome, transaction};
use idb_core::{
    Connection, CursorDirection, Engine, IndexParameters, Key, KeyRange, ObjectStoreParameters, Outcome, Query,
    StructuredValue, TransactionMode,
};
use std::collections::BTreeMap;

/// Name of the harness store.
pub const STORE: &str = "records";
/// Name of the index over record values.
pub const INDEX: &str = "by_value";

/// One step applied by [`ModelHarness::apply`].
#[derive(Debug, Clone)]
pub enum ModelOp {
    /// Put `value` at `key` and commit.
    Put(Key, String),
    /// Delete every record in the range and commit.
    Delete(KeyRange),
    /// Clear the store and commit.
    Clear,
    /// Put `value` at `key`, then abort.
    AbortedPut(Key, String),
}

/// A test harness pairing an engine with an in-memory model.
pub struct ModelHarness {
    /// The engine instance.
    pub engine: Engine,
    /// Connection to the harness database.
    pub db: Connection,
    /// Record tracking for verification.
    records: BTreeMap<Key, String>,
}

impl ModelHarness {
    /// Creates a harness over a fresh in-memory engine. The store has
    /// out-of-line keys and an index on the value itself.
    pub fn new() -> Self {
        let engine = Engine::new();
        let db = open_db(&engine, "harness", 1, |db, _| {
            let store = db
                .create_object_store(STORE, ObjectStoreParameters::new())
                .expect("create_object_store");
            store
                .create_index(INDEX, "", IndexParameters::new())
                .expect("create_index");
        });
        Self {
            engine,
            db,
            records: BTreeMap::new(),
        }
    }

    /// Applies one operation to both the engine and the model.
    pub fn apply(&mut self, op: &ModelOp) {
        let txn = transaction(&self.db, &[STORE], TransactionMode::ReadWrite);
        let store = txn.object_store(STORE).expect("object_store");
        match op {
            ModelOp::Put(key, value) => {
                store
                    .put(&StructuredValue::from(value.as_str()), Some(key.clone()))
                    .expect("put");
                self.records.insert(key.clone(), value.clone());
            }
            ModelOp::Delete(range) => {
                store.delete(range.clone()).expect("delete");
                self.records
                    .retain(|key, _| !range.includes(key).expect("valid key"));
            }
            ModelOp::Clear => {
                store.clear().expect("clear");
                self.records.clear();
            }
            ModelOp::AbortedPut(key, value) => {
                store
                    .put(&StructuredValue::from(value.as_str()), Some(key.clone()))
                    .expect("put");
                txn.abort().expect("abort");
            }
        }
        let events = drain(&self.engine);
        let expected = if matches!(op, ModelOp::AbortedPut(..)) { "abort" } else { "complete" };
        assert_eq!(events.last(), Some(&expected), "{op:?} ended with {events:?}");
    }

    /// Applies a sequence of operations.
    pub fn apply_all(&mut self, ops: &[ModelOp]) {
        for op in ops {
            self.apply(op);
        }
    }

    /// Verifies that the store, its index and its cursors all match the
    /// model.
    pub fn verify_all(&self) {
        let txn = transaction(&self.db, &[STORE], TransactionMode::ReadOnly);
        let store = txn.object_store(STORE).expect("object_store");
        let index = store.index(INDEX).expect("index");

        let keys = store.get_all_keys(Query::All, None).expect("get_all_keys");
        let values = store.get_all(Query::All, None).expect("get_all");
        let count = store.count(Query::All).expect("count");
        let index_keys = index.get_all_keys(Query::All, None).expect("index get_all_keys");
        drain(&self.engine);

        let expected_keys: Vec<Key> = self.records.keys().cloned().collect();
        let expected_values: Vec<StructuredValue> = self
            .records
            .values()
            .map(|v| StructuredValue::from(v.as_str()))
            .collect();
        assert_eq!(outcome(&keys), Outcome::Keys(expected_keys.clone()));
        assert_eq!(outcome(&values), Outcome::Values(expected_values));
        assert_eq!(outcome(&count), Outcome::Count(self.records.len() as u64));

        // Index order is (value, primary key).
        let mut by_value: Vec<(&String, &Key)> = self.records.iter().map(|(k, v)| (v, k)).collect();
        by_value.sort_by(|a, b| Key::from(a.0.as_str()).cmp(&Key::from(b.0.as_str())).then(a.1.cmp(b.1)));
        let expected_index: Vec<Key> = by_value.iter().map(|(_, k)| (*k).clone()).collect();
        assert_eq!(outcome(&index_keys), Outcome::Keys(expected_index));

        self.verify_cursors(&expected_keys);
    }

    fn verify_cursors(&self, expected: &[Key]) {
        let txn = transaction(&self.db, &[STORE], TransactionMode::ReadOnly);
        let store = txn.object_store(STORE).expect("object_store");
        let forward = store.open_cursor(Query::All, CursorDirection::Next).expect("open_cursor");
        let seen: Vec<Key> = collect_cursor(&self.engine, &forward)
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(seen, expected, "forward cursor");

        let txn = transaction(&self.db, &[STORE], TransactionMode::ReadOnly);
        let store = txn.object_store(STORE).expect("object_store");
        let backward = store
            .open_key_cursor(Query::All, CursorDirection::Prev)
            .expect("open_key_cursor");
        let mut seen: Vec<Key> = collect_cursor(&self.engine, &backward)
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        seen.reverse();
        assert_eq!(seen, expected, "backward cursor");
    }

    /// Returns the count of tracked records.
    pub fn tracked_count(&self) -> usize {
        self.records.len()
    }
}

impl Default for ModelHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Strategy for harness operations over a small key space, so that puts
/// overwrite and deletes hit.
pub fn model_op_strategy() -> impl proptest::strategy::Strategy<Value = ModelOp> {
    use proptest::prelude::*;

    let key = (0..16i32).prop_map(Key::from);
    let value = "[a-c]{1,2}";
    prop_oneof![
        6 => (key.clone(), value).prop_map(|(k, v)| ModelOp::Put(k, v)),
        2 => (0..16i32, 0..16i32).prop_map(|(a, b)| {
            let (lower, upper) = if a <= b { (a, b) } else { (b, a) };
            ModelOp::Delete(
                KeyRange::bound(Key::from(lower), Key::from(upper), false, false).expect("ordered bounds"),
            )
        }),
        1 => Just(ModelOp::Clear),
        1 => (key, value).prop_map(|(k, v)| ModelOp::AbortedPut(k, v)),
    ]
}
