//! Object store records and their indexes.

use super::generator::KeyGenerator;
use super::index::IndexData;
use super::values::{RecordValue, ValueStore};
use crate::error::{IdbError, IdbResult};
use crate::key_path::{self, KeyPath};
use crate::key_range::{bounds_ordered, KeyRange};
use crate::types::{IndexId, StoreId};
use idb_codec::{encode_key, Key, StructuredValue};
use std::collections::BTreeMap;
use tracing::trace;

/// Options for creating an object store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectStoreParameters {
    /// Where keys live inside values. `None` means keys are supplied
    /// separately.
    pub key_path: Option<KeyPath>,
    /// Whether the store has a key generator.
    pub auto_increment: bool,
}

impl ObjectStoreParameters {
    /// Out-of-line keys, no generator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key path.
    #[must_use]
    pub fn key_path(mut self, key_path: impl Into<KeyPath>) -> Self {
        self.key_path = Some(key_path.into());
        self
    }

    /// Sets the autoIncrement flag.
    #[must_use]
    pub fn auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = auto_increment;
        self
    }
}

/// A record: its key and value.
#[derive(Debug, Clone)]
pub(crate) struct StoredRecord {
    pub key: Key,
    pub value: RecordValue,
}

/// An object store: records sorted by encoded primary key, plus indexes.
///
/// Cloning is how transactions snapshot a store before writing to it.
#[derive(Debug, Clone)]
pub(crate) struct ObjectStoreData {
    pub id: StoreId,
    pub name: String,
    pub key_path: Option<KeyPath>,
    pub generator: Option<KeyGenerator>,
    pub indexes: BTreeMap<IndexId, IndexData>,
    records: BTreeMap<Vec<u8>, StoredRecord>,
}

type RecordIter<'a> = Box<dyn DoubleEndedIterator<Item = (&'a Vec<u8>, &'a StoredRecord)> + 'a>;

impl ObjectStoreData {
    pub(crate) fn new(id: StoreId, name: String, params: ObjectStoreParameters) -> Self {
        Self {
            id,
            name,
            key_path: params.key_path,
            generator: params.auto_increment.then(KeyGenerator::new),
            indexes: BTreeMap::new(),
            records: BTreeMap::new(),
        }
    }

    pub(crate) fn auto_increment(&self) -> bool {
        self.generator.is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn record(&self, primary: &[u8]) -> Option<&StoredRecord> {
        self.records.get(primary)
    }

    pub(crate) fn records(&self) -> &BTreeMap<Vec<u8>, StoredRecord> {
        &self.records
    }

    /// Records whose key falls in `range`, in key order.
    pub(crate) fn records_in<'a>(&'a self, range: &KeyRange) -> RecordIter<'a> {
        let (lower, upper) = range.encoded_bounds();
        if bounds_ordered(&lower, &upper) {
            Box::new(self.records.range((lower, upper)))
        } else {
            Box::new(std::iter::empty())
        }
    }

    pub(crate) fn index(&self, id: IndexId) -> Option<&IndexData> {
        self.indexes.get(&id)
    }

    pub(crate) fn index_id(&self, name: &str) -> Option<IndexId> {
        self.indexes.values().find(|i| i.name == name).map(|i| i.id)
    }

    /// Index names, sorted.
    pub(crate) fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.values().map(|i| i.name.clone()).collect();
        names.sort();
        names
    }

    /// Stores `value` under `key`, or under a generated key when `key` is
    /// `None`.
    ///
    /// Fails with `ConstraintError` if the generator is exhausted, if
    /// `no_overwrite` is set and the key exists, or if a unique index
    /// already holds one of the record's index keys. A multiEntry array
    /// holding an invalid key fails with `DataError`. A failed store leaves
    /// records, indexes and the generator untouched.
    pub(crate) fn store_record(
        &mut self,
        values: &mut ValueStore,
        value: StructuredValue,
        key: Option<Key>,
        no_overwrite: bool,
    ) -> IdbResult<Key> {
        let saved = self.generator.clone();
        let result = self.try_store(values, value, key, no_overwrite);
        if result.is_err() {
            self.generator = saved;
        }
        result
    }

    fn try_store(
        &mut self,
        values: &mut ValueStore,
        mut value: StructuredValue,
        key: Option<Key>,
        no_overwrite: bool,
    ) -> IdbResult<Key> {
        let (key, generated) = match key {
            Some(key) => (key, false),
            None => {
                let generator = self
                    .generator
                    .as_mut()
                    .ok_or_else(|| IdbError::data("no key was given and the store has no key generator"))?;
                let n = generator
                    .generate()
                    .ok_or_else(|| IdbError::constraint("key generator is exhausted"))?;
                trace!(store = %self.name, key = n, next = generator.current(), "generated key");
                let key = Key::Number(n);
                if let Some(path) = self.key_path.as_ref().and_then(KeyPath::as_str) {
                    key_path::inject(&mut value, path, &key);
                }
                (key, true)
            }
        };

        let primary = encode_key(&key);
        if no_overwrite && self.records.contains_key(&primary) {
            return Err(IdbError::constraint(format!(
                "key {key} already exists in object store {:?}",
                self.name
            )));
        }

        let mut index_keys = Vec::with_capacity(self.indexes.len());
        for index in self.indexes.values() {
            let keys = index.keys_for(&value)?;
            if index.violates_unique(&keys, &primary) {
                return Err(IdbError::constraint(format!(
                    "unique index {:?} already contains the record's index key",
                    index.name
                )));
            }
            index_keys.push((index.id, keys));
        }

        if !generated {
            if let (Some(generator), Key::Number(n)) = (self.generator.as_mut(), &key) {
                generator.set_if_larger(*n);
            }
        }

        let stored = values.wrap(value)?;
        trace!(store = %self.name, %key, wrapped = stored.is_wrapped(), "record stored");
        self.remove(&primary);
        for (id, keys) in index_keys {
            if let Some(index) = self.indexes.get_mut(&id) {
                index.insert(&primary, keys);
            }
        }
        self.records.insert(
            primary,
            StoredRecord {
                key: key.clone(),
                value: stored,
            },
        );
        Ok(key)
    }

    fn remove(&mut self, primary: &[u8]) -> bool {
        if self.records.remove(primary).is_none() {
            return false;
        }
        for index in self.indexes.values_mut() {
            index.remove_record(primary);
        }
        true
    }

    /// Deletes every record in `range`, returning how many went.
    pub(crate) fn delete_range(&mut self, range: &KeyRange) -> u64 {
        let doomed: Vec<Vec<u8>> = self.records_in(range).map(|(k, _)| k.clone()).collect();
        doomed.iter().filter(|k| self.remove(k)).count() as u64
    }

    /// Deletes every record. Indexes stay but are emptied.
    pub(crate) fn clear(&mut self) -> u64 {
        let removed = self.len() as u64;
        self.records.clear();
        for index in self.indexes.values_mut() {
            index.clear();
        }
        removed
    }

    /// Indexes the existing records into a freshly created index.
    ///
    /// Fails with `ConstraintError` when two records share a key in a
    /// unique index, and with `DataError` when a record's multiEntry array
    /// holds an invalid key. The index is left partially filled; callers abort the
    /// transaction, which discards it.
    pub(crate) fn populate_index(&mut self, id: IndexId, values: &ValueStore) -> IdbResult<()> {
        let Some(mut index) = self.indexes.remove(&id) else {
            return Ok(());
        };
        let result = fill(&mut index, &self.records, values);
        self.indexes.insert(id, index);
        result
    }
}

fn fill(
    index: &mut IndexData,
    records: &BTreeMap<Vec<u8>, StoredRecord>,
    values: &ValueStore,
) -> IdbResult<()> {
    for (primary, record) in records {
        let value = values.load(&record.value)?;
        let keys = index.keys_for(&value)?;
        if index.violates_unique(&keys, primary) {
            return Err(IdbError::constraint(format!(
                "existing records violate unique index {:?}",
                index.name
            )));
        }
        index.insert(primary, keys);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::EngineStats;
    use crate::store::index::IndexParameters;
    use idb_codec::{Heap, Value};
    use idb_storage::InMemoryBackend;
    use std::sync::Arc;

    fn values() -> ValueStore {
        ValueStore::new(
            Box::new(InMemoryBackend::new()),
            1024,
            Arc::new(EngineStats::new()),
        )
    }

    fn object(props: &[(&str, Value)]) -> StructuredValue {
        let mut heap = Heap::new();
        let root = heap.object(props.iter().map(|(k, v)| (*k, v.clone())).collect::<Vec<_>>());
        StructuredValue::new(heap, root)
    }

    fn keys(store: &ObjectStoreData) -> Vec<Key> {
        store.records().values().map(|r| r.key.clone()).collect()
    }

    #[test]
    fn generated_keys_are_injected() {
        let mut values = values();
        let mut store = ObjectStoreData::new(
            StoreId(1),
            "s".into(),
            ObjectStoreParameters::new().key_path("id").auto_increment(true),
        );
        for expected in 1..=3 {
            let key = store.store_record(&mut values, object(&[]), None, false).unwrap();
            assert_eq!(key, Key::from(expected));
        }
        let record = store.record(&encode_key(&Key::from(2))).unwrap();
        let value = values.load(&record.value).unwrap();
        let root = value.root().as_object().unwrap();
        assert_eq!(value.heap().own_data_property(root, "id"), Some(&Value::from(2)));
    }

    #[test]
    fn explicit_and_generated_keys_interleave() {
        let mut values = values();
        let mut store = ObjectStoreData::new(
            StoreId(1),
            "s".into(),
            ObjectStoreParameters::new().auto_increment(true),
        );
        for key in [Some(2.0), None, Some(5.0), None, Some(6.66), Some(7.0)] {
            store
                .store_record(&mut values, StructuredValue::from("v"), key.map(Key::Number), false)
                .unwrap();
        }
        let expected: Vec<Key> = [2.0, 3.0, 5.0, 6.0, 6.66, 7.0].into_iter().map(Key::Number).collect();
        assert_eq!(keys(&store), expected);
    }

    #[test]
    fn add_rejects_existing_key_without_touching_generator() {
        let mut values = values();
        let mut store = ObjectStoreData::new(
            StoreId(1),
            "s".into(),
            ObjectStoreParameters::new().auto_increment(true),
        );
        store.store_record(&mut values, StructuredValue::from("a"), Some(Key::from(1)), true).unwrap();
        let before = store.generator.clone();
        let err = store
            .store_record(&mut values, StructuredValue::from("b"), Some(Key::from(1)), true)
            .unwrap_err();
        assert_eq!(err.name(), "ConstraintError");
        assert_eq!(store.generator, before);
    }

    #[test]
    fn unique_index_violation_restores_generator() {
        let mut values = values();
        let mut store = ObjectStoreData::new(
            StoreId(1),
            "s".into(),
            ObjectStoreParameters::new().auto_increment(true),
        );
        store.indexes.insert(
            IndexId(2),
            IndexData::new(IndexId(2), "email".into(), "email".into(), IndexParameters::new().unique(true)),
        );
        let email = || object(&[("email", Value::from("a@x"))]);
        assert_eq!(store.store_record(&mut values, email(), None, false).unwrap(), Key::from(1));
        let err = store.store_record(&mut values, email(), None, false).unwrap_err();
        assert_eq!(err.name(), "ConstraintError");
        assert_eq!(store.len(), 1);
        assert_eq!(store.generator.as_ref().map(KeyGenerator::current), Some(2));

        // Overwriting the owner of the index key is fine.
        store.store_record(&mut values, email(), Some(Key::from(1)), false).unwrap();
    }

    #[test]
    fn invalid_multi_entry_element_is_a_data_error() {
        let mut values = values();
        let mut store = ObjectStoreData::new(
            StoreId(1),
            "s".into(),
            ObjectStoreParameters::new().auto_increment(true),
        );
        store.indexes.insert(
            IndexId(2),
            IndexData::new(IndexId(2), "tags".into(), "tags".into(), IndexParameters::new().multi_entry(true)),
        );
        let tagged = |tags: Vec<Value>| {
            let mut heap = Heap::new();
            let tags = heap.array(tags);
            let root = heap.object([("tags", tags)]);
            StructuredValue::new(heap, root)
        };
        let err = store
            .store_record(&mut values, tagged(vec![Value::from("a"), Value::Null]), None, false)
            .unwrap_err();
        assert_eq!(err.name(), "DataError");
        assert_eq!(store.len(), 0);
        assert_eq!(store.generator.as_ref().map(KeyGenerator::current), Some(1));

        let key = store
            .store_record(&mut values, tagged(vec![Value::from("a")]), None, false)
            .unwrap();
        assert_eq!(key, Key::from(1));
    }

    #[test]
    fn exhausted_generator_fails_with_constraint_error() {
        let mut values = values();
        let mut store = ObjectStoreData::new(
            StoreId(1),
            "s".into(),
            ObjectStoreParameters::new().auto_increment(true),
        );
        store
            .store_record(&mut values, StructuredValue::from(1.0), Some(Key::Number(2f64.powi(60))), false)
            .unwrap();
        let err = store.store_record(&mut values, StructuredValue::from(2.0), None, false).unwrap_err();
        assert_eq!(err.name(), "ConstraintError");
    }

    #[test]
    fn delete_range_and_clear_maintain_indexes() {
        let mut values = values();
        let mut store = ObjectStoreData::new(StoreId(1), "s".into(), ObjectStoreParameters::new());
        store.indexes.insert(
            IndexId(2),
            IndexData::new(IndexId(2), "n".into(), "n".into(), IndexParameters::new()),
        );
        for i in 1..=5 {
            store
                .store_record(&mut values, object(&[("n", Value::from(i))]), Some(Key::from(i)), false)
                .unwrap();
        }
        let range = KeyRange::bound(Key::from(2), Key::from(4), false, true).unwrap();
        assert_eq!(store.delete_range(&range), 2);
        assert_eq!(keys(&store), vec![Key::from(1), Key::from(4), Key::from(5)]);
        assert_eq!(store.index(IndexId(2)).map(IndexData::len), Some(3));

        assert_eq!(store.clear(), 3);
        assert_eq!(store.index(IndexId(2)).map(IndexData::len), Some(0));
    }

    #[test]
    fn populating_a_unique_index_detects_duplicates() {
        let mut values = values();
        let mut store = ObjectStoreData::new(StoreId(1), "s".into(), ObjectStoreParameters::new());
        for i in 1..=2 {
            store
                .store_record(&mut values, object(&[("n", Value::from(7))]), Some(Key::from(i)), false)
                .unwrap();
        }
        store.indexes.insert(
            IndexId(2),
            IndexData::new(IndexId(2), "n".into(), "n".into(), IndexParameters::new()),
        );
        store.populate_index(IndexId(2), &values).unwrap();
        assert_eq!(store.index(IndexId(2)).map(IndexData::len), Some(2));

        store.indexes.insert(
            IndexId(3),
            IndexData::new(IndexId(3), "u".into(), "n".into(), IndexParameters::new().unique(true)),
        );
        let err = store.populate_index(IndexId(3), &values).unwrap_err();
        assert_eq!(err.name(), "ConstraintError");
        assert_eq!(store.index_names(), vec!["n".to_string(), "u".to_string()]);
    }
}
