//! Index storage.

use crate::error::IdbResult;
use crate::key_path::{Extracted, KeyPath};
use crate::key_range::{IndexEntry, KeyRange};
use crate::types::IndexId;
use idb_codec::{encode_key, StructuredValue};
use std::collections::{BTreeSet, HashMap};

/// Options for creating an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexParameters {
    /// Reject records whose index key is already present.
    pub unique: bool,
    /// Record one entry per element when the key path yields an array.
    pub multi_entry: bool,
}

impl IndexParameters {
    /// Creates parameters with both flags off.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            unique: false,
            multi_entry: false,
        }
    }

    /// Sets the unique flag.
    #[must_use]
    pub const fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Sets the multiEntry flag.
    #[must_use]
    pub const fn multi_entry(mut self, multi_entry: bool) -> Self {
        self.multi_entry = multi_entry;
        self
    }
}

/// An index: sorted `(index key, primary key)` pairs, both encoded.
#[derive(Debug, Clone)]
pub(crate) struct IndexData {
    pub id: IndexId,
    pub name: String,
    pub key_path: KeyPath,
    pub unique: bool,
    pub multi_entry: bool,
    entries: BTreeSet<IndexEntry>,
    /// Index keys recorded for each primary key, for removal.
    by_primary: HashMap<Vec<u8>, Vec<Vec<u8>>>,
}

impl IndexData {
    pub(crate) fn new(id: IndexId, name: String, key_path: KeyPath, params: IndexParameters) -> Self {
        Self {
            id,
            name,
            key_path,
            unique: params.unique,
            multi_entry: params.multi_entry,
            entries: BTreeSet::new(),
            by_primary: HashMap::new(),
        }
    }

    /// Encoded index keys `value` contributes. Empty when the key path does
    /// not yield a valid key.
    ///
    /// Fails with `DataError` when a multiEntry array holds an invalid key.
    pub(crate) fn keys_for(&self, value: &StructuredValue) -> IdbResult<Vec<Vec<u8>>> {
        let keys = if self.multi_entry {
            self.key_path.extract_multi_entry(value)?
        } else {
            match self.key_path.extract(value) {
                Extracted::Key(key) => vec![key],
                Extracted::Invalid | Extracted::Failure => Vec::new(),
            }
        };
        Ok(keys.iter().map(encode_key).collect())
    }

    /// Returns true if adding `keys` for `primary` would break uniqueness.
    /// Entries of `primary` itself do not count, since a put replaces them.
    pub(crate) fn violates_unique(&self, keys: &[Vec<u8>], primary: &[u8]) -> bool {
        self.unique
            && keys.iter().any(|key| {
                self.entries
                    .range((key.clone(), Vec::new())..)
                    .take_while(|(k, _)| k == key)
                    .any(|(_, p)| p.as_slice() != primary)
            })
    }

    pub(crate) fn insert(&mut self, primary: &[u8], keys: Vec<Vec<u8>>) {
        if keys.is_empty() {
            return;
        }
        for key in &keys {
            self.entries.insert((key.clone(), primary.to_vec()));
        }
        self.by_primary.insert(primary.to_vec(), keys);
    }

    pub(crate) fn remove_record(&mut self, primary: &[u8]) {
        if let Some(keys) = self.by_primary.remove(primary) {
            for key in keys {
                self.entries.remove(&(key, primary.to_vec()));
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.by_primary.clear();
    }

    pub(crate) fn entries(&self) -> &BTreeSet<IndexEntry> {
        &self.entries
    }

    /// Entries whose index key falls in `range`, in order.
    pub(crate) fn entries_in<'a>(
        &'a self,
        range: &KeyRange,
    ) -> Box<dyn DoubleEndedIterator<Item = &'a IndexEntry> + 'a> {
        let (lower, upper) = range.index_bounds();
        if crate::key_range::bounds_ordered(&lower, &upper) {
            Box::new(self.entries.range((lower, upper)))
        } else {
            Box::new(std::iter::empty())
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
