//! Cursor iteration.
//!
//! A cursor walks a store or index inside a key range. Its position is kept
//! as encoded keys, so each step is a single range query over the sorted
//! records or index entries: the range's own bounds narrowed by the current
//! position and by any target key passed to `continue`.

use crate::error::{IdbError, IdbResult};
use crate::key_range::{bounds_ordered, KeyRange};
use crate::store::{ObjectStoreData, ValueStore};
use crate::types::{IndexId, RequestId, StoreId, TransactionId};
use idb_codec::{decode_key, encode_key, Key, StructuredValue};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

/// Iteration direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CursorDirection {
    /// Ascending, every record.
    #[default]
    Next,
    /// Ascending, first record of each index key.
    NextUnique,
    /// Descending, every record.
    Prev,
    /// Descending, first record of each index key.
    PrevUnique,
}

impl CursorDirection {
    /// Returns true for the ascending directions.
    #[must_use]
    pub fn is_forward(self) -> bool {
        matches!(self, Self::Next | Self::NextUnique)
    }

    /// Returns true for the directions that skip duplicate index keys.
    #[must_use]
    pub fn is_unique(self) -> bool {
        matches!(self, Self::NextUnique | Self::PrevUnique)
    }
}

impl fmt::Display for CursorDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Next => "next",
            Self::NextUnique => "nextunique",
            Self::Prev => "prev",
            Self::PrevUnique => "prevunique",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CursorSource {
    Store(StoreId),
    Index(StoreId, IndexId),
}

impl CursorSource {
    pub(crate) fn store(self) -> StoreId {
        match self {
            Self::Store(s) | Self::Index(s, _) => s,
        }
    }
}

#[derive(Debug)]
pub(crate) struct CursorData {
    pub transaction: TransactionId,
    pub source: CursorSource,
    pub direction: CursorDirection,
    pub range: KeyRange,
    pub key_only: bool,
    pub request: RequestId,
    /// Encoded key of the current record (index key for index cursors).
    pub position: Option<Vec<u8>>,
    /// Encoded primary key of the current record, index cursors only.
    pub object_store_position: Option<Vec<u8>>,
    pub key: Option<Key>,
    pub primary_key: Option<Key>,
    pub value: Option<Arc<StructuredValue>>,
    pub got_value: bool,
}

/// Target of a `continue` or `continuePrimaryKey` call.
#[derive(Debug, Clone, Default)]
pub(crate) struct Target {
    pub key: Option<Key>,
    pub primary_key: Option<Key>,
}

type Entry = (Vec<u8>, Vec<u8>);

impl CursorData {
    pub(crate) fn new(
        transaction: TransactionId,
        source: CursorSource,
        direction: CursorDirection,
        range: KeyRange,
        key_only: bool,
        request: RequestId,
    ) -> Self {
        Self {
            transaction,
            source,
            direction,
            range,
            key_only,
            request,
            position: None,
            object_store_position: None,
            key: None,
            primary_key: None,
            value: None,
            got_value: false,
        }
    }

    /// The key `update` and `delete` act on: the current primary key.
    pub(crate) fn effective_key(&self) -> Option<&Key> {
        self.primary_key.as_ref()
    }

    /// Moves `count` records along. Returns false, with the cursor cleared,
    /// if the range ran out first.
    pub(crate) fn iterate(
        &mut self,
        store: &ObjectStoreData,
        values: &ValueStore,
        target: &Target,
        count: u32,
    ) -> IdbResult<bool> {
        let key = target.key.as_ref().map(encode_key);
        let primary_key = target.primary_key.as_ref().map(encode_key);
        let mut position = self.position.clone();
        let mut object_store_position = self.object_store_position.clone();

        for _ in 0..count.max(1) {
            let found = match self.source {
                CursorSource::Store(_) => self
                    .find_record(store, key.as_ref(), position.as_ref())
                    .map(|k| (k, None)),
                CursorSource::Index(_, index) => self
                    .find_entry(
                        store,
                        index,
                        key.as_ref(),
                        primary_key.as_ref(),
                        position.as_ref().zip(object_store_position.as_ref()),
                    )?
                    .map(|(k, p)| (k, Some(p))),
            };
            let Some((k, p)) = found else {
                self.key = None;
                if matches!(self.source, CursorSource::Index(..)) {
                    self.object_store_position = None;
                    self.primary_key = None;
                }
                self.value = None;
                self.got_value = false;
                return Ok(false);
            };
            position = Some(k);
            object_store_position = p;
        }

        let (Some(position), osp) = (position, object_store_position) else {
            return Err(IdbError::unknown("cursor iteration lost its position"));
        };
        let primary = osp.as_ref().unwrap_or(&position);
        let record = store
            .record(primary)
            .ok_or_else(|| IdbError::unknown("index entry points at a missing record"))?;

        self.key = Some(match self.source {
            CursorSource::Store(_) => record.key.clone(),
            CursorSource::Index(..) => decode_key(&position)?,
        });
        self.primary_key = Some(record.key.clone());
        self.value = if self.key_only {
            None
        } else {
            Some(values.load(&record.value)?)
        };
        self.position = Some(position);
        self.object_store_position = osp;
        self.got_value = true;
        Ok(true)
    }

    fn find_record(
        &self,
        store: &ObjectStoreData,
        key: Option<&Vec<u8>>,
        position: Option<&Vec<u8>>,
    ) -> Option<Vec<u8>> {
        let (mut lower, mut upper) = self.range.encoded_bounds();
        if self.direction.is_forward() {
            if let Some(k) = key {
                lower = max_lower(lower, Bound::Included(k.clone()));
            }
            if let Some(p) = position {
                lower = max_lower(lower, Bound::Excluded(p.clone()));
            }
        } else {
            if let Some(k) = key {
                upper = min_upper(upper, Bound::Included(k.clone()));
            }
            if let Some(p) = position {
                upper = min_upper(upper, Bound::Excluded(p.clone()));
            }
        }
        if !bounds_ordered(&lower, &upper) {
            return None;
        }
        let mut records = store.records().range((lower, upper));
        let found = if self.direction.is_forward() {
            records.next()
        } else {
            records.next_back()
        };
        found.map(|(k, _)| k.clone())
    }

    fn find_entry(
        &self,
        store: &ObjectStoreData,
        index: IndexId,
        key: Option<&Vec<u8>>,
        primary_key: Option<&Vec<u8>>,
        position: Option<(&Vec<u8>, &Vec<u8>)>,
    ) -> IdbResult<Option<Entry>> {
        let index = store
            .index(index)
            .ok_or_else(|| IdbError::invalid_state("the cursor's index was deleted"))?;
        let (mut lower, mut upper) = self.range.index_bounds();
        match self.direction {
            CursorDirection::Next => {
                if let Some(k) = key {
                    let pk = primary_key.cloned().unwrap_or_default();
                    lower = max_lower(lower, Bound::Included((k.clone(), pk)));
                }
                if let Some((p, osp)) = position {
                    lower = max_lower(lower, Bound::Excluded((p.clone(), osp.clone())));
                }
            }
            CursorDirection::NextUnique => {
                if let Some(k) = key {
                    lower = max_lower(lower, Bound::Included((k.clone(), Vec::new())));
                }
                if let Some((p, _)) = position {
                    lower = max_lower(lower, Bound::Included((successor(p), Vec::new())));
                }
            }
            CursorDirection::Prev => {
                if let Some(k) = key {
                    let bound = match primary_key {
                        Some(pk) => Bound::Included((k.clone(), pk.clone())),
                        None => Bound::Excluded((successor(k), Vec::new())),
                    };
                    upper = min_upper(upper, bound);
                }
                if let Some((p, osp)) = position {
                    upper = min_upper(upper, Bound::Excluded((p.clone(), osp.clone())));
                }
            }
            CursorDirection::PrevUnique => {
                if let Some(k) = key {
                    upper = min_upper(upper, Bound::Excluded((successor(k), Vec::new())));
                }
                if let Some((p, _)) = position {
                    upper = min_upper(upper, Bound::Excluded((p.clone(), Vec::new())));
                }
            }
        }
        if !bounds_ordered(&lower, &upper) {
            return Ok(None);
        }
        let mut entries = index.entries().range((lower, upper));
        let found = if self.direction.is_forward() {
            entries.next()
        } else {
            entries.next_back()
        };
        let Some(found) = found.cloned() else {
            return Ok(None);
        };
        if self.direction != CursorDirection::PrevUnique {
            return Ok(Some(found));
        }
        // prevunique lands on the lowest primary key of the index key.
        Ok(index
            .entries()
            .range((found.0.clone(), Vec::new())..)
            .next()
            .cloned())
    }
}

fn successor(encoded: &[u8]) -> Vec<u8> {
    let mut bytes = encoded.to_vec();
    bytes.push(0);
    bytes
}

fn bound_value<T>(bound: &Bound<T>) -> Option<&T> {
    match bound {
        Bound::Included(v) | Bound::Excluded(v) => Some(v),
        Bound::Unbounded => None,
    }
}

/// The tighter of two lower bounds.
fn max_lower<T: Ord>(a: Bound<T>, b: Bound<T>) -> Bound<T> {
    match (bound_value(&a), bound_value(&b)) {
        (None, _) => b,
        (_, None) => a,
        (Some(x), Some(y)) => match x.cmp(y) {
            Ordering::Greater => a,
            Ordering::Less => b,
            Ordering::Equal if matches!(a, Bound::Excluded(_)) => a,
            Ordering::Equal => b,
        },
    }
}

/// The tighter of two upper bounds.
fn min_upper<T: Ord>(a: Bound<T>, b: Bound<T>) -> Bound<T> {
    match (bound_value(&a), bound_value(&b)) {
        (None, _) => b,
        (_, None) => a,
        (Some(x), Some(y)) => match x.cmp(y) {
            Ordering::Less => a,
            Ordering::Greater => b,
            Ordering::Equal if matches!(a, Bound::Excluded(_)) => a,
            Ordering::Equal => b,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::EngineStats;
    use crate::store::{IndexData, IndexParameters, ObjectStoreParameters};
    use idb_codec::{Heap, Value};
    use idb_storage::InMemoryBackend;

    const INDEX: IndexId = IndexId(9);

    /// Records 1..=6 with index key `group` = a, a, b, b, b, c.
    fn fixture() -> (ObjectStoreData, ValueStore) {
        let mut values = ValueStore::new(
            Box::new(InMemoryBackend::new()),
            1024,
            Arc::new(EngineStats::new()),
        );
        let mut store = ObjectStoreData::new(StoreId(1), "s".into(), ObjectStoreParameters::new());
        store.indexes.insert(
            INDEX,
            IndexData::new(INDEX, "group".into(), "group".into(), IndexParameters::new()),
        );
        for (pk, group) in [(1, "a"), (2, "a"), (3, "b"), (4, "b"), (5, "b"), (6, "c")] {
            let mut heap = Heap::new();
            let root = heap.object([("group", Value::from(group))]);
            store
                .store_record(&mut values, StructuredValue::new(heap, root), Some(Key::from(pk)), false)
                .unwrap();
        }
        (store, values)
    }

    fn cursor(source: CursorSource, direction: CursorDirection, range: KeyRange) -> CursorData {
        CursorData::new(
            TransactionId(1),
            source,
            direction,
            range,
            false,
            RequestId(1),
        )
    }

    /// Walks the cursor to the end, collecting `(key, primary key)` pairs.
    fn walk(c: &mut CursorData, store: &ObjectStoreData, values: &ValueStore) -> Vec<(Key, Key)> {
        let mut seen = Vec::new();
        while c.iterate(store, values, &Target::default(), 1).unwrap() {
            seen.push((c.key.clone().unwrap(), c.primary_key.clone().unwrap()));
        }
        seen
    }

    fn pairs(items: &[(&str, i32)]) -> Vec<(Key, Key)> {
        items.iter().map(|(k, p)| (Key::from(*k), Key::from(*p))).collect()
    }

    #[test]
    fn store_cursor_walks_both_ways() {
        let (store, values) = fixture();
        let range = KeyRange::bound(Key::from(2), Key::from(4), false, false).unwrap();
        let mut c = cursor(CursorSource::Store(StoreId(1)), CursorDirection::Next, range.clone());
        let keys: Vec<Key> = walk(&mut c, &store, &values).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![Key::from(2), Key::from(3), Key::from(4)]);
        assert!(!c.got_value);
        assert!(c.key.is_none());

        let mut c = cursor(CursorSource::Store(StoreId(1)), CursorDirection::Prev, range);
        let keys: Vec<Key> = walk(&mut c, &store, &values).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![Key::from(4), Key::from(3), Key::from(2)]);
    }

    #[test]
    fn index_cursor_directions() {
        let (store, values) = fixture();
        let source = CursorSource::Index(StoreId(1), INDEX);
        let cases = [
            (
                CursorDirection::Next,
                pairs(&[("a", 1), ("a", 2), ("b", 3), ("b", 4), ("b", 5), ("c", 6)]),
            ),
            (CursorDirection::NextUnique, pairs(&[("a", 1), ("b", 3), ("c", 6)])),
            (
                CursorDirection::Prev,
                pairs(&[("c", 6), ("b", 5), ("b", 4), ("b", 3), ("a", 2), ("a", 1)]),
            ),
            (CursorDirection::PrevUnique, pairs(&[("c", 6), ("b", 3), ("a", 1)])),
        ];
        for (direction, expected) in cases {
            let mut c = cursor(source, direction, KeyRange::all());
            assert_eq!(walk(&mut c, &store, &values), expected, "{direction}");
        }
    }

    #[test]
    fn continue_to_key_and_primary_key() {
        let (store, values) = fixture();
        let source = CursorSource::Index(StoreId(1), INDEX);
        let mut c = cursor(source, CursorDirection::Next, KeyRange::all());
        assert!(c.iterate(&store, &values, &Target::default(), 1).unwrap());

        let target = Target {
            key: Some(Key::from("b")),
            primary_key: Some(Key::from(4)),
        };
        assert!(c.iterate(&store, &values, &target, 1).unwrap());
        assert_eq!(c.primary_key, Some(Key::from(4)));

        let target = Target {
            key: Some(Key::from("c")),
            primary_key: None,
        };
        assert!(c.iterate(&store, &values, &target, 1).unwrap());
        assert_eq!(c.primary_key, Some(Key::from(6)));

        let mut c = cursor(source, CursorDirection::Prev, KeyRange::all());
        let target = Target {
            key: Some(Key::from("b")),
            primary_key: Some(Key::from(4)),
        };
        assert!(c.iterate(&store, &values, &target, 1).unwrap());
        assert_eq!(c.primary_key, Some(Key::from(4)));
    }

    #[test]
    fn advance_skips_records() {
        let (store, values) = fixture();
        let mut c = cursor(CursorSource::Store(StoreId(1)), CursorDirection::Next, KeyRange::all());
        assert!(c.iterate(&store, &values, &Target::default(), 3).unwrap());
        assert_eq!(c.key, Some(Key::from(3)));
        assert!(c.iterate(&store, &values, &Target::default(), 3).unwrap());
        assert_eq!(c.key, Some(Key::from(6)));
        assert!(!c.iterate(&store, &values, &Target::default(), 1).unwrap());
    }

    #[test]
    fn exhausted_index_cursor_forgets_its_record() {
        let (store, values) = fixture();
        let range = KeyRange::only(Key::from("c")).unwrap();
        let mut c = cursor(CursorSource::Index(StoreId(1), INDEX), CursorDirection::Next, range);
        assert!(c.iterate(&store, &values, &Target::default(), 1).unwrap());
        assert_eq!(c.primary_key, Some(Key::from(6)));

        assert!(!c.iterate(&store, &values, &Target::default(), 1).unwrap());
        assert_eq!(c.key, None);
        assert_eq!(c.primary_key, None);
        assert_eq!(c.object_store_position, None);
        assert!(c.value.is_none());
    }

    #[test]
    fn values_load_unless_key_only() {
        let (store, values) = fixture();
        let mut c = cursor(CursorSource::Store(StoreId(1)), CursorDirection::Next, KeyRange::all());
        c.iterate(&store, &values, &Target::default(), 1).unwrap();
        assert!(c.value.is_some());

        c.key_only = true;
        c.iterate(&store, &values, &Target::default(), 1).unwrap();
        assert!(c.value.is_none());
    }

    #[test]
    fn bound_helpers() {
        use Bound::{Excluded, Included, Unbounded};
        assert_eq!(max_lower(Included(1), Excluded(1)), Excluded(1));
        assert_eq!(max_lower(Unbounded, Included(2)), Included(2));
        assert_eq!(max_lower(Included(3), Excluded(2)), Included(3));
        assert_eq!(min_upper(Included(1), Excluded(1)), Excluded(1));
        assert_eq!(min_upper(Included(5), Unbounded), Included(5));
        assert_eq!(min_upper(Included(3), Excluded(2)), Excluded(2));
    }
}
