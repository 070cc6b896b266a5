//! Running queued operations against the store data.

use super::EngineInner;
use crate::cursor::{CursorSource, Target};
use crate::error::{IdbError, IdbResult};
use crate::key_range::KeyRange;
use crate::request::Outcome;
use crate::store::{IndexData, ObjectStoreData, StoredRecord, ValueStore};
use crate::types::{CursorId, IndexId, StoreId, TransactionId};
use idb_codec::{Key, StructuredValue};
use tracing::trace;

/// An operation waiting in a transaction's queue.
#[derive(Debug)]
pub(crate) enum Operation {
    Put {
        store: StoreId,
        value: StructuredValue,
        key: Option<Key>,
        no_overwrite: bool,
    },
    /// First match: its value, or with `keys` its (primary) key.
    Get {
        source: CursorSource,
        range: KeyRange,
        keys: bool,
    },
    GetAll {
        source: CursorSource,
        range: KeyRange,
        count: Option<u32>,
        keys: bool,
    },
    Count {
        source: CursorSource,
        range: KeyRange,
    },
    Delete {
        store: StoreId,
        range: KeyRange,
    },
    Clear {
        store: StoreId,
    },
    Iterate {
        cursor: CursorId,
        target: Target,
        count: u32,
    },
    /// Fills an index created during an upgrade.
    PopulateIndex {
        store: StoreId,
        index: IndexId,
    },
}

fn deleted_store() -> IdbError {
    IdbError::invalid_state("the object store was deleted")
}

fn index_of(store: &ObjectStoreData, index: IndexId) -> IdbResult<&IndexData> {
    store
        .index(index)
        .ok_or_else(|| IdbError::invalid_state("the index was deleted"))
}

/// Records matched by `range` in `source`, in source order.
fn matches<'a>(
    store: &'a ObjectStoreData,
    source: CursorSource,
    range: &KeyRange,
) -> IdbResult<Box<dyn Iterator<Item = &'a StoredRecord> + 'a>> {
    Ok(match source {
        CursorSource::Store(_) => Box::new(store.records_in(range).map(|(_, record)| record)),
        CursorSource::Index(_, index) => {
            let index = index_of(store, index)?;
            Box::new(
                index
                    .entries_in(range)
                    .filter_map(move |(_, primary)| store.record(primary)),
            )
        }
    })
}

fn value_of(values: &ValueStore, record: &StoredRecord) -> IdbResult<StructuredValue> {
    Ok(values.load(&record.value)?.as_ref().clone())
}

impl EngineInner {
    pub(super) fn execute(&mut self, txn: TransactionId, op: Operation) -> IdbResult<Outcome> {
        let Self {
            databases,
            transactions,
            cursors,
            values,
            stats,
            ..
        } = self;
        let txn = transactions
            .get_mut(&txn)
            .ok_or_else(|| IdbError::unknown("operation for an unknown transaction"))?;
        let db = databases
            .get_mut(&txn.db_name)
            .ok_or_else(|| IdbError::unknown("operation for a deleted database"))?;

        match op {
            Operation::Put {
                store,
                value,
                key,
                no_overwrite,
            } => {
                let store = db.stores.get_mut(&store).ok_or_else(deleted_store)?;
                txn.snapshot(store);
                let key = store.store_record(values, value, key, no_overwrite)?;
                stats.record_write();
                Ok(Outcome::Key(key))
            }
            Operation::Get { source, range, keys } => {
                let store = db.stores.get(&source.store()).ok_or_else(deleted_store)?;
                let Some(record) = matches(store, source, &range)?.next() else {
                    return Ok(Outcome::Undefined);
                };
                if keys {
                    return Ok(Outcome::Key(record.key.clone()));
                }
                stats.record_read(1);
                Ok(Outcome::Value(value_of(values, record)?))
            }
            Operation::GetAll {
                source,
                range,
                count,
                keys,
            } => {
                let store = db.stores.get(&source.store()).ok_or_else(deleted_store)?;
                let limit = match count {
                    Some(n) if n > 0 => n as usize,
                    _ => usize::MAX,
                };
                let records = matches(store, source, &range)?.take(limit);
                if keys {
                    return Ok(Outcome::Keys(records.map(|r| r.key.clone()).collect()));
                }
                let found = records
                    .map(|r| value_of(values, r))
                    .collect::<IdbResult<Vec<_>>>()?;
                stats.record_read(found.len() as u64);
                Ok(Outcome::Values(found))
            }
            Operation::Count { source, range } => {
                let store = db.stores.get(&source.store()).ok_or_else(deleted_store)?;
                let count = match source {
                    CursorSource::Store(_) => store.records_in(&range).count(),
                    CursorSource::Index(_, index) => index_of(store, index)?.entries_in(&range).count(),
                };
                Ok(Outcome::Count(count as u64))
            }
            Operation::Delete { store, range } => {
                let store = db.stores.get_mut(&store).ok_or_else(deleted_store)?;
                txn.snapshot(store);
                let removed = store.delete_range(&range);
                stats.record_delete(removed);
                trace!(transaction = %txn.id, store = %store.name, removed, "deleted records");
                Ok(Outcome::Undefined)
            }
            Operation::Clear { store } => {
                let store = db.stores.get_mut(&store).ok_or_else(deleted_store)?;
                txn.snapshot(store);
                let removed = store.clear();
                stats.record_delete(removed);
                Ok(Outcome::Undefined)
            }
            Operation::Iterate { cursor, target, count } => {
                let data = cursors
                    .get_mut(&cursor)
                    .ok_or_else(|| IdbError::unknown("unknown cursor"))?;
                let store = db
                    .stores
                    .get(&data.source.store())
                    .ok_or_else(deleted_store)?;
                stats.record_cursor_step();
                if !data.iterate(store, values, &target, count)? {
                    return Ok(Outcome::Null);
                }
                if !data.key_only {
                    stats.record_read(1);
                }
                Ok(Outcome::Cursor(cursor))
            }
            Operation::PopulateIndex { store, index } => {
                let store = db.stores.get_mut(&store).ok_or_else(deleted_store)?;
                store.populate_index(index, values)?;
                if let Some(index) = store.index(index) {
                    trace!(index = %index.name, entries = index.len(), "index populated");
                }
                Ok(Outcome::Undefined)
            }
        }
    }
}
