use super::{active, clone_for_storage, writable, Index, ObjectStore, Request, Source, Transaction};
use crate::cursor::{CursorData, CursorDirection, CursorSource, Target};
use crate::engine::{Engine, EngineInner, Operation};
use crate::error::{IdbError, IdbResult};
use crate::key_path::Extracted;
use crate::key_range::KeyRange;
use crate::request::SourceRef;
use crate::types::{CursorId, RequestId, StoreId, TransactionId};
use crate::webidl::enforce_range_u32;
use idb_codec::{Key, StructuredValue};

/// A cursor over a store or index.
///
/// A cursor is returned as the result of its open request. Each
/// `continue_`, `continue_primary_key` or `advance` call re-runs that same
/// request; when the range runs out its result becomes
/// [`Outcome::Null`](crate::Outcome::Null).
#[derive(Debug, Clone)]
pub struct Cursor {
    engine: Engine,
    id: CursorId,
}

impl Cursor {
    pub(crate) fn new(engine: Engine, id: CursorId) -> Self {
        Self { engine, id }
    }

    fn read<T>(&self, f: impl FnOnce(&CursorData) -> T) -> Option<T> {
        let inner = self.engine.lock();
        inner.cursors.get(&self.id).map(f)
    }

    /// The cursor id.
    #[must_use]
    pub fn id(&self) -> CursorId {
        self.id
    }

    /// The iteration direction.
    pub fn direction(&self) -> CursorDirection {
        self.read(|c| c.direction).unwrap_or_default()
    }

    /// Key at the current position: the index key for index cursors.
    pub fn key(&self) -> Option<Key> {
        self.read(|c| c.key.clone()).flatten()
    }

    /// Primary key of the current record.
    pub fn primary_key(&self) -> Option<Key> {
        self.read(|c| c.primary_key.clone()).flatten()
    }

    /// Value of the current record. Always `None` for key cursors.
    pub fn value(&self) -> Option<StructuredValue> {
        self.read(|c| c.value.as_deref().cloned()).flatten()
    }

    /// The request that delivers this cursor's results.
    pub fn request(&self) -> Request {
        let request = self.read(|c| c.request).unwrap_or(RequestId(0));
        Request::new(self.engine.clone(), request)
    }

    /// The store or index being iterated.
    pub fn source(&self) -> Option<Source> {
        let inner = self.engine.lock();
        let cursor = inner.cursors.get(&self.id)?;
        let engine = self.engine.clone();
        Some(match cursor.source {
            CursorSource::Store(store) => {
                Source::ObjectStore(ObjectStore::resolve(engine, &inner, cursor.transaction, store))
            }
            CursorSource::Index(store, index) => {
                Source::Index(Index::resolve(engine, &inner, cursor.transaction, store, index))
            }
        })
    }

    /// The transaction the cursor was opened in.
    pub fn transaction(&self) -> Option<Transaction> {
        self.read(|c| Transaction::new(self.engine.clone(), c.transaction))
    }

    fn data<'a>(&self, inner: &'a EngineInner) -> IdbResult<&'a CursorData> {
        inner
            .cursors
            .get(&self.id)
            .ok_or_else(|| IdbError::unknown(format!("unknown cursor {}", self.id)))
    }

    /// Fails with `InvalidStateError` if the source was deleted.
    fn check_source(inner: &EngineInner, cursor: &CursorData) -> IdbResult<()> {
        let store = inner
            .store(cursor.transaction, cursor.source.store())
            .ok_or_else(|| IdbError::invalid_state("the cursor's object store was deleted"))?;
        if let CursorSource::Index(_, index) = cursor.source {
            store
                .index(index)
                .ok_or_else(|| IdbError::invalid_state("the cursor's index was deleted"))?;
        }
        Ok(())
    }

    fn check_got_value(cursor: &CursorData) -> IdbResult<()> {
        if cursor.got_value {
            Ok(())
        } else {
            Err(IdbError::invalid_state("the cursor is iterating or past its end"))
        }
    }

    /// Moves to the next record, or to the first at or beyond `key` in the
    /// cursor's direction.
    ///
    /// # Errors
    ///
    /// In order: `TransactionInactiveError`, `InvalidStateError` if the
    /// source was deleted or the cursor has no value, `DataError` for an
    /// invalid key or one not beyond the current position.
    pub fn continue_(&self, key: Option<Key>) -> IdbResult<()> {
        let mut inner = self.engine.lock();
        let cursor = self.data(&inner)?;
        active(&inner, cursor.transaction)?;
        Self::check_source(&inner, cursor)?;
        Self::check_got_value(cursor)?;
        if let Some(key) = &key {
            if !key.is_valid() {
                return Err(IdbError::data(format!("invalid key {key}")));
            }
            if let Some(current) = &cursor.key {
                let not_beyond = if cursor.direction.is_forward() {
                    key <= current
                } else {
                    key >= current
                };
                if not_beyond {
                    return Err(IdbError::data(format!(
                        "key {key} is not beyond the cursor position {current}"
                    )));
                }
            }
        }
        inner.requeue_cursor(
            self.id,
            Operation::Iterate {
                cursor: self.id,
                target: Target { key, primary_key: None },
                count: 1,
            },
        )
    }

    /// Moves an index cursor to the first entry at or beyond
    /// `(key, primary_key)`.
    ///
    /// # Errors
    ///
    /// In order: `TransactionInactiveError`, `InvalidStateError` if the
    /// source was deleted, `InvalidAccessError` for store cursors and
    /// unique directions, `InvalidStateError` if the cursor has no value,
    /// and `DataError` for invalid keys or a target not beyond the current
    /// position.
    pub fn continue_primary_key(&self, key: Key, primary_key: Key) -> IdbResult<()> {
        let mut inner = self.engine.lock();
        let cursor = self.data(&inner)?;
        active(&inner, cursor.transaction)?;
        Self::check_source(&inner, cursor)?;
        if matches!(cursor.source, CursorSource::Store(_)) {
            return Err(IdbError::invalid_access("continuePrimaryKey needs an index cursor"));
        }
        if cursor.direction.is_unique() {
            return Err(IdbError::invalid_access(format!(
                "continuePrimaryKey is not allowed in {} cursors",
                cursor.direction
            )));
        }
        Self::check_got_value(cursor)?;
        if !key.is_valid() {
            return Err(IdbError::data(format!("invalid key {key}")));
        }
        if !primary_key.is_valid() {
            return Err(IdbError::data(format!("invalid primary key {primary_key}")));
        }
        if let (Some(current), Some(current_primary)) = (&cursor.key, &cursor.primary_key) {
            let target = (&key, &primary_key);
            let position = (current, current_primary);
            let not_beyond = if cursor.direction.is_forward() {
                target <= position
            } else {
                target >= position
            };
            if not_beyond {
                return Err(IdbError::data(format!(
                    "({key}, {primary_key}) is not beyond the cursor position"
                )));
            }
        }
        inner.requeue_cursor(
            self.id,
            Operation::Iterate {
                cursor: self.id,
                target: Target {
                    key: Some(key),
                    primary_key: Some(primary_key),
                },
                count: 1,
            },
        )
    }

    /// Skips `count` records.
    ///
    /// # Errors
    ///
    /// `TypeError` for a zero or out-of-range count, then
    /// `TransactionInactiveError`, then `InvalidStateError` if the source
    /// was deleted or the cursor has no value.
    pub fn advance(&self, count: f64) -> IdbResult<()> {
        let count = enforce_range_u32(count, "count")?;
        if count == 0 {
            return Err(IdbError::type_error("count must be positive"));
        }
        let mut inner = self.engine.lock();
        let cursor = self.data(&inner)?;
        active(&inner, cursor.transaction)?;
        Self::check_source(&inner, cursor)?;
        Self::check_got_value(cursor)?;
        inner.requeue_cursor(
            self.id,
            Operation::Iterate {
                cursor: self.id,
                target: Target::default(),
                count,
            },
        )
    }

    /// Replaces the current record's value.
    ///
    /// # Errors
    ///
    /// In order: `TransactionInactiveError`, `ReadOnlyError`,
    /// `InvalidStateError` if the source was deleted, the cursor has no
    /// value or is a key cursor, `DataCloneError`, and `DataError` if an
    /// in-line key in `value` differs from the current primary key.
    pub fn update(&self, value: &StructuredValue) -> IdbResult<Request> {
        let inner = self.engine.lock();
        let (txn, store, key) = self.writable_position(&inner)?;
        let key_path = inner
            .store(txn, store)
            .and_then(|s| s.key_path.clone());

        let (mut inner, cloned) = clone_for_storage(&self.engine, inner, txn, value);
        let cloned = cloned?;
        if let Some(path) = key_path {
            let matches = matches!(path.extract(&cloned), Extracted::Key(k) if k == key);
            if !matches {
                return Err(IdbError::data(format!(
                    "the value's key at {path} does not match the cursor's primary key {key}"
                )));
            }
        }
        let request = inner.queue_request(
            txn,
            SourceRef::Cursor(self.id),
            Operation::Put {
                store,
                value: cloned,
                key: Some(key),
                no_overwrite: false,
            },
        )?;
        Ok(Request::new(self.engine.clone(), request))
    }

    /// Deletes the current record.
    ///
    /// # Errors
    ///
    /// In order: `TransactionInactiveError`, `ReadOnlyError`, then
    /// `InvalidStateError` if the source was deleted, the cursor has no
    /// value or is a key cursor.
    pub fn delete(&self) -> IdbResult<Request> {
        let mut inner = self.engine.lock();
        let (txn, store, key) = self.writable_position(&inner)?;
        let range = KeyRange::only(key)?;
        let request = inner.queue_request(txn, SourceRef::Cursor(self.id), Operation::Delete { store, range })?;
        Ok(Request::new(self.engine.clone(), request))
    }

    /// Checks shared by `update` and `delete`; returns the transaction,
    /// store and primary key to act on.
    fn writable_position(&self, inner: &EngineInner) -> IdbResult<(TransactionId, StoreId, Key)> {
        let cursor = self.data(inner)?;
        writable(active(inner, cursor.transaction)?)?;
        Self::check_source(inner, cursor)?;
        Self::check_got_value(cursor)?;
        if cursor.key_only {
            return Err(IdbError::invalid_state("key cursors cannot modify records"));
        }
        let key = cursor
            .effective_key()
            .cloned()
            .ok_or_else(|| IdbError::invalid_state("the cursor has no current record"))?;
        Ok((cursor.transaction, cursor.source.store(), key))
    }
}

impl PartialEq for Cursor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.engine.same_engine(&other.engine)
    }
}
