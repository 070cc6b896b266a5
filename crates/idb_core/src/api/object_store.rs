use super::{active, clone_for_storage, writable, Index, Request, Transaction};
use crate::cursor::{CursorData, CursorDirection, CursorSource, Target};
use crate::engine::{Engine, EngineInner, Operation};
use crate::error::{IdbError, IdbResult};
use crate::key_path::{self, Extracted, KeyPath};
use crate::key_range::{KeyRange, Query};
use crate::request::SourceRef;
use crate::store::{IndexData, IndexParameters, ObjectStoreData};
use crate::types::{CursorId, IndexId, RequestId, StoreId, TransactionId};
use crate::webidl::enforce_range_u32;
use idb_codec::{Key, StructuredValue};
use tracing::info;

/// An object store as seen by one transaction.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    engine: Engine,
    transaction: TransactionId,
    id: StoreId,
    /// Name when the handle was made; reported after the store is deleted.
    name: String,
    key_path: Option<KeyPath>,
    auto_increment: bool,
}

impl ObjectStore {
    pub(crate) fn attach(engine: Engine, transaction: TransactionId, data: &ObjectStoreData) -> Self {
        Self {
            engine,
            transaction,
            id: data.id,
            name: data.name.clone(),
            key_path: data.key_path.clone(),
            auto_increment: data.auto_increment(),
        }
    }

    /// A handle for `id`, which may since have been deleted.
    pub(crate) fn resolve(engine: Engine, inner: &EngineInner, transaction: TransactionId, id: StoreId) -> Self {
        match inner.store(transaction, id) {
            Some(data) => Self::attach(engine, transaction, data),
            None => Self {
                engine,
                transaction,
                id,
                name: String::new(),
                key_path: None,
                auto_increment: false,
            },
        }
    }

    /// The store id.
    #[must_use]
    pub fn id(&self) -> StoreId {
        self.id
    }

    /// The store name.
    pub fn name(&self) -> String {
        let inner = self.engine.lock();
        inner
            .store(self.transaction, self.id)
            .map_or_else(|| self.name.clone(), |s| s.name.clone())
    }

    /// The key path, or `None` for out-of-line keys.
    #[must_use]
    pub fn key_path(&self) -> Option<&KeyPath> {
        self.key_path.as_ref()
    }

    /// Whether the store has a key generator.
    #[must_use]
    pub fn auto_increment(&self) -> bool {
        self.auto_increment
    }

    /// Index names, sorted.
    pub fn index_names(&self) -> Vec<String> {
        let inner = self.engine.lock();
        inner
            .store(self.transaction, self.id)
            .map(ObjectStoreData::index_names)
            .unwrap_or_default()
    }

    /// The transaction this handle belongs to.
    #[must_use]
    pub fn transaction(&self) -> Transaction {
        Transaction::new(self.engine.clone(), self.transaction)
    }

    fn live<'a>(&self, inner: &'a EngineInner) -> IdbResult<&'a ObjectStoreData> {
        inner
            .store(self.transaction, self.id)
            .ok_or_else(|| IdbError::invalid_state(format!("object store {:?} was deleted", self.name)))
    }

    /// Renames the store. Only allowed during an upgrade.
    ///
    /// # Errors
    ///
    /// In order: `InvalidStateError` if the store was deleted or outside an
    /// upgrade, `TransactionInactiveError`, and `ConstraintError` if another
    /// store has the name.
    pub fn set_name(&self, name: &str) -> IdbResult<()> {
        let mut inner = self.engine.lock();
        let current = self.live(&inner)?.name.clone();
        if !inner.transaction(self.transaction)?.is_upgrade() {
            return Err(IdbError::invalid_state("stores can only be renamed during an upgrade"));
        }
        active(&inner, self.transaction)?;
        if current == name {
            return Ok(());
        }
        let db = inner
            .database_of_mut(self.transaction)
            .ok_or_else(|| IdbError::unknown("upgrade without a database"))?;
        if db.store_id(name).is_some() {
            return Err(IdbError::constraint(format!("object store {name:?} already exists")));
        }
        if let Some(store) = db.stores.get_mut(&self.id) {
            store.name = name.to_string();
        }
        info!(from = %current, to = name, "object store renamed");
        Ok(())
    }

    /// Stores `value`, replacing any record with the same key.
    ///
    /// `key` must be `None` for stores with a key path.
    ///
    /// # Errors
    ///
    /// In order: `InvalidStateError` if the store was deleted,
    /// `TransactionInactiveError`, `ReadOnlyError`, `DataError` for a
    /// missing, superfluous or invalid key, `DataCloneError` if the value
    /// cannot be cloned, and `DataError` if the key path does not yield a
    /// usable key.
    pub fn put(&self, value: &StructuredValue, key: Option<Key>) -> IdbResult<Request> {
        self.store_record(value, key, false)
    }

    /// Like [`put`](Self::put), but the request fails with
    /// `ConstraintError` if the key exists.
    ///
    /// # Errors
    ///
    /// As for [`put`](Self::put).
    pub fn add(&self, value: &StructuredValue, key: Option<Key>) -> IdbResult<Request> {
        self.store_record(value, key, true)
    }

    fn store_record(&self, value: &StructuredValue, key: Option<Key>, no_overwrite: bool) -> IdbResult<Request> {
        let inner = self.engine.lock();
        self.live(&inner)?;
        writable(active(&inner, self.transaction)?)?;
        if self.key_path.is_some() && key.is_some() {
            return Err(IdbError::data("a store with a key path takes no explicit key"));
        }
        if self.key_path.is_none() && !self.auto_increment && key.is_none() {
            return Err(IdbError::data("a store without a key path or generator needs a key"));
        }
        let key = key.map(Key::validate).transpose()?;

        let (mut inner, cloned) = clone_for_storage(&self.engine, inner, self.transaction, value);
        let cloned = cloned?;
        let key = match &self.key_path {
            None => key,
            Some(path) => self.inline_key(path, &cloned)?,
        };

        let id = inner.queue_request(
            self.transaction,
            SourceRef::Store(self.id),
            Operation::Put {
                store: self.id,
                value: cloned,
                key,
                no_overwrite,
            },
        )?;
        Ok(Request::new(self.engine.clone(), id))
    }

    /// Key for an in-line store, or `None` when the generator will supply
    /// and inject it.
    fn inline_key(&self, path: &KeyPath, value: &StructuredValue) -> IdbResult<Option<Key>> {
        match path.extract(value) {
            Extracted::Key(key) => Ok(Some(key)),
            Extracted::Invalid => Err(IdbError::data(format!("key path {path} yielded an invalid key"))),
            Extracted::Failure => {
                let injectable = self.auto_increment
                    && path
                        .as_str()
                        .is_some_and(|p| key_path::can_inject(value, p));
                if injectable {
                    Ok(None)
                } else {
                    Err(IdbError::data(format!("key path {path} yielded no key")))
                }
            }
        }
    }

    fn read(&self, query: Query, null_disallowed: bool, op: impl FnOnce(KeyRange) -> Operation) -> IdbResult<Request> {
        let mut inner = self.engine.lock();
        self.live(&inner)?;
        active(&inner, self.transaction)?;
        let range = query.into_range(null_disallowed)?;
        let id = inner.queue_request(self.transaction, SourceRef::Store(self.id), op(range))?;
        Ok(Request::new(self.engine.clone(), id))
    }

    /// Value of the first record matching `query`, or
    /// [`Outcome::Undefined`](crate::Outcome::Undefined).
    ///
    /// # Errors
    ///
    /// `InvalidStateError` if the store was deleted,
    /// `TransactionInactiveError`, then `DataError` for an invalid or
    /// unbounded query.
    pub fn get(&self, query: impl Into<Query>) -> IdbResult<Request> {
        let source = CursorSource::Store(self.id);
        self.read(query.into(), true, |range| Operation::Get {
            source,
            range,
            keys: false,
        })
    }

    /// Key of the first record matching `query`.
    ///
    /// # Errors
    ///
    /// As for [`get`](Self::get).
    pub fn get_key(&self, query: impl Into<Query>) -> IdbResult<Request> {
        let source = CursorSource::Store(self.id);
        self.read(query.into(), true, |range| Operation::Get {
            source,
            range,
            keys: true,
        })
    }

    /// Values of up to `count` records matching `query`; all of them when
    /// `count` is `None` or 0.
    ///
    /// # Errors
    ///
    /// `TypeError` if `count` is out of range, then as for
    /// [`get`](Self::get), except that an unbounded query is allowed.
    pub fn get_all(&self, query: impl Into<Query>, count: Option<f64>) -> IdbResult<Request> {
        self.get_all_impl(query.into(), count, false)
    }

    /// Keys of up to `count` records matching `query`.
    ///
    /// # Errors
    ///
    /// As for [`get_all`](Self::get_all).
    pub fn get_all_keys(&self, query: impl Into<Query>, count: Option<f64>) -> IdbResult<Request> {
        self.get_all_impl(query.into(), count, true)
    }

    fn get_all_impl(&self, query: Query, count: Option<f64>, keys: bool) -> IdbResult<Request> {
        let count = count.map(|n| enforce_range_u32(n, "count")).transpose()?;
        let source = CursorSource::Store(self.id);
        self.read(query, false, |range| Operation::GetAll {
            source,
            range,
            count,
            keys,
        })
    }

    /// Number of records matching `query`.
    ///
    /// # Errors
    ///
    /// As for [`get_all`](Self::get_all).
    pub fn count(&self, query: impl Into<Query>) -> IdbResult<Request> {
        let source = CursorSource::Store(self.id);
        self.read(query.into(), false, |range| Operation::Count { source, range })
    }

    /// Deletes the records matching `query`.
    ///
    /// # Errors
    ///
    /// `InvalidStateError` if the store was deleted,
    /// `TransactionInactiveError`, `ReadOnlyError`, then `DataError` for an
    /// invalid or unbounded query.
    pub fn delete(&self, query: impl Into<Query>) -> IdbResult<Request> {
        let mut inner = self.engine.lock();
        self.live(&inner)?;
        writable(active(&inner, self.transaction)?)?;
        let range = query.into().into_range(true)?;
        let id = inner.queue_request(
            self.transaction,
            SourceRef::Store(self.id),
            Operation::Delete { store: self.id, range },
        )?;
        Ok(Request::new(self.engine.clone(), id))
    }

    /// Deletes every record.
    ///
    /// # Errors
    ///
    /// `InvalidStateError` if the store was deleted,
    /// `TransactionInactiveError`, then `ReadOnlyError`.
    pub fn clear(&self) -> IdbResult<Request> {
        let mut inner = self.engine.lock();
        self.live(&inner)?;
        writable(active(&inner, self.transaction)?)?;
        let id = inner.queue_request(
            self.transaction,
            SourceRef::Store(self.id),
            Operation::Clear { store: self.id },
        )?;
        Ok(Request::new(self.engine.clone(), id))
    }

    /// Opens a cursor over the records matching `query`. The request's
    /// result is the cursor, or [`Outcome::Null`](crate::Outcome::Null) if
    /// nothing matches.
    ///
    /// # Errors
    ///
    /// As for [`get_all`](Self::get_all).
    pub fn open_cursor(&self, query: impl Into<Query>, direction: CursorDirection) -> IdbResult<Request> {
        self.open(query.into(), direction, false)
    }

    /// Like [`open_cursor`](Self::open_cursor), without loading values.
    ///
    /// # Errors
    ///
    /// As for [`get_all`](Self::get_all).
    pub fn open_key_cursor(&self, query: impl Into<Query>, direction: CursorDirection) -> IdbResult<Request> {
        self.open(query.into(), direction, true)
    }

    fn open(&self, query: Query, direction: CursorDirection, key_only: bool) -> IdbResult<Request> {
        let mut inner = self.engine.lock();
        self.live(&inner)?;
        active(&inner, self.transaction)?;
        let range = query.into_range(false)?;
        let request = open_cursor(
            &mut inner,
            self.transaction,
            CursorSource::Store(self.id),
            SourceRef::Store(self.id),
            range,
            direction,
            key_only,
        )?;
        Ok(Request::new(self.engine.clone(), request))
    }

    /// Creates an index and fills it from the existing records. Only
    /// allowed during an upgrade.
    ///
    /// If existing records violate a unique index, the upgrade aborts with
    /// `ConstraintError` once the index is filled.
    ///
    /// # Errors
    ///
    /// In order: `InvalidStateError` outside an upgrade or if the store was
    /// deleted, `TransactionInactiveError`, `ConstraintError` if the name is
    /// taken, `SyntaxError` for an invalid key path, and
    /// `InvalidAccessError` for a multiEntry array key path.
    pub fn create_index(
        &self,
        name: &str,
        key_path: impl Into<KeyPath>,
        params: IndexParameters,
    ) -> IdbResult<Index> {
        let key_path = key_path.into();
        let mut inner = self.engine.lock();
        if !inner.transaction(self.transaction)?.is_upgrade() {
            return Err(IdbError::invalid_state("indexes can only be created during an upgrade"));
        }
        let store = self.live(&inner)?;
        let taken = store.index_id(name).is_some();
        active(&inner, self.transaction)?;
        if taken {
            return Err(IdbError::constraint(format!("index {name:?} already exists")));
        }
        if !key_path.is_valid() {
            return Err(IdbError::syntax(format!("invalid key path {key_path}")));
        }
        if params.multi_entry && key_path.is_array() {
            return Err(IdbError::invalid_access("a multiEntry index cannot have an array key path"));
        }

        let id = IndexId(inner.next_id());
        let data = IndexData::new(id, name.to_string(), key_path, params);
        let index = Index::attach(self.engine.clone(), self.transaction, self.id, &data);
        inner
            .store_mut(self.transaction, self.id)
            .ok_or_else(|| IdbError::unknown("store vanished"))?
            .indexes
            .insert(id, data);
        inner.queue_internal(self.transaction, Operation::PopulateIndex { store: self.id, index: id })?;
        info!(store = %self.name, index = name, %id, "index created");
        Ok(index)
    }

    /// Deletes an index. Only allowed during an upgrade.
    ///
    /// # Errors
    ///
    /// `InvalidStateError` outside an upgrade or if the store was deleted,
    /// `TransactionInactiveError`, then `NotFoundError`.
    pub fn delete_index(&self, name: &str) -> IdbResult<()> {
        let mut inner = self.engine.lock();
        if !inner.transaction(self.transaction)?.is_upgrade() {
            return Err(IdbError::invalid_state("indexes can only be deleted during an upgrade"));
        }
        let found = self.live(&inner)?.index_id(name);
        active(&inner, self.transaction)?;
        let id = found.ok_or_else(|| IdbError::not_found(format!("no index named {name:?}")))?;
        if let Some(store) = inner.store_mut(self.transaction, self.id) {
            store.indexes.remove(&id);
        }
        info!(store = %self.name, index = name, "index deleted");
        Ok(())
    }

    /// Returns an index of this store.
    ///
    /// # Errors
    ///
    /// `InvalidStateError` if the store was deleted or the transaction
    /// finished, then `NotFoundError`.
    pub fn index(&self, name: &str) -> IdbResult<Index> {
        let inner = self.engine.lock();
        let store = self.live(&inner)?;
        if inner.transaction(self.transaction)?.is_finished() {
            return Err(IdbError::invalid_state("the transaction has finished"));
        }
        store
            .index_id(name)
            .and_then(|id| store.index(id))
            .map(|data| Index::attach(self.engine.clone(), self.transaction, self.id, data))
            .ok_or_else(|| IdbError::not_found(format!("no index named {name:?}")))
    }
}

impl PartialEq for ObjectStore {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.transaction == other.transaction
            && self.engine.same_engine(&other.engine)
    }
}

/// Creates a cursor and queues its first iteration.
pub(crate) fn open_cursor(
    inner: &mut EngineInner,
    transaction: TransactionId,
    source: CursorSource,
    request_source: SourceRef,
    range: KeyRange,
    direction: CursorDirection,
    key_only: bool,
) -> IdbResult<RequestId> {
    let cursor = CursorId(inner.next_id());
    let request = inner.queue_request(
        transaction,
        request_source,
        Operation::Iterate {
            cursor,
            target: Target::default(),
            count: 1,
        },
    )?;
    inner.cursors.insert(
        cursor,
        CursorData::new(transaction, source, direction, range, key_only, request),
    );
    Ok(request)
}
