use super::object_store::open_cursor;
use super::{active, ObjectStore, Request};
use crate::cursor::{CursorDirection, CursorSource};
use crate::engine::{Engine, EngineInner, Operation};
use crate::error::{IdbError, IdbResult};
use crate::key_path::KeyPath;
use crate::key_range::{KeyRange, Query};
use crate::request::SourceRef;
use crate::store::IndexData;
use crate::types::{IndexId, StoreId, TransactionId};
use crate::webidl::enforce_range_u32;
use tracing::info;

/// An index as seen by one transaction.
#[derive(Debug, Clone)]
pub struct Index {
    engine: Engine,
    transaction: TransactionId,
    store: StoreId,
    id: IndexId,
    name: String,
    key_path: KeyPath,
    unique: bool,
    multi_entry: bool,
}

impl Index {
    pub(crate) fn attach(engine: Engine, transaction: TransactionId, store: StoreId, data: &IndexData) -> Self {
        Self {
            engine,
            transaction,
            store,
            id: data.id,
            name: data.name.clone(),
            key_path: data.key_path.clone(),
            unique: data.unique,
            multi_entry: data.multi_entry,
        }
    }

    pub(crate) fn resolve(
        engine: Engine,
        inner: &EngineInner,
        transaction: TransactionId,
        store: StoreId,
        id: IndexId,
    ) -> Self {
        match inner.store(transaction, store).and_then(|s| s.index(id)) {
            Some(data) => Self::attach(engine, transaction, store, data),
            None => Self {
                engine,
                transaction,
                store,
                id,
                name: String::new(),
                key_path: KeyPath::String(String::new()),
                unique: false,
                multi_entry: false,
            },
        }
    }

    /// The index id.
    #[must_use]
    pub fn id(&self) -> IndexId {
        self.id
    }

    /// The index name.
    pub fn name(&self) -> String {
        let inner = self.engine.lock();
        self.live(&inner)
            .map_or_else(|_| self.name.clone(), |i| i.name.clone())
    }

    /// The key path index keys are drawn from.
    #[must_use]
    pub fn key_path(&self) -> &KeyPath {
        &self.key_path
    }

    /// Whether index keys must be unique.
    #[must_use]
    pub fn unique(&self) -> bool {
        self.unique
    }

    /// Whether array keys produce one entry per element.
    #[must_use]
    pub fn multi_entry(&self) -> bool {
        self.multi_entry
    }

    /// The store the index belongs to.
    pub fn object_store(&self) -> ObjectStore {
        let inner = self.engine.lock();
        ObjectStore::resolve(self.engine.clone(), &inner, self.transaction, self.store)
    }

    fn live<'a>(&self, inner: &'a EngineInner) -> IdbResult<&'a IndexData> {
        inner
            .store(self.transaction, self.store)
            .and_then(|s| s.index(self.id))
            .ok_or_else(|| IdbError::invalid_state(format!("index {:?} or its store was deleted", self.name)))
    }

    /// Renames the index. Only allowed during an upgrade.
    ///
    /// # Errors
    ///
    /// In order: `InvalidStateError` if the index was deleted or outside an
    /// upgrade, `TransactionInactiveError`, and `ConstraintError` if the
    /// store has another index with the name.
    pub fn set_name(&self, name: &str) -> IdbResult<()> {
        let mut inner = self.engine.lock();
        let current = self.live(&inner)?.name.clone();
        if !inner.transaction(self.transaction)?.is_upgrade() {
            return Err(IdbError::invalid_state("indexes can only be renamed during an upgrade"));
        }
        active(&inner, self.transaction)?;
        if current == name {
            return Ok(());
        }
        let store = inner
            .store_mut(self.transaction, self.store)
            .ok_or_else(|| IdbError::unknown("store vanished"))?;
        if store.index_id(name).is_some() {
            return Err(IdbError::constraint(format!("index {name:?} already exists")));
        }
        if let Some(index) = store.indexes.get_mut(&self.id) {
            index.name = name.to_string();
        }
        info!(from = %current, to = name, "index renamed");
        Ok(())
    }

    fn read(&self, query: Query, null_disallowed: bool, op: impl FnOnce(KeyRange) -> Operation) -> IdbResult<Request> {
        let mut inner = self.engine.lock();
        self.live(&inner)?;
        active(&inner, self.transaction)?;
        let range = query.into_range(null_disallowed)?;
        let id = inner.queue_request(self.transaction, SourceRef::Index(self.store, self.id), op(range))?;
        Ok(Request::new(self.engine.clone(), id))
    }

    fn source(&self) -> CursorSource {
        CursorSource::Index(self.store, self.id)
    }

    /// Value of the first record whose index key matches `query`.
    ///
    /// # Errors
    ///
    /// `InvalidStateError` if the index or its store was deleted,
    /// `TransactionInactiveError`, then `DataError` for an invalid or
    /// unbounded query.
    pub fn get(&self, query: impl Into<Query>) -> IdbResult<Request> {
        let source = self.source();
        self.read(query.into(), true, |range| Operation::Get {
            source,
            range,
            keys: false,
        })
    }

    /// Primary key of the first record whose index key matches `query`.
    ///
    /// # Errors
    ///
    /// As for [`get`](Self::get).
    pub fn get_key(&self, query: impl Into<Query>) -> IdbResult<Request> {
        let source = self.source();
        self.read(query.into(), true, |range| Operation::Get {
            source,
            range,
            keys: true,
        })
    }

    /// Values of up to `count` matching records, in index order.
    ///
    /// # Errors
    ///
    /// `TypeError` if `count` is out of range, then as for
    /// [`get`](Self::get), except that an unbounded query is allowed.
    pub fn get_all(&self, query: impl Into<Query>, count: Option<f64>) -> IdbResult<Request> {
        self.get_all_impl(query.into(), count, false)
    }

    /// Primary keys of up to `count` matching records, in index order.
    ///
    /// # Errors
    ///
    /// As for [`get_all`](Self::get_all).
    pub fn get_all_keys(&self, query: impl Into<Query>, count: Option<f64>) -> IdbResult<Request> {
        self.get_all_impl(query.into(), count, true)
    }

    fn get_all_impl(&self, query: Query, count: Option<f64>, keys: bool) -> IdbResult<Request> {
        let count = count.map(|n| enforce_range_u32(n, "count")).transpose()?;
        let source = self.source();
        self.read(query, false, |range| Operation::GetAll {
            source,
            range,
            count,
            keys,
        })
    }

    /// Number of index entries matching `query`.
    ///
    /// # Errors
    ///
    /// As for [`get_all`](Self::get_all).
    pub fn count(&self, query: impl Into<Query>) -> IdbResult<Request> {
        let source = self.source();
        self.read(query.into(), false, |range| Operation::Count { source, range })
    }

    /// Opens a cursor over the entries matching `query`.
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
            self.source(),
            SourceRef::Index(self.store, self.id),
            range,
            direction,
            key_only,
        )?;
        Ok(Request::new(self.engine.clone(), request))
    }
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.transaction == other.transaction
            && self.engine.same_engine(&other.engine)
    }
}
