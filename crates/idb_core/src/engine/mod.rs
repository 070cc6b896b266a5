//! The engine: databases, connections, transactions and the event loop.
//!
//! All state lives in one [`EngineInner`] behind a mutex. Client handles
//! lock it for each call, check preconditions, and either fail
//! synchronously or queue work. Nothing runs until the client asks for the
//! next event: [`Engine::next_event`] first finishes the previous dispatch,
//! then runs queued work until exactly one event is ready.

mod dispatch;
mod execute;
mod factory;

pub(crate) use execute::Operation;
pub(crate) use factory::{FactoryKind, FactoryOp};

use crate::api::{Connection, Request, Transaction};
use crate::config::Config;
use crate::cursor::CursorData;
use crate::database::{ConnectionData, DatabaseData};
use crate::error::{IdbError, IdbResult};
use crate::event::{Event, PendingEvent};
use crate::request::{RequestData, SourceRef};
use crate::stats::{EngineStats, StatsSnapshot};
use crate::store::{ObjectStoreData, ValueStore};
use crate::transaction::{QueuedOperation, TransactionData};
use crate::types::{ConnectionId, CursorId, IdAllocator, RequestId, StoreId, TransactionId};
use idb_codec::{compare_values, Heap, Key, Value};
use idb_storage::{InMemoryBackend, StorageBackend};
use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// An IndexedDB-style database engine.
///
/// `Engine` is a cheap handle; clones share the same state.
///
/// # Example
///
/// ```rust
/// use idb_core::{Engine, Event, ObjectStoreParameters, Outcome, StructuredValue, TransactionMode, TransactionOptions, Key};
///
/// let engine = Engine::new();
/// let open = engine.open("library", Some(1)).unwrap();
/// while let Some(event) = engine.next_event() {
///     if let Event::UpgradeNeeded { connection, .. } = event {
///         connection
///             .create_object_store("books", ObjectStoreParameters::new())
///             .unwrap();
///     }
/// }
/// let db = open.connection().unwrap();
///
/// let txn = db
///     .transaction(["books"], TransactionMode::ReadWrite, TransactionOptions::new())
///     .unwrap();
/// let books = txn.object_store("books").unwrap();
/// books.put(&StructuredValue::from("Dune"), Some(Key::from(1))).unwrap();
/// let get = books.get(Key::from(1)).unwrap();
/// engine.run_until_idle();
///
/// assert_eq!(get.result().unwrap(), Outcome::Value(StructuredValue::from("Dune")));
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Mutex<EngineInner>>,
    stats: Arc<EngineStats>,
}

impl Engine {
    /// Creates an engine with default configuration and an in-memory value
    /// backend.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an engine with an in-memory value backend.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self::with_backend(config, Box::new(InMemoryBackend::new()))
    }

    /// Creates an engine that writes large values to `backend`.
    #[must_use]
    pub fn with_backend(config: Config, backend: Box<dyn StorageBackend>) -> Self {
        let stats = Arc::new(EngineStats::new());
        let values = ValueStore::new(backend, config.large_value_threshold, Arc::clone(&stats));
        let inner = EngineInner {
            config,
            stats: Arc::clone(&stats),
            values,
            ids: IdAllocator::new(),
            databases: BTreeMap::new(),
            connections: BTreeMap::new(),
            transactions: BTreeMap::new(),
            requests: HashMap::new(),
            cursors: HashMap::new(),
            factory: BTreeMap::new(),
            events: VecDeque::new(),
            dispatching: None,
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
            stats,
        }
    }

    /// Requests a connection to `name`, creating the database if needed.
    ///
    /// With `version` of `None` the current version is used (1 for a new
    /// database). A higher version than the current one upgrades the
    /// database through an [`Event::UpgradeNeeded`].
    ///
    /// # Errors
    ///
    /// `TypeError` if `version` is `Some(0)`.
    pub fn open(&self, name: &str, version: Option<u64>) -> IdbResult<Request> {
        if version == Some(0) {
            return Err(IdbError::type_error("version must be at least 1"));
        }
        let mut inner = self.lock();
        let id = inner.enqueue_factory(name, FactoryKind::Open { version });
        debug!(db = name, ?version, request = %id, "open requested");
        Ok(Request::new(self.clone(), id))
    }

    /// Requests deletion of `name`. Succeeds even if it does not exist.
    pub fn delete_database(&self, name: &str) -> Request {
        let mut inner = self.lock();
        let id = inner.enqueue_factory(name, FactoryKind::Delete);
        debug!(db = name, request = %id, "delete requested");
        Request::new(self.clone(), id)
    }

    /// Names and versions of existing databases, sorted by name.
    pub fn databases(&self) -> Vec<(String, u64)> {
        self.lock()
            .databases
            .values()
            .filter(|db| db.version > 0)
            .map(|db| (db.name.clone(), db.version))
            .collect()
    }

    /// Compares two keys as `-1`, `0` or `1`.
    ///
    /// # Errors
    ///
    /// `DataError` if either key is invalid.
    pub fn cmp(&self, a: &Key, b: &Key) -> IdbResult<i8> {
        if !a.is_valid() || !b.is_valid() {
            return Err(IdbError::data("cannot compare invalid keys"));
        }
        Ok(a.compare(b))
    }

    /// Converts two values to keys and compares them.
    ///
    /// # Errors
    ///
    /// `DataError` if either value is not a valid key.
    pub fn cmp_values(&self, heap: &Heap, a: &Value, b: &Value) -> IdbResult<i8> {
        Ok(compare_values(heap, a, b)?)
    }

    /// Finishes the current dispatch and returns the next event, or `None`
    /// once nothing can make progress.
    ///
    /// Finishing a dispatch applies the default action of an unprevented
    /// error (aborting its transaction) and deactivates every active
    /// transaction.
    pub fn next_event(&self) -> Option<Event> {
        let mut inner = self.lock();
        inner.end_dispatch();
        let pending = inner.pump()?;
        Some(self.materialize(&inner, pending))
    }

    /// Dispatches events until idle, returning them in order.
    pub fn run_until_idle(&self) -> Vec<Event> {
        std::iter::from_fn(|| self.next_event()).collect()
    }

    /// Returns a snapshot of the engine statistics.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns the configuration.
    pub fn config(&self) -> Config {
        self.lock().config.clone()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, EngineInner> {
        self.inner.lock()
    }

    pub(crate) fn same_engine(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn materialize(&self, inner: &EngineInner, pending: PendingEvent) -> Event {
        let request = |id| Request::new(self.clone(), id);
        let transaction = |id| Transaction::new(self.clone(), id);
        match pending {
            PendingEvent::Request(id) => match inner.requests.get(&id).and_then(RequestData::error) {
                Some(error) => Event::Error {
                    request: request(id),
                    error: error.clone(),
                },
                None => Event::Success {
                    request: request(id),
                },
            },
            PendingEvent::UpgradeNeeded {
                request: id,
                connection,
                transaction: txn,
                old_version,
                new_version,
            } => Event::UpgradeNeeded {
                request: request(id),
                connection: Connection::new(self.clone(), connection),
                transaction: transaction(txn),
                old_version,
                new_version,
            },
            PendingEvent::Blocked {
                request: id,
                old_version,
                new_version,
            } => Event::Blocked {
                request: request(id),
                old_version,
                new_version,
            },
            PendingEvent::VersionChange {
                connection,
                old_version,
                new_version,
            } => Event::VersionChange {
                connection: Connection::new(self.clone(), connection),
                old_version,
                new_version,
            },
            PendingEvent::Complete(id) => Event::Complete {
                transaction: transaction(id),
            },
            PendingEvent::Abort(id) => Event::Abort {
                transaction: transaction(id),
                error: inner.transactions.get(&id).and_then(|t| t.error.clone()),
            },
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

/// Engine state.
#[derive(Debug)]
pub(crate) struct EngineInner {
    pub config: Config,
    pub stats: Arc<EngineStats>,
    pub values: ValueStore,
    ids: IdAllocator,
    pub databases: BTreeMap<String, DatabaseData>,
    pub connections: BTreeMap<ConnectionId, ConnectionData>,
    /// Every transaction ever created, in creation order.
    pub transactions: BTreeMap<TransactionId, TransactionData>,
    pub requests: HashMap<RequestId, RequestData>,
    pub cursors: HashMap<CursorId, CursorData>,
    /// Open and delete requests, FIFO per database name.
    pub factory: BTreeMap<String, VecDeque<FactoryOp>>,
    pub events: VecDeque<PendingEvent>,
    /// The event handed out by the last `next_event` call.
    pub dispatching: Option<PendingEvent>,
}

impl EngineInner {
    pub(crate) fn next_id(&mut self) -> u64 {
        self.ids.next_raw()
    }

    pub(crate) fn transaction(&self, id: TransactionId) -> IdbResult<&TransactionData> {
        self.transactions
            .get(&id)
            .ok_or_else(|| IdbError::unknown(format!("unknown transaction {id}")))
    }

    pub(crate) fn transaction_mut(&mut self, id: TransactionId) -> IdbResult<&mut TransactionData> {
        self.transactions
            .get_mut(&id)
            .ok_or_else(|| IdbError::unknown(format!("unknown transaction {id}")))
    }

    pub(crate) fn connection(&self, id: ConnectionId) -> IdbResult<&ConnectionData> {
        self.connections
            .get(&id)
            .ok_or_else(|| IdbError::unknown(format!("unknown connection {id}")))
    }

    /// The database a transaction runs against.
    pub(crate) fn database_of(&self, txn: TransactionId) -> Option<&DatabaseData> {
        let name = &self.transactions.get(&txn)?.db_name;
        self.databases.get(name)
    }

    pub(crate) fn database_of_mut(&mut self, txn: TransactionId) -> Option<&mut DatabaseData> {
        let name = &self.transactions.get(&txn)?.db_name;
        self.databases.get_mut(name)
    }

    /// The store as the transaction sees it, or `None` if it was deleted.
    pub(crate) fn store(&self, txn: TransactionId, store: StoreId) -> Option<&ObjectStoreData> {
        self.database_of(txn)?.stores.get(&store)
    }

    pub(crate) fn store_mut(&mut self, txn: TransactionId, store: StoreId) -> Option<&mut ObjectStoreData> {
        self.database_of_mut(txn)?.stores.get_mut(&store)
    }

    /// Creates a pending request and appends its operation to the
    /// transaction's queue.
    pub(crate) fn queue_request(
        &mut self,
        txn: TransactionId,
        source: SourceRef,
        op: Operation,
    ) -> IdbResult<RequestId> {
        let id = RequestId(self.next_id());
        self.transaction_mut(txn)?.queue.push_back(QueuedOperation {
            request: Some(id),
            op,
        });
        self.requests.insert(id, RequestData::new(Some(txn), source));
        Ok(id)
    }

    /// Appends an operation with no request of its own.
    pub(crate) fn queue_internal(&mut self, txn: TransactionId, op: Operation) -> IdbResult<()> {
        self.transaction_mut(txn)?.queue.push_back(QueuedOperation { request: None, op });
        Ok(())
    }

    /// Re-queues a cursor's request for another iteration.
    pub(crate) fn requeue_cursor(&mut self, cursor: CursorId, op: Operation) -> IdbResult<()> {
        let cursor = self
            .cursors
            .get_mut(&cursor)
            .ok_or_else(|| IdbError::unknown("unknown cursor"))?;
        cursor.got_value = false;
        let (txn, request) = (cursor.transaction, cursor.request);
        if let Some(data) = self.requests.get_mut(&request) {
            data.reopen();
        }
        self.transaction_mut(txn)?.queue.push_back(QueuedOperation {
            request: Some(request),
            op,
        });
        Ok(())
    }

    fn enqueue_factory(&mut self, name: &str, kind: FactoryKind) -> RequestId {
        let id = RequestId(self.next_id());
        self.requests.insert(id, RequestData::new(None, SourceRef::Factory));
        self.factory
            .entry(name.to_string())
            .or_default()
            .push_back(FactoryOp::new(id, kind));
        id
    }
}
