use super::{active, ObjectStore, Transaction};
use crate::engine::Engine;
use crate::error::{IdbError, IdbResult};
use crate::store::{ObjectStoreData, ObjectStoreParameters};
use crate::transaction::{TransactionData, TransactionMode, TransactionOptions};
use crate::types::{ConnectionId, StoreId, TransactionId};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// A connection to a database.
#[derive(Debug, Clone)]
pub struct Connection {
    engine: Engine,
    id: ConnectionId,
}

impl Connection {
    pub(crate) fn new(engine: Engine, id: ConnectionId) -> Self {
        Self { engine, id }
    }

    /// The connection id.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The database name.
    pub fn name(&self) -> String {
        let inner = self.engine.lock();
        inner
            .connections
            .get(&self.id)
            .map(|c| c.db_name.clone())
            .unwrap_or_default()
    }

    /// The version this connection sees.
    pub fn version(&self) -> u64 {
        let inner = self.engine.lock();
        inner.connections.get(&self.id).map_or(0, |c| c.version)
    }

    /// Names of the database's object stores, sorted.
    pub fn object_store_names(&self) -> Vec<String> {
        let inner = self.engine.lock();
        inner
            .connections
            .get(&self.id)
            .and_then(|c| inner.databases.get(&c.db_name))
            .map(|db| db.store_names())
            .unwrap_or_default()
    }

    /// Returns true once `close` was called or the engine closed the
    /// connection.
    pub fn is_close_pending(&self) -> bool {
        let inner = self.engine.lock();
        inner.connections.get(&self.id).map_or(true, |c| c.close_pending)
    }

    fn upgrade_transaction(&self) -> IdbResult<TransactionId> {
        let inner = self.engine.lock();
        inner
            .connection(self.id)?
            .upgrade
            .ok_or_else(|| IdbError::invalid_state("no upgrade is running on this connection"))
    }

    /// Creates an object store. Only allowed during an upgrade.
    ///
    /// # Errors
    ///
    /// In order: `InvalidStateError` outside an upgrade,
    /// `TransactionInactiveError`, `SyntaxError` for an invalid key path,
    /// `ConstraintError` if the name is taken, and `InvalidAccessError` for
    /// autoIncrement with an empty or array key path.
    pub fn create_object_store(&self, name: &str, params: ObjectStoreParameters) -> IdbResult<ObjectStore> {
        let txn = self.upgrade_transaction()?;
        let mut inner = self.engine.lock();
        active(&inner, txn)?;
        if let Some(path) = &params.key_path {
            if !path.is_valid() {
                return Err(IdbError::syntax(format!("invalid key path {path}")));
            }
        }
        let exists = inner.database_of(txn).and_then(|db| db.store_id(name)).is_some();
        if exists {
            return Err(IdbError::constraint(format!("object store {name:?} already exists")));
        }
        let bad_generator_path = params
            .key_path
            .as_ref()
            .is_some_and(|path| path.is_array() || path.as_str() == Some(""));
        if params.auto_increment && bad_generator_path {
            return Err(IdbError::invalid_access(
                "autoIncrement requires a non-empty string key path",
            ));
        }

        let id = StoreId(inner.next_id());
        let data = ObjectStoreData::new(id, name.to_string(), params);
        let store = ObjectStore::attach(self.engine.clone(), txn, &data);
        inner
            .database_of_mut(txn)
            .ok_or_else(|| IdbError::unknown("upgrade without a database"))?
            .stores
            .insert(id, data);
        info!(store = name, %id, "object store created");
        Ok(store)
    }

    /// Deletes an object store and its records. Only allowed during an
    /// upgrade.
    ///
    /// # Errors
    ///
    /// `InvalidStateError` outside an upgrade, `TransactionInactiveError`,
    /// then `NotFoundError`.
    pub fn delete_object_store(&self, name: &str) -> IdbResult<()> {
        let txn = self.upgrade_transaction()?;
        let mut inner = self.engine.lock();
        active(&inner, txn)?;
        let db = inner
            .database_of_mut(txn)
            .ok_or_else(|| IdbError::unknown("upgrade without a database"))?;
        let id = db
            .store_id(name)
            .ok_or_else(|| IdbError::not_found(format!("no object store named {name:?}")))?;
        db.stores.remove(&id);
        info!(store = name, %id, "object store deleted");
        Ok(())
    }

    /// Starts a transaction over the named stores.
    ///
    /// # Errors
    ///
    /// In order: `InvalidStateError` if the connection is closing or
    /// upgrading, `NotFoundError` for an unknown store, `TypeError` for the
    /// versionchange mode, and `InvalidAccessError` for an empty scope.
    pub fn transaction<I, S>(&self, stores: I, mode: TransactionMode, options: TransactionOptions) -> IdbResult<Transaction>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut inner = self.engine.lock();
        let conn = inner.connection(self.id)?;
        if conn.close_pending {
            return Err(IdbError::invalid_state("the connection is closing"));
        }
        if conn.upgrade.is_some() {
            return Err(IdbError::invalid_state("an upgrade is running on this connection"));
        }
        let db_name = conn.db_name.clone();

        let db = inner.databases.get(&db_name);
        let mut scope = BTreeSet::new();
        for name in stores {
            let name = name.as_ref();
            let id = db
                .and_then(|db| db.store_id(name))
                .ok_or_else(|| IdbError::not_found(format!("no object store named {name:?}")))?;
            scope.insert(id);
        }
        if mode == TransactionMode::VersionChange {
            return Err(IdbError::type_error("versionchange transactions are created by upgrades"));
        }
        if scope.is_empty() {
            return Err(IdbError::invalid_access("a transaction needs at least one object store"));
        }

        let durability = options.durability.unwrap_or(inner.config.default_durability);
        let id = TransactionId(inner.next_id());
        inner
            .transactions
            .insert(id, TransactionData::new(id, self.id, db_name, mode, durability, scope));
        debug!(transaction = %id, connection = %self.id, %mode, "transaction created");
        Ok(Transaction::new(self.engine.clone(), id))
    }

    /// Closes the connection once its transactions finish. Idempotent.
    pub fn close(&self) {
        let mut inner = self.engine.lock();
        if let Some(conn) = inner.connections.get_mut(&self.id) {
            if !conn.close_pending {
                conn.close_pending = true;
                debug!(connection = %self.id, "close requested");
            }
        }
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.engine.same_engine(&other.engine)
    }
}
