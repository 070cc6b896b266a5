use super::{Connection, ObjectStore};
use crate::engine::Engine;
use crate::error::{IdbError, IdbResult};
use crate::transaction::{Durability, TransactionMode, TransactionState};
use crate::types::TransactionId;
use tracing::debug;

/// A transaction handle.
#[derive(Debug, Clone)]
pub struct Transaction {
    engine: Engine,
    id: TransactionId,
}

impl Transaction {
    pub(crate) fn new(engine: Engine, id: TransactionId) -> Self {
        Self { engine, id }
    }

    /// The transaction id.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// The mode.
    pub fn mode(&self) -> TransactionMode {
        let inner = self.engine.lock();
        inner
            .transactions
            .get(&self.id)
            .map_or(TransactionMode::ReadOnly, |t| t.mode)
    }

    /// The current state.
    pub fn state(&self) -> TransactionState {
        let inner = self.engine.lock();
        inner
            .transactions
            .get(&self.id)
            .map_or(TransactionState::Finished, |t| t.state)
    }

    /// The durability hint in effect.
    pub fn durability(&self) -> Durability {
        let inner = self.engine.lock();
        inner
            .transactions
            .get(&self.id)
            .map_or(Durability::Default, |t| t.durability)
    }

    /// The error that aborted the transaction, if any.
    pub fn error(&self) -> Option<IdbError> {
        let inner = self.engine.lock();
        inner.transactions.get(&self.id).and_then(|t| t.error.clone())
    }

    /// Returns true if the transaction was aborted.
    pub fn is_aborted(&self) -> bool {
        let inner = self.engine.lock();
        inner.transactions.get(&self.id).is_some_and(|t| t.aborted)
    }

    /// The connection the transaction belongs to.
    ///
    /// # Errors
    ///
    /// `UnknownError` if the transaction handle is stale.
    pub fn connection(&self) -> IdbResult<Connection> {
        let inner = self.engine.lock();
        let connection = inner.transaction(self.id)?.connection;
        Ok(Connection::new(self.engine.clone(), connection))
    }

    /// Names of the stores in scope, sorted. For a versionchange
    /// transaction, every store of the database.
    pub fn object_store_names(&self) -> Vec<String> {
        let inner = self.engine.lock();
        let (Some(txn), Some(db)) = (inner.transactions.get(&self.id), inner.database_of(self.id)) else {
            return Vec::new();
        };
        let mut names: Vec<String> = db
            .stores
            .values()
            .filter(|s| txn.covers(s.id))
            .map(|s| s.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Returns a store in the transaction's scope.
    ///
    /// # Errors
    ///
    /// `InvalidStateError` once the transaction finished, then
    /// `NotFoundError` if the store is not in scope.
    pub fn object_store(&self, name: &str) -> IdbResult<ObjectStore> {
        let inner = self.engine.lock();
        let txn = inner.transaction(self.id)?;
        if txn.is_finished() {
            return Err(IdbError::invalid_state("the transaction has finished"));
        }
        inner
            .database_of(self.id)
            .and_then(|db| db.stores.values().find(|s| s.name == name))
            .filter(|s| txn.covers(s.id))
            .map(|s| ObjectStore::attach(self.engine.clone(), self.id, s))
            .ok_or_else(|| IdbError::not_found(format!("no object store named {name:?} in scope")))
    }

    /// Commits once the queued requests have run, without waiting for the
    /// transaction to go idle.
    ///
    /// # Errors
    ///
    /// `InvalidStateError` if already committing or finished, then
    /// `TransactionInactiveError`.
    pub fn commit(&self) -> IdbResult<()> {
        let mut inner = self.engine.lock();
        let txn = inner.transaction_mut(self.id)?;
        match txn.state {
            TransactionState::Committing | TransactionState::Finished => {
                Err(IdbError::invalid_state("the transaction is already committing or finished"))
            }
            TransactionState::Inactive => Err(IdbError::transaction_inactive(format!(
                "transaction {} is not active",
                self.id
            ))),
            TransactionState::Active => {
                txn.state = TransactionState::Committing;
                debug!(transaction = %self.id, "commit requested");
                Ok(())
            }
        }
    }

    /// Aborts the transaction, undoing its writes.
    ///
    /// # Errors
    ///
    /// `InvalidStateError` if already committing or finished.
    pub fn abort(&self) -> IdbResult<()> {
        let mut inner = self.engine.lock();
        let state = inner.transaction(self.id)?.state;
        if matches!(state, TransactionState::Committing | TransactionState::Finished) {
            return Err(IdbError::invalid_state("the transaction is already committing or finished"));
        }
        inner.abort_transaction(self.id, None);
        Ok(())
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.engine.same_engine(&other.engine)
    }
}
