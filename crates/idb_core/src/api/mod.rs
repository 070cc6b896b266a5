//! Client handles.
//!
//! Handles are cheap to clone and hold ids, never references into engine
//! state. Every call locks the engine, checks its preconditions in the
//! documented order, and either fails synchronously or queues a request.

mod connection;
mod cursor;
mod index;
mod object_store;
mod request;
mod transaction;

pub use connection::Connection;
pub use cursor::Cursor;
pub use index::Index;
pub use object_store::ObjectStore;
pub use request::Request;
pub use transaction::Transaction;

use crate::engine::{Engine, EngineInner};
use crate::error::{IdbError, IdbResult};
use crate::transaction::{TransactionData, TransactionState};
use crate::types::TransactionId;
use idb_codec::{structured_clone, StructuredValue};
use parking_lot::MutexGuard;

/// What a request was made against.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// An object store.
    ObjectStore(ObjectStore),
    /// An index.
    Index(Index),
    /// A cursor (`update` and `delete` requests).
    Cursor(Cursor),
}

/// Fails with `TransactionInactiveError` unless the transaction is active.
pub(crate) fn active(inner: &EngineInner, txn: TransactionId) -> IdbResult<&TransactionData> {
    let data = inner.transaction(txn)?;
    if !data.is_active() {
        return Err(IdbError::transaction_inactive(format!(
            "transaction {txn} is not active"
        )));
    }
    Ok(data)
}

pub(crate) fn writable(txn: &TransactionData) -> IdbResult<()> {
    if txn.mode.can_write() {
        Ok(())
    } else {
        Err(IdbError::read_only(format!("transaction {} is read-only", txn.id)))
    }
}

/// Clones `value` for storage.
///
/// The engine lock is released and the transaction marked inactive while
/// the clone runs, so getters on the value see the transaction as inactive
/// and may call back into the engine.
pub(crate) fn clone_for_storage<'e>(
    engine: &'e Engine,
    mut inner: MutexGuard<'e, EngineInner>,
    txn: TransactionId,
    value: &StructuredValue,
) -> (MutexGuard<'e, EngineInner>, IdbResult<StructuredValue>) {
    set_state(&mut inner, txn, TransactionState::Active, TransactionState::Inactive);
    drop(inner);
    let cloned = structured_clone(value.heap(), value.root());
    let mut inner = engine.lock();
    set_state(&mut inner, txn, TransactionState::Inactive, TransactionState::Active);

    let result = match cloned {
        Err(err) => Err(err.into()),
        Ok(_) if inner.transactions.get(&txn).map_or(true, TransactionData::is_finished) => Err(
            IdbError::transaction_inactive("the transaction finished while the value was cloned"),
        ),
        Ok(cloned) => Ok(cloned),
    };
    (inner, result)
}

fn set_state(inner: &mut EngineInner, txn: TransactionId, from: TransactionState, to: TransactionState) {
    if let Some(data) = inner.transactions.get_mut(&txn) {
        if data.state == from {
            data.state = to;
        }
    }
}
