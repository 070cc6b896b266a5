use super::{Connection, Cursor, Index, ObjectStore, Source, Transaction};
use crate::engine::Engine;
use crate::error::{IdbError, IdbResult};
use crate::request::{Outcome, ReadyState, RequestData, SourceRef};
use crate::types::RequestId;

/// A request handle.
///
/// Results become readable once the request's `success` or `error` event
/// has been delivered.
#[derive(Debug, Clone)]
pub struct Request {
    engine: Engine,
    id: RequestId,
}

impl Request {
    pub(crate) fn new(engine: Engine, id: RequestId) -> Self {
        Self { engine, id }
    }

    fn with<T>(&self, f: impl FnOnce(&RequestData) -> IdbResult<T>) -> IdbResult<T> {
        let inner = self.engine.lock();
        let data = inner
            .requests
            .get(&self.id)
            .ok_or_else(|| IdbError::unknown(format!("unknown request {}", self.id)))?;
        f(data)
    }

    /// The request id.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Whether the request has completed.
    pub fn ready_state(&self) -> ReadyState {
        self.with(|r| Ok(r.state)).unwrap_or(ReadyState::Pending)
    }

    /// The result. [`Outcome::Undefined`] if the request failed.
    ///
    /// # Errors
    ///
    /// `InvalidStateError` while the request is pending.
    pub fn result(&self) -> IdbResult<Outcome> {
        self.with(|r| match &r.result {
            None => Err(IdbError::invalid_state("the request is still pending")),
            Some(Ok(outcome)) => Ok(outcome.clone()),
            Some(Err(_)) => Ok(Outcome::Undefined),
        })
    }

    /// The error, or `None` if the request succeeded.
    ///
    /// # Errors
    ///
    /// `InvalidStateError` while the request is pending.
    pub fn error(&self) -> IdbResult<Option<IdbError>> {
        self.with(|r| match &r.result {
            None => Err(IdbError::invalid_state("the request is still pending")),
            Some(result) => Ok(result.as_ref().err().cloned()),
        })
    }

    /// The transaction the request belongs to. `None` for open and delete
    /// requests, except an open request while its upgrade runs.
    pub fn transaction(&self) -> Option<Transaction> {
        let txn = self.with(|r| Ok(r.transaction)).ok().flatten()?;
        Some(Transaction::new(self.engine.clone(), txn))
    }

    /// What the request was made against. `None` for open and delete
    /// requests.
    pub fn source(&self) -> Option<Source> {
        let inner = self.engine.lock();
        let data = inner.requests.get(&self.id)?;
        let engine = self.engine.clone();
        match (data.source, data.transaction) {
            (SourceRef::Factory, _) => None,
            (SourceRef::Cursor(cursor), _) => Some(Source::Cursor(Cursor::new(engine, cursor))),
            (SourceRef::Store(store), Some(txn)) => {
                Some(Source::ObjectStore(ObjectStore::resolve(engine, &inner, txn, store)))
            }
            (SourceRef::Index(store, index), Some(txn)) => {
                Some(Source::Index(Index::resolve(engine, &inner, txn, store, index)))
            }
            (_, None) => None,
        }
    }

    /// Suppresses the default action of the `error` event being handled:
    /// the transaction is not aborted.
    pub fn prevent_default(&self) {
        let mut inner = self.engine.lock();
        if let Some(data) = inner.requests.get_mut(&self.id) {
            data.prevented = true;
        }
    }

    /// The connection an open request produced.
    pub fn connection(&self) -> Option<Connection> {
        match self.result().ok()? {
            Outcome::Connection(id) => Some(Connection::new(self.engine.clone(), id)),
            _ => None,
        }
    }

    /// The cursor, while a cursor request has one positioned.
    pub fn cursor(&self) -> Option<Cursor> {
        match self.result().ok()? {
            Outcome::Cursor(id) => Some(Cursor::new(self.engine.clone(), id)),
            _ => None,
        }
    }
}

impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.engine.same_engine(&other.engine)
    }
}
