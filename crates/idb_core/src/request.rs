//! Requests and their results.

use crate::error::{IdbError, IdbResult};
use crate::types::{ConnectionId, CursorId, IndexId, StoreId, TransactionId};
use idb_codec::{Key, StructuredValue};

/// Whether a request has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadyState {
    /// Still queued or running.
    Pending,
    /// Completed with a result or an error.
    Done,
}

/// The result of a successful request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No meaningful result (`delete`, `clear`, `deleteDatabase`).
    Undefined,
    /// Nothing matched, or a cursor ran off the end of its range.
    Null,
    /// A record value.
    Value(StructuredValue),
    /// Record values, in key order.
    Values(Vec<StructuredValue>),
    /// A key.
    Key(Key),
    /// Keys, in order.
    Keys(Vec<Key>),
    /// A record count.
    Count(u64),
    /// A cursor positioned on a record.
    Cursor(CursorId),
    /// An open connection.
    Connection(ConnectionId),
}

impl Outcome {
    /// Returns the value, if this is a [`Outcome::Value`].
    #[must_use]
    pub fn as_value(&self) -> Option<&StructuredValue> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the key, if this is a [`Outcome::Key`].
    #[must_use]
    pub fn as_key(&self) -> Option<&Key> {
        match self {
            Self::Key(k) => Some(k),
            _ => None,
        }
    }

    /// Returns the count, if this is a [`Outcome::Count`].
    #[must_use]
    pub fn as_count(&self) -> Option<u64> {
        match self {
            Self::Count(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns true for [`Outcome::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// What a request was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SourceRef {
    Factory,
    Store(StoreId),
    Index(StoreId, IndexId),
    Cursor(CursorId),
}

#[derive(Debug)]
pub(crate) struct RequestData {
    pub transaction: Option<TransactionId>,
    pub source: SourceRef,
    pub state: ReadyState,
    pub result: Option<IdbResult<Outcome>>,
    /// The error's default action (aborting the transaction) was
    /// suppressed during dispatch.
    pub prevented: bool,
}

impl RequestData {
    pub(crate) fn new(transaction: Option<TransactionId>, source: SourceRef) -> Self {
        Self {
            transaction,
            source,
            state: ReadyState::Pending,
            result: None,
            prevented: false,
        }
    }

    pub(crate) fn complete(&mut self, result: IdbResult<Outcome>) {
        self.state = ReadyState::Done;
        self.result = Some(result);
    }

    /// Puts a cursor's request back into the pending state for its next
    /// iteration.
    pub(crate) fn reopen(&mut self) {
        self.state = ReadyState::Pending;
        self.result = None;
        self.prevented = false;
    }

    pub(crate) fn error(&self) -> Option<&IdbError> {
        match &self.result {
            Some(Err(e)) => Some(e),
            _ => None,
        }
    }
}
