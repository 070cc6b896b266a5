//! Transaction state.

use crate::engine::Operation;
use crate::error::IdbError;
use crate::store::ObjectStoreData;
use crate::types::{ConnectionId, RequestId, StoreId, TransactionId};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;

/// Mode of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionMode {
    /// Reads only. Readonly transactions with overlapping scopes run side
    /// by side.
    ReadOnly,
    /// Reads and writes.
    ReadWrite,
    /// Schema changes during an upgrade. Only the engine creates these.
    VersionChange,
}

impl TransactionMode {
    /// Returns true for modes that may write records.
    #[must_use]
    pub fn can_write(self) -> bool {
        !matches!(self, Self::ReadOnly)
    }
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReadOnly => "readonly",
            Self::ReadWrite => "readwrite",
            Self::VersionChange => "versionchange",
        })
    }
}

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// Requests may be placed against the transaction.
    Active,
    /// Between dispatches; requests fail with `TransactionInactiveError`.
    Inactive,
    /// Commit was requested; queued requests still run.
    Committing,
    /// Committed or aborted.
    Finished,
}

/// Durability hint for commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Durability {
    /// Flush the value backend when configured to.
    #[default]
    Default,
    /// Flush and sync the value backend.
    Strict,
    /// Skip the flush.
    Relaxed,
}

/// Options for [`Connection::transaction`](crate::Connection::transaction).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    /// Durability hint; the engine default when `None`.
    pub durability: Option<Durability>,
}

impl TransactionOptions {
    /// Options with every field defaulted.
    #[must_use]
    pub const fn new() -> Self {
        Self { durability: None }
    }

    /// Sets the durability hint.
    #[must_use]
    pub const fn durability(mut self, durability: Durability) -> Self {
        self.durability = Some(durability);
        self
    }
}

/// What an upgrade transaction needs to undo itself.
#[derive(Debug)]
pub(crate) struct UpgradeState {
    /// The open request that started the upgrade.
    pub request: RequestId,
    pub old_version: u64,
    /// Whether the open created the database.
    pub created: bool,
    /// Schema and records as they were before the upgrade.
    pub stores: BTreeMap<StoreId, ObjectStoreData>,
}

/// A pending operation. Internal operations carry no request.
#[derive(Debug)]
pub(crate) struct QueuedOperation {
    pub request: Option<RequestId>,
    pub op: Operation,
}

#[derive(Debug)]
pub(crate) struct TransactionData {
    pub id: TransactionId,
    pub connection: ConnectionId,
    pub db_name: String,
    pub mode: TransactionMode,
    pub durability: Durability,
    pub state: TransactionState,
    pub started: bool,
    pub aborted: bool,
    /// Stores the transaction may touch. Empty for versionchange
    /// transactions, which cover the whole database.
    pub scope: BTreeSet<StoreId>,
    pub queue: VecDeque<QueuedOperation>,
    pub error: Option<IdbError>,
    /// Stores as they were before this transaction first wrote to them.
    pub snapshots: HashMap<StoreId, ObjectStoreData>,
    pub upgrade: Option<UpgradeState>,
}

impl TransactionData {
    pub(crate) fn new(
        id: TransactionId,
        connection: ConnectionId,
        db_name: String,
        mode: TransactionMode,
        durability: Durability,
        scope: BTreeSet<StoreId>,
    ) -> Self {
        Self {
            id,
            connection,
            db_name,
            mode,
            durability,
            state: TransactionState::Active,
            started: false,
            aborted: false,
            scope,
            queue: VecDeque::new(),
            error: None,
            snapshots: HashMap::new(),
            upgrade: None,
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.state == TransactionState::Finished
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    pub(crate) fn is_upgrade(&self) -> bool {
        self.mode == TransactionMode::VersionChange
    }

    /// Returns true if the transaction may see `store`.
    pub(crate) fn covers(&self, store: StoreId) -> bool {
        self.is_upgrade() || self.scope.contains(&store)
    }

    /// Returns true if the two transactions touch a common store.
    pub(crate) fn overlaps(&self, other: &Self) -> bool {
        self.db_name == other.db_name
            && (self.is_upgrade()
                || other.is_upgrade()
                || !self.scope.is_disjoint(&other.scope))
    }

    /// Records `store` as it is now, unless already recorded.
    pub(crate) fn snapshot(&mut self, store: &ObjectStoreData) {
        if self.upgrade.is_none() {
            self.snapshots
                .entry(store.id)
                .or_insert_with(|| store.clone());
        }
    }
}
