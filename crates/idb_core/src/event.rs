//! Events delivered by [`Engine::next_event`](crate::Engine::next_event).

use crate::api::{Connection, Request, Transaction};
use crate::error::IdbError;
use crate::types::{ConnectionId, RequestId, TransactionId};

/// Something the client should react to.
///
/// While a `Success`, `Error` or `UpgradeNeeded` event is being handled,
/// that is until the next call to `next_event`, the request's transaction
/// is active and new requests may be placed against it.
#[derive(Debug, Clone)]
pub enum Event {
    /// A request completed successfully.
    Success {
        /// The request.
        request: Request,
    },
    /// A request failed. Unless [`Request::prevent_default`] is called
    /// before the next event, the request's transaction aborts.
    Error {
        /// The request.
        request: Request,
        /// Why it failed.
        error: IdbError,
    },
    /// An open request needs the schema upgraded.
    UpgradeNeeded {
        /// The open request.
        request: Request,
        /// The new connection.
        connection: Connection,
        /// The versionchange transaction.
        transaction: Transaction,
        /// The version before the upgrade; 0 for a new database.
        old_version: u64,
        /// The requested version.
        new_version: u64,
    },
    /// Other connections stayed open after being asked to close.
    Blocked {
        /// The open or delete request that is waiting.
        request: Request,
        /// Current version of the database.
        old_version: u64,
        /// The requested version; `None` for deletion.
        new_version: Option<u64>,
    },
    /// Another client wants to upgrade or delete the database this
    /// connection is open on.
    VersionChange {
        /// The connection asked to close.
        connection: Connection,
        /// Current version of the database.
        old_version: u64,
        /// The requested version; `None` for deletion.
        new_version: Option<u64>,
    },
    /// A transaction committed.
    Complete {
        /// The transaction.
        transaction: Transaction,
    },
    /// A transaction aborted.
    Abort {
        /// The transaction.
        transaction: Transaction,
        /// The error that caused the abort; `None` for explicit aborts.
        error: Option<IdbError>,
    },
}

impl Event {
    /// The event's DOM name (`"success"`, `"upgradeneeded"`, ...).
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Error { .. } => "error",
            Self::UpgradeNeeded { .. } => "upgradeneeded",
            Self::Blocked { .. } => "blocked",
            Self::VersionChange { .. } => "versionchange",
            Self::Complete { .. } => "complete",
            Self::Abort { .. } => "abort",
        }
    }

    /// The request this event targets, if any.
    #[must_use]
    pub fn request(&self) -> Option<&Request> {
        match self {
            Self::Success { request }
            | Self::Error { request, .. }
            | Self::UpgradeNeeded { request, .. }
            | Self::Blocked { request, .. } => Some(request),
            _ => None,
        }
    }

    /// The transaction this event targets, if any.
    #[must_use]
    pub fn transaction(&self) -> Option<&Transaction> {
        match self {
            Self::UpgradeNeeded { transaction, .. }
            | Self::Complete { transaction }
            | Self::Abort { transaction, .. } => Some(transaction),
            _ => None,
        }
    }
}

/// An event waiting in the engine's queue, by id.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PendingEvent {
    /// Success or error, depending on the request's result at dispatch.
    Request(RequestId),
    UpgradeNeeded {
        request: RequestId,
        connection: ConnectionId,
        transaction: TransactionId,
        old_version: u64,
        new_version: u64,
    },
    Blocked {
        request: RequestId,
        old_version: u64,
        new_version: Option<u64>,
    },
    VersionChange {
        connection: ConnectionId,
        old_version: u64,
        new_version: Option<u64>,
    },
    Complete(TransactionId),
    Abort(TransactionId),
}
