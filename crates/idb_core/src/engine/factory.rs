//! Open and delete requests.
//!
//! Requests against one database name run one at a time, in the order they
//! were made. A request that changes the version or deletes the database
//! first asks every other open connection to close, reports `blocked` if
//! any stay open, and waits until they have all closed.

use super::EngineInner;
use crate::database::{ConnectionData, DatabaseData};
use crate::error::{IdbError, IdbResult};
use crate::event::PendingEvent;
use crate::request::Outcome;
use crate::transaction::{TransactionData, TransactionMode, UpgradeState};
use crate::types::{ConnectionId, RequestId, TransactionId};
use std::collections::BTreeSet;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FactoryKind {
    Open { version: Option<u64> },
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    /// Waiting for other connections to close.
    Waiting {
        /// The opening connection; `None` for deletion.
        connection: Option<ConnectionId>,
        old_version: u64,
        new_version: Option<u64>,
        created: bool,
        blocked_sent: bool,
    },
    /// The upgrade transaction is running.
    Upgrading,
}

/// A queued open or delete request.
#[derive(Debug, Clone)]
pub(crate) struct FactoryOp {
    request: RequestId,
    kind: FactoryKind,
    phase: Phase,
}

impl FactoryOp {
    pub(crate) fn new(request: RequestId, kind: FactoryKind) -> Self {
        Self {
            request,
            kind,
            phase: Phase::Start,
        }
    }
}

impl EngineInner {
    /// Advances the head request of some database queue. Returns false if
    /// none can move.
    pub(super) fn step_factory(&mut self) -> bool {
        let names: Vec<String> = self.factory.keys().cloned().collect();
        names.iter().any(|name| self.step_factory_queue(name))
    }

    fn step_factory_queue(&mut self, name: &str) -> bool {
        let Some(op) = self.factory.get(name).and_then(|q| q.front()).cloned() else {
            return false;
        };
        match op.phase {
            Phase::Upgrading => false,
            Phase::Start => {
                match op.kind {
                    FactoryKind::Open { version } => self.start_open(name, op.request, version),
                    FactoryKind::Delete => self.start_delete(name, op.request),
                }
                true
            }
            Phase::Waiting {
                connection,
                old_version,
                new_version,
                created,
                blocked_sent,
            } => {
                if self.others_open(name, connection) {
                    if blocked_sent {
                        return false;
                    }
                    self.set_phase(
                        name,
                        Phase::Waiting {
                            connection,
                            old_version,
                            new_version,
                            created,
                            blocked_sent: true,
                        },
                    );
                    self.events.push_back(PendingEvent::Blocked {
                        request: op.request,
                        old_version,
                        new_version,
                    });
                    return true;
                }
                match (connection, new_version) {
                    (Some(connection), Some(new_version)) => {
                        self.start_upgrade(name, op.request, connection, old_version, new_version, created);
                    }
                    _ => self.finish_delete(name, op.request),
                }
                true
            }
        }
    }

    fn start_open(&mut self, name: &str, request: RequestId, version: Option<u64>) {
        let created = !self.databases.contains_key(name);
        let old_version = self
            .databases
            .entry(name.to_string())
            .or_insert_with(|| DatabaseData::new(name.to_string()))
            .version;
        let version = version.unwrap_or(old_version.max(1));

        if version < old_version {
            self.finish_request(
                name,
                request,
                Err(IdbError::version(format!(
                    "requested version {version} is lower than the current version {old_version}"
                ))),
            );
            return;
        }

        let connection = ConnectionId(self.next_id());
        self.connections
            .insert(connection, ConnectionData::new(connection, name.to_string(), old_version));

        if version == old_version {
            debug!(db = name, %connection, version, "connection opened");
            self.finish_request(name, request, Ok(Outcome::Connection(connection)));
            return;
        }

        self.notify_others(name, Some(connection), old_version, Some(version));
        self.set_phase(
            name,
            Phase::Waiting {
                connection: Some(connection),
                old_version,
                new_version: Some(version),
                created,
                blocked_sent: false,
            },
        );
    }

    fn start_delete(&mut self, name: &str, request: RequestId) {
        let Some(old_version) = self.databases.get(name).map(|db| db.version) else {
            self.finish_request(name, request, Ok(Outcome::Undefined));
            return;
        };
        self.notify_others(name, None, old_version, None);
        self.set_phase(
            name,
            Phase::Waiting {
                connection: None,
                old_version,
                new_version: None,
                created: false,
                blocked_sent: false,
            },
        );
    }

    fn start_upgrade(
        &mut self,
        name: &str,
        request: RequestId,
        connection: ConnectionId,
        old_version: u64,
        new_version: u64,
        created: bool,
    ) {
        let Some(db) = self.databases.get_mut(name) else {
            self.finish_request(name, request, Err(IdbError::unknown("database vanished during open")));
            return;
        };
        let stores = db.stores.clone();
        db.version = new_version;

        let txn_id = TransactionId(self.next_id());
        if let Some(conn) = self.connections.get_mut(&connection) {
            conn.version = new_version;
            conn.upgrade = Some(txn_id);
        }

        let mut txn = TransactionData::new(
            txn_id,
            connection,
            name.to_string(),
            TransactionMode::VersionChange,
            self.config.default_durability,
            BTreeSet::new(),
        );
        txn.started = true;
        txn.upgrade = Some(UpgradeState {
            request,
            old_version,
            created,
            stores,
        });
        self.transactions.insert(txn_id, txn);
        self.stats.record_transaction_start();

        if let Some(data) = self.requests.get_mut(&request) {
            data.complete(Ok(Outcome::Connection(connection)));
            data.transaction = Some(txn_id);
        }
        self.set_phase(name, Phase::Upgrading);
        info!(db = name, old_version, new_version, transaction = %txn_id, "upgrading database");
        self.events.push_back(PendingEvent::UpgradeNeeded {
            request,
            connection,
            transaction: txn_id,
            old_version,
            new_version,
        });
    }

    fn finish_delete(&mut self, name: &str, request: RequestId) {
        if let Some(db) = self.databases.remove(name) {
            info!(db = name, version = db.version, "database deleted");
        }
        self.finish_request(name, request, Ok(Outcome::Undefined));
    }

    /// Settles the open request of a finished upgrade and releases the
    /// database queue.
    pub(super) fn finish_upgrade(&mut self, name: &str, request: RequestId, result: IdbResult<Outcome>) {
        if let Some(data) = self.requests.get_mut(&request) {
            data.transaction = None;
        }
        self.finish_request(name, request, result);
    }

    /// Completes the head request of `name`'s queue and pops it.
    fn finish_request(&mut self, name: &str, request: RequestId, result: IdbResult<Outcome>) {
        if let Err(err) = &result {
            self.stats.record_failed_request();
            debug!(db = name, %request, error = %err, "factory request failed");
        }
        if let Some(data) = self.requests.get_mut(&request) {
            data.complete(result);
        }
        if let Some(queue) = self.factory.get_mut(name) {
            queue.pop_front();
            if queue.is_empty() {
                self.factory.remove(name);
            }
        }
        self.events.push_back(PendingEvent::Request(request));
    }

    fn set_phase(&mut self, name: &str, phase: Phase) {
        if let Some(op) = self.factory.get_mut(name).and_then(|q| q.front_mut()) {
            op.phase = phase;
        }
    }

    /// Connections to `name` other than `except` that are not yet closed.
    fn other_connections<'a>(
        &'a self,
        name: &'a str,
        except: Option<ConnectionId>,
    ) -> impl Iterator<Item = &'a ConnectionData> + 'a {
        self.connections
            .values()
            .filter(move |c| c.db_name == name && Some(c.id) != except && !c.closed)
    }

    fn others_open(&self, name: &str, except: Option<ConnectionId>) -> bool {
        self.other_connections(name, except).next().is_some()
    }

    fn notify_others(
        &mut self,
        name: &str,
        except: Option<ConnectionId>,
        old_version: u64,
        new_version: Option<u64>,
    ) {
        let targets: Vec<ConnectionId> = self
            .other_connections(name, except)
            .filter(|c| !c.close_pending)
            .map(|c| c.id)
            .collect();
        for connection in targets {
            self.events.push_back(PendingEvent::VersionChange {
                connection,
                old_version,
                new_version,
            });
        }
    }
}
