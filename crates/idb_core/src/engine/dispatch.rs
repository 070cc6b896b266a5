//! The event loop: dispatch bookkeeping, commit and abort.

use super::EngineInner;
use crate::error::IdbError;
use crate::event::PendingEvent;
use crate::request::Outcome;
use crate::transaction::{can_start, Durability, QueuedOperation, TransactionState};
use crate::types::TransactionId;
use std::mem;
use tracing::{debug, trace, warn};

impl EngineInner {
    /// Wraps up the event handed out last.
    ///
    /// An error event that was not prevented aborts its transaction. Every
    /// active transaction becomes inactive.
    pub(super) fn end_dispatch(&mut self) {
        if let Some(PendingEvent::Request(id)) = self.dispatching.take() {
            let failed = self.requests.get(&id).and_then(|request| {
                let error = request.error().filter(|_| !request.prevented)?;
                Some((request.transaction?, error.clone()))
            });
            if let Some((txn, error)) = failed {
                debug!(request = %id, transaction = %txn, error = %error, "unhandled request error");
                self.abort_transaction(txn, Some(error));
            }
        }
        for txn in self.transactions.values_mut() {
            if txn.state == TransactionState::Active {
                txn.state = TransactionState::Inactive;
            }
        }
    }

    /// Runs queued work until an event is ready.
    pub(super) fn pump(&mut self) -> Option<PendingEvent> {
        loop {
            self.close_finished_connections();
            if let Some(event) = self.events.pop_front() {
                self.begin_dispatch(&event);
                self.dispatching = Some(event.clone());
                return Some(event);
            }
            if !(self.step_factory() || self.step_transactions()) {
                return None;
            }
        }
    }

    /// Makes the target transaction active while a request event is being
    /// handled.
    fn begin_dispatch(&mut self, event: &PendingEvent) {
        let txn = match event {
            PendingEvent::Request(id) => self.requests.get(id).and_then(|r| r.transaction),
            PendingEvent::UpgradeNeeded { transaction, .. } => Some(*transaction),
            _ => None,
        };
        if let Some(txn) = txn.and_then(|id| self.transactions.get_mut(&id)) {
            if txn.state == TransactionState::Inactive {
                txn.state = TransactionState::Active;
            }
        }
    }

    fn close_finished_connections(&mut self) {
        let busy: Vec<_> = self
            .transactions
            .values()
            .filter(|t| !t.is_finished())
            .map(|t| t.connection)
            .collect();
        for conn in self.connections.values_mut() {
            if conn.close_pending && !conn.closed && !busy.contains(&conn.id) {
                conn.closed = true;
                debug!(connection = %conn.id, db = %conn.db_name, "connection closed");
            }
        }
    }

    /// Starts, runs or commits the first transaction that can move.
    fn step_transactions(&mut self) -> bool {
        let ids: Vec<TransactionId> = self
            .transactions
            .values()
            .filter(|t| !t.is_finished())
            .map(|t| t.id)
            .collect();
        ids.into_iter().any(|id| self.step_transaction(id))
    }

    fn step_transaction(&mut self, id: TransactionId) -> bool {
        let Some(txn) = self.transactions.get(&id) else {
            return false;
        };
        if !txn.started {
            if !can_start(&self.transactions, id) {
                return false;
            }
            if let Some(txn) = self.transactions.get_mut(&id) {
                txn.started = true;
                self.stats.record_transaction_start();
                debug!(transaction = %id, mode = %txn.mode, "transaction started");
            }
        }
        let Some(txn) = self.transactions.get_mut(&id) else {
            return false;
        };
        if let Some(queued) = txn.queue.pop_front() {
            self.run_queued(id, queued);
            return true;
        }
        if txn.is_active() {
            return false;
        }
        self.commit_transaction(id);
        true
    }

    fn run_queued(&mut self, txn: TransactionId, queued: QueuedOperation) {
        let result = self.execute(txn, queued.op);
        match queued.request {
            Some(request) => {
                if let Err(err) = &result {
                    self.stats.record_failed_request();
                    debug!(%request, transaction = %txn, error = %err, "request failed");
                }
                if let Some(data) = self.requests.get_mut(&request) {
                    data.complete(result);
                }
                self.events.push_back(PendingEvent::Request(request));
            }
            None => {
                if let Err(err) = result {
                    self.abort_transaction(txn, Some(err));
                }
            }
        }
    }

    fn commit_transaction(&mut self, id: TransactionId) {
        let Some(txn) = self.transactions.get(&id) else {
            return;
        };
        let flush = match txn.durability {
            Durability::Relaxed => None,
            Durability::Strict => Some(true),
            Durability::Default => self.config.flush_on_commit.then_some(false),
        };
        if let Some(sync) = flush {
            if let Err(err) = self.values.flush(sync) {
                warn!(transaction = %id, error = %err, "flush failed, aborting");
                self.abort_transaction(id, Some(err));
                return;
            }
        }

        let Some(txn) = self.transactions.get_mut(&id) else {
            return;
        };
        txn.state = TransactionState::Finished;
        txn.snapshots.clear();
        let upgrade = txn.upgrade.take();
        let (connection, db_name) = (txn.connection, txn.db_name.clone());
        self.stats.record_transaction_commit();
        debug!(transaction = %id, "transaction committed");
        self.events.push_back(PendingEvent::Complete(id));

        if let Some(upgrade) = upgrade {
            let close_pending = match self.connections.get_mut(&connection) {
                Some(conn) => {
                    conn.upgrade = None;
                    conn.close_pending
                }
                None => true,
            };
            let result = if close_pending {
                Err(IdbError::abort("the connection was closed before the upgrade finished"))
            } else {
                Ok(Outcome::Connection(connection))
            };
            self.finish_upgrade(&db_name, upgrade.request, result);
        }
    }

    /// Aborts a transaction: undoes its writes, fails its queued requests
    /// with `AbortError` and queues the `abort` event.
    pub(crate) fn abort_transaction(&mut self, id: TransactionId, error: Option<IdbError>) {
        let Some(txn) = self.transactions.get_mut(&id) else {
            return;
        };
        if txn.is_finished() {
            return;
        }
        txn.state = TransactionState::Finished;
        txn.aborted = true;
        txn.error = error;
        let queue = mem::take(&mut txn.queue);
        let snapshots = mem::take(&mut txn.snapshots);
        let upgrade = txn.upgrade.take();
        let (connection, db_name) = (txn.connection, txn.db_name.clone());

        if let Some(db) = self.databases.get_mut(&db_name) {
            for (store, data) in snapshots {
                trace!(transaction = %id, %store, "restoring store");
                db.stores.insert(store, data);
            }
        }
        for request in queue.into_iter().filter_map(|q| q.request) {
            if let Some(data) = self.requests.get_mut(&request) {
                data.complete(Err(IdbError::abort("the transaction was aborted")));
            }
            self.events.push_back(PendingEvent::Request(request));
        }
        self.stats.record_transaction_abort();
        debug!(transaction = %id, "transaction aborted");
        self.events.push_back(PendingEvent::Abort(id));

        let Some(upgrade) = upgrade else {
            return;
        };
        if upgrade.created {
            self.databases.remove(&db_name);
        } else if let Some(db) = self.databases.get_mut(&db_name) {
            db.stores = upgrade.stores;
            db.version = upgrade.old_version;
        }
        if let Some(conn) = self.connections.get_mut(&connection) {
            conn.version = upgrade.old_version;
            conn.upgrade = None;
            conn.close_pending = true;
        }
        warn!(db = %db_name, version = upgrade.old_version, "upgrade aborted");
        self.finish_upgrade(
            &db_name,
            upgrade.request,
            Err(IdbError::abort("the version change transaction was aborted")),
        );
    }
}
