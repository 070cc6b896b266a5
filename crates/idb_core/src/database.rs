//! Databases and connections.

use crate::store::ObjectStoreData;
use crate::types::{ConnectionId, StoreId, TransactionId};
use std::collections::BTreeMap;

/// A named, versioned set of object stores.
#[derive(Debug, Clone)]
pub(crate) struct DatabaseData {
    pub name: String,
    pub version: u64,
    pub stores: BTreeMap<StoreId, ObjectStoreData>,
}

impl DatabaseData {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            version: 0,
            stores: BTreeMap::new(),
        }
    }

    pub(crate) fn store_id(&self, name: &str) -> Option<StoreId> {
        self.stores.values().find(|s| s.name == name).map(|s| s.id)
    }

    /// Store names, sorted.
    pub(crate) fn store_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.values().map(|s| s.name.clone()).collect();
        names.sort();
        names
    }
}

/// A connection to a database.
#[derive(Debug, Clone)]
pub(crate) struct ConnectionData {
    pub id: ConnectionId,
    pub db_name: String,
    /// The version this connection sees.
    pub version: u64,
    /// `close()` was called or the engine closed the connection.
    pub close_pending: bool,
    /// Close pending and every transaction of the connection finished.
    pub closed: bool,
    /// The upgrade transaction running on this connection, if any.
    pub upgrade: Option<TransactionId>,
}

impl ConnectionData {
    pub(crate) fn new(id: ConnectionId, db_name: String, version: u64) -> Self {
        Self {
            id,
            db_name,
            version,
            close_pending: false,
            closed: false,
            upgrade: None,
        }
    }
}
