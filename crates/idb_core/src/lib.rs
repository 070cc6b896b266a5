//! # idb core
//!
//! An IndexedDB-compatible database engine.
//!
//! This crate provides:
//! - Databases with versioned schemas, upgraded through versionchange
//!   transactions
//! - Object stores with in-line or out-of-line keys and key generators
//! - Indexes, including unique and multiEntry indexes
//! - Cursors over stores and indexes in all four directions
//! - Transaction scheduling: overlapping readwrite transactions run one at
//!   a time, readonly ones side by side, and aborts roll back every write
//!
//! The engine is single-threaded in the way a browser event loop is: client
//! calls either fail synchronously or queue a request, and queued work runs
//! when the client pulls the next [`Event`] from [`Engine::next_event`].
//! While a request's event is being handled its transaction is active and
//! more requests may be placed against it; when the client moves on, the
//! transaction commits once it runs out of work.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod config;
mod cursor;
mod database;
mod engine;
mod error;
mod event;
mod key_path;
mod key_range;
mod request;
mod stats;
mod store;
mod transaction;
mod types;
mod webidl;

pub use api::{Connection, Cursor, Index, ObjectStore, Request, Source, Transaction};
pub use config::Config;
pub use cursor::CursorDirection;
pub use engine::Engine;
pub use error::{IdbError, IdbResult};
pub use event::Event;
pub use key_path::KeyPath;
pub use key_range::{KeyRange, Query};
pub use request::{Outcome, ReadyState};
pub use stats::{EngineStats, StatsSnapshot};
pub use store::{IndexParameters, ObjectStoreParameters};
pub use transaction::{Durability, TransactionMode, TransactionOptions, TransactionState};
pub use types::{ConnectionId, CursorId, IndexId, RequestId, StoreId, TransactionId};

pub use idb_codec::{Heap, Key, KeyType, StructuredValue, Value};
pub use idb_storage::{FileBackend, InMemoryBackend, StorageBackend};
