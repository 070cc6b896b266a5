//! # idb storage
//!
//! Byte stores that hold values too large to keep inline in an object store.
//!
//! The engine keeps ordinary records in memory. When a serialized value
//! grows past the configured threshold it is "wrapped": the bytes are
//! appended to a [`StorageBackend`] and the record keeps only a
//! [`BlobLocation`]. Backends are **opaque byte stores**; they never
//! interpret what they hold.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - default, lives as long as the engine
//! - [`FileBackend`] - spills wrapped values to a file
//!
//! ## Example
//!
//! ```rust
//! use idb_storage::{BlobLog, InMemoryBackend};
//!
//! let mut log = BlobLog::new(Box::new(InMemoryBackend::new()));
//! let location = log.write(b"a large value").unwrap();
//! assert_eq!(log.read(location).unwrap(), b"a large value");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod blob;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use blob::{BlobLocation, BlobLog, FRAME_HEADER_SIZE};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
