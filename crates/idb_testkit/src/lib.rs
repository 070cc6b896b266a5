//! # idb testkit
//!
//! Test utilities for the idb engine.
//!
//! This crate provides:
//! - Test fixtures and event-loop helpers
//! - Property-based test generators using proptest
//! - A model-checking harness comparing the engine with a `BTreeMap`
//! - Fuzz testing harnesses
//! - Stress testing utilities
//! - Key encoding test vectors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use idb_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_engine() {
//!     let engine = TestEngine::memory();
//!     let db = open_with_stores(&engine, "db", &["store"]);
//!     // ... test operations
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod fuzz;
pub mod generators;
pub mod harness;
pub mod stress;
pub mod vectors;

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (default `warn`).
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::fuzz::*;
    pub use crate::generators::*;
    pub use crate::harness::*;
    pub use crate::init_tracing;
    pub use crate::stress::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use fuzz::*;
pub use generators::*;
pub use harness::*;
pub use stress::*;
pub use vectors::*;
