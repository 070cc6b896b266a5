//! Fuzz testing harnesses.
//!
//! This module provides fuzz targets that can be used with cargo-fuzz
//! or other fuzzing frameworks.

use crate::fixtures::{open_with_stores, transaction};
use idb_codec::{decode_key, encode_key};
use idb_core::{CursorDirection, Engine, Key, KeyPath, KeyRange, Query, StructuredValue, TransactionMode};

/// Fuzz target for key decoding.
///
/// Arbitrary bytes either decode to a key or return an error, never panic.
pub fn fuzz_key_decode(data: &[u8]) {
    let _ = decode_key(data);
}

/// Fuzz target for key round trips.
///
/// Anything that decodes must re-encode to bytes that decode to the same
/// key, and the re-encoding must be stable.
pub fn fuzz_key_roundtrip(data: &[u8]) {
    if let Ok(key) = decode_key(data) {
        let encoded = encode_key(&key);
        let decoded = decode_key(&encoded).expect("re-encoded key must decode");
        assert_eq!(key, decoded, "Roundtrip mismatch");
        assert_eq!(encode_key(&decoded), encoded, "Encoding is not stable");
    }
}

/// Fuzz target for serialized structured values.
pub fn fuzz_value_decode(data: &[u8]) {
    if let Ok(value) = StructuredValue::from_bytes(data) {
        let _ = value.to_bytes();
    }
}

/// Fuzz target for key path parsing.
pub fn fuzz_key_path(data: &[u8]) {
    let path = String::from_utf8_lossy(data);
    let _ = KeyPath::from(path.as_ref()).is_valid();
    let parts: Vec<&str> = path.split(',').collect();
    let _ = KeyPath::from(parts).is_valid();
}

/// Structured fuzzing input for engine operations.
#[derive(Debug, Clone)]
pub enum FuzzOp {
    /// Put a string value.
    Put {
        /// Record key.
        key: u8,
        /// Value payload.
        data: Vec<u8>,
    },
    /// Get a record.
    Get {
        /// Record key.
        key: u8,
    },
    /// Delete keys in `[lower, upper]`.
    Delete {
        /// Lower bound.
        lower: u8,
        /// Upper bound.
        upper: u8,
    },
    /// Walk a cursor over the whole store.
    Cursor {
        /// Direction selector.
        direction: u8,
    },
    /// Abort the current transaction and start a new one.
    Abort,
}

impl FuzzOp {
    /// Parse operations from fuzzer input.
    pub fn parse_sequence(data: &[u8]) -> Vec<FuzzOp> {
        let mut ops = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            let op_type = data[offset];
            offset += 1;

            let op = match op_type % 5 {
                0 => {
                    let (Some(&key), Some(&len)) = (data.get(offset), data.get(offset + 1)) else {
                        break;
                    };
                    offset += 2;
                    let len = len as usize % 64;
                    let Some(payload) = data.get(offset..offset + len) else {
                        break;
                    };
                    offset += len;
                    FuzzOp::Put {
                        key,
                        data: payload.to_vec(),
                    }
                }
                1 => {
                    let Some(&key) = data.get(offset) else { break };
                    offset += 1;
                    FuzzOp::Get { key }
                }
                2 => {
                    let (Some(&lower), Some(&upper)) = (data.get(offset), data.get(offset + 1)) else {
                        break;
                    };
                    offset += 2;
                    FuzzOp::Delete { lower, upper }
                }
                3 => {
                    let Some(&direction) = data.get(offset) else { break };
                    offset += 1;
                    FuzzOp::Cursor { direction }
                }
                _ => FuzzOp::Abort,
            };

            ops.push(op);
        }

        ops
    }

    /// Execute operations against a store named `s`, all in readwrite
    /// transactions, running the event loop after each.
    pub fn execute_sequence(ops: &[FuzzOp], engine: &Engine) {
        let db = open_with_stores(engine, "fuzz", &["s"]);
        for op in ops {
            let txn = transaction(&db, &["s"], TransactionMode::ReadWrite);
            let Ok(store) = txn.object_store("s") else { return };
            match op {
                FuzzOp::Put { key, data } => {
                    let value = StructuredValue::from(String::from_utf8_lossy(data).into_owned());
                    let _ = store.put(&value, Some(Key::from(i32::from(*key))));
                }
                FuzzOp::Get { key } => {
                    let _ = store.get(Key::from(i32::from(*key)));
                }
                FuzzOp::Delete { lower, upper } => {
                    let range = KeyRange::bound(
                        Key::from(i32::from(*lower)),
                        Key::from(i32::from(*upper)),
                        false,
                        false,
                    );
                    if let Ok(range) = range {
                        let _ = store.delete(range);
                    }
                }
                FuzzOp::Cursor { direction } => {
                    let direction = match direction % 4 {
                        0 => CursorDirection::Next,
                        1 => CursorDirection::NextUnique,
                        2 => CursorDirection::Prev,
                        _ => CursorDirection::PrevUnique,
                    };
                    if let Ok(request) = store.open_cursor(Query::All, direction) {
                        crate::fixtures::collect_cursor(engine, &request);
                    }
                }
                FuzzOp::Abort => {
                    let _ = txn.abort();
                }
            }
            engine.run_until_idle();
        }
    }
}

/// Fuzz target for engine operation sequences.
pub fn fuzz_engine_operations(data: &[u8]) {
    let ops = FuzzOp::parse_sequence(data);
    FuzzOp::execute_sequence(&ops, &Engine::new());
}
