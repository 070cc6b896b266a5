//! Order-preserving key encoding.
//!
//! Every key encodes to a byte string such that comparing two encodings
//! bytewise gives the same answer as comparing the keys. Object stores and
//! indexes are sorted maps over these bytes.
//!
//! ## Layout
//!
//! Each key starts with a type tag whose order matches [`KeyType`]:
//!
//! | Type   | Tag    | Body                                              |
//! |--------|--------|---------------------------------------------------|
//! | Number | `0x10` | 8 bytes, sign-adjusted big-endian IEEE 754        |
//! | Date   | `0x20` | same as Number                                    |
//! | String | `0x30` | UTF-16 code units big-endian, escaped, terminated |
//! | Binary | `0x40` | raw bytes, escaped, terminated                    |
//! | Array  | `0x50` | encoded elements followed by `0x00`               |
//!
//! Escaping replaces every `0x00` byte with `0x00 0xFF`; the terminator is
//! a lone `0x00`. Since anything that can follow a terminator is below
//! `0xFF`, shorter strings sort before their extensions.
//!
//! [`KeyType`]: crate::KeyType

use crate::key::Key;

pub(crate) const TAG_NUMBER: u8 = 0x10;
pub(crate) const TAG_DATE: u8 = 0x20;
pub(crate) const TAG_STRING: u8 = 0x30;
pub(crate) const TAG_BINARY: u8 = 0x40;
pub(crate) const TAG_ARRAY: u8 = 0x50;
pub(crate) const TERMINATOR: u8 = 0x00;
pub(crate) const ESCAPE: u8 = 0xFF;

/// Encodes a key to its order-preserving byte form.
#[must_use]
pub fn encode_key(key: &Key) -> Vec<u8> {
    let mut encoder = KeyEncoder::new();
    encoder.encode(key);
    encoder.into_bytes()
}

/// Incremental key encoder.
#[derive(Debug, Default)]
pub struct KeyEncoder {
    buffer: Vec<u8>,
}

impl KeyEncoder {
    /// Create a new encoder.
    #[must_use]
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create an encoder with the given buffer capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Append one key.
    pub fn encode(&mut self, key: &Key) {
        match key {
            Key::Number(n) => self.encode_number(TAG_NUMBER, *n),
            Key::Date(t) => self.encode_number(TAG_DATE, *t),
            Key::String(s) => {
                self.buffer.push(TAG_STRING);
                for unit in s.encode_utf16() {
                    self.push_escaped(&unit.to_be_bytes());
                }
                self.buffer.push(TERMINATOR);
            }
            Key::Binary(bytes) => {
                self.buffer.push(TAG_BINARY);
                self.push_escaped(bytes);
                self.buffer.push(TERMINATOR);
            }
            Key::Array(items) => {
                self.buffer.push(TAG_ARRAY);
                for item in items {
                    self.encode(item);
                }
                self.buffer.push(TERMINATOR);
            }
        }
    }

    /// Consume the encoder and return the bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    fn encode_number(&mut self, tag: u8, n: f64) {
        self.buffer.push(tag);
        self.buffer.extend_from_slice(&sortable_bits(n).to_be_bytes());
    }

    fn push_escaped(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.buffer.push(b);
            if b == TERMINATOR {
                self.buffer.push(ESCAPE);
            }
        }
    }
}

/// Maps an `f64` to a `u64` whose unsigned order matches numeric order.
///
/// Negative zero is folded into positive zero.
pub(crate) fn sortable_bits(n: f64) -> u64 {
    let n = if n == 0.0 { 0.0 } else { n };
    let bits = n.to_bits();
    if bits >> 63 == 1 {
        !bits
    } else {
        bits | (1 << 63)
    }
}

/// Inverse of [`sortable_bits`].
pub(crate) fn from_sortable_bits(bits: u64) -> f64 {
    if bits >> 63 == 1 {
        f64::from_bits(bits & !(1 << 63))
    } else {
        f64::from_bits(!bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn number_layout() {
        let bytes = encode_key(&Key::from(1));
        assert_eq!(bytes.len(), 9);
        assert_eq!(bytes[0], TAG_NUMBER);
        assert_eq!(&bytes[1..], &(1.0f64.to_bits() | (1 << 63)).to_be_bytes());
    }

    #[test]
    fn negative_zero_encodes_as_zero() {
        assert_eq!(encode_key(&Key::Number(-0.0)), encode_key(&Key::Number(0.0)));
    }

    #[test]
    fn numbers_sort_numerically() {
        let ordered = [
            f64::NEG_INFINITY,
            -1e300,
            -1.5,
            -f64::MIN_POSITIVE,
            0.0,
            f64::MIN_POSITIVE,
            1.0,
            2.0,
            1e300,
            f64::INFINITY,
        ];
        for pair in ordered.windows(2) {
            assert!(
                encode_key(&Key::Number(pair[0])) < encode_key(&Key::Number(pair[1])),
                "{} < {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn sortable_bits_round_trip() {
        for n in [0.0, -2.5, 3.75, f64::MAX, f64::MIN, f64::INFINITY] {
            assert_eq!(from_sortable_bits(sortable_bits(n)), n);
        }
    }

    #[test]
    fn string_escapes_zero_bytes() {
        // 'a' is the unit 0x0061: its high byte is zero.
        assert_eq!(
            encode_key(&Key::from("a")),
            vec![TAG_STRING, 0x00, ESCAPE, 0x61, TERMINATOR]
        );
    }

    #[test]
    fn prefix_strings_sort_first() {
        let a = encode_key(&Key::from("a"));
        let a_nul = encode_key(&Key::from("a\0"));
        let ab = encode_key(&Key::from("ab"));
        assert!(a < a_nul);
        assert!(a_nul < ab);
    }

    #[test]
    fn binary_prefix_sorts_first() {
        let short = encode_key(&Key::Binary(Bytes::from_static(&[0])));
        let long = encode_key(&Key::Binary(Bytes::from_static(&[0, 0])));
        let empty = encode_key(&Key::Binary(Bytes::new()));
        assert!(empty < short);
        assert!(short < long);
    }

    #[test]
    fn arrays_nest() {
        let key = Key::Array(vec![Key::from(1), Key::Array(vec![])]);
        let bytes = encode_key(&key);
        assert_eq!(bytes[0], TAG_ARRAY);
        assert_eq!(&bytes[bytes.len() - 3..], &[TAG_ARRAY, TERMINATOR, TERMINATOR]);
    }

    #[test]
    fn type_tags_order() {
        let keys = [
            Key::from(f64::INFINITY),
            Key::Date(f64::NEG_INFINITY),
            Key::from(""),
            Key::Binary(Bytes::new()),
            Key::Array(vec![]),
        ];
        for pair in keys.windows(2) {
            assert!(encode_key(&pair[0]) < encode_key(&pair[1]));
        }
    }
}
