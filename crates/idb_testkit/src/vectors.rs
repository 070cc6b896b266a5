//! Key encoding test vectors.
//!
//! Encoded keys are compared bytewise by every store and index, so these
//! vectors pin the exact byte layout. They can be exported as JSON for
//! checking other implementations of the same format.

use idb_core::Key;
use serde::{Deserialize, Serialize};

/// A key and the bytes it must encode to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// The key.
    pub key: Key,
    /// Expected encoding (hex).
    pub encoded_hex: String,
}

/// Bytes that must fail to decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MalformedVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Input data (hex).
    pub input_hex: String,
}

/// Two keys where `lower` sorts strictly before `upper`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// The smaller key.
    pub lower: Key,
    /// The larger key.
    pub upper: Key,
}

fn key_vector(id: &str, description: &str, key: Key, encoded_hex: &str) -> KeyVector {
    KeyVector {
        id: id.into(),
        description: description.into(),
        key,
        encoded_hex: encoded_hex.into(),
    }
}

/// Key encoding vectors.
pub fn key_encoding_vectors() -> Vec<KeyVector> {
    vec![
        key_vector("number_zero", "Number 0", Key::Number(0.0), "108000000000000000"),
        key_vector(
            "number_negative_zero",
            "Number -0 encodes like 0",
            Key::Number(-0.0),
            "108000000000000000",
        ),
        key_vector("number_one", "Number 1", Key::Number(1.0), "10bff0000000000000"),
        key_vector("number_minus_one", "Number -1", Key::Number(-1.0), "10400fffffffffffff"),
        key_vector("number_fraction", "Number 1.5", Key::Number(1.5), "10bff8000000000000"),
        key_vector("number_infinity", "Number +Infinity", Key::Number(f64::INFINITY), "10fff0000000000000"),
        key_vector(
            "number_negative_infinity",
            "Number -Infinity",
            Key::Number(f64::NEG_INFINITY),
            "10000fffffffffffff",
        ),
        key_vector("date_epoch", "Date at the epoch", Key::Date(0.0), "208000000000000000"),
        key_vector("date_2001", "Date 1e12 ms", Key::Date(1e12), "20c26d1a94a2000000"),
        key_vector("string_empty", "Empty string", Key::from(""), "3000"),
        key_vector(
            "string_ascii",
            "ASCII string: the zero high byte is escaped",
            Key::from("a"),
            "3000ff6100",
        ),
        key_vector("string_nul", "String holding U+0000", Key::from("\u{0}"), "3000ff00ff00"),
        key_vector("string_latin1", "String holding U+00E9", Key::from("\u{e9}"), "3000ffe900"),
        key_vector(
            "string_astral",
            "Astral character as a UTF-16 surrogate pair",
            Key::from("\u{1F600}"),
            "30d83dde00ff00",
        ),
        key_vector("binary_empty", "Empty binary", Key::Binary(Vec::new().into()), "4000"),
        key_vector(
            "binary_zero_byte",
            "Binary with a zero byte",
            Key::Binary(vec![0x00, 0x01].into()),
            "4000ff0100",
        ),
        key_vector("binary_ff", "Binary 0xFF is not escaped", Key::Binary(vec![0xff].into()), "40ff00"),
        key_vector("array_empty", "Empty array", Key::Array(Vec::new()), "5000"),
        key_vector(
            "array_nested",
            "Array holding an empty array",
            Key::Array(vec![Key::Array(Vec::new())]),
            "50500000",
        ),
        key_vector(
            "array_mixed",
            "Array of a string and a number",
            Key::Array(vec![Key::from("a"), Key::Number(1.0)]),
            "503000ff610010bff000000000000000",
        ),
    ]
}

/// Byte strings that are not valid key encodings.
pub fn malformed_key_vectors() -> Vec<MalformedVector> {
    let vector = |id: &str, description: &str, input_hex: &str| MalformedVector {
        id: id.into(),
        description: description.into(),
        input_hex: input_hex.into(),
    };
    vec![
        vector("empty", "No bytes at all", ""),
        vector("unknown_tag", "Tag 0x60 is not a key type", "60"),
        vector("truncated_number", "Number with two of eight bytes", "108000"),
        vector("unterminated_string", "String without its terminator", "3000ff61"),
        vector("odd_string", "String with an odd number of bytes", "306100"),
        vector("trailing_bytes", "A complete key followed by more bytes", "300000"),
        vector("unterminated_array", "Array without its terminator", "50"),
    ]
}

/// Adjacent keys in the total key order.
pub fn key_order_vectors() -> Vec<OrderVector> {
    let vector = |id: &str, lower: Key, upper: Key| OrderVector {
        id: id.into(),
        lower,
        upper,
    };
    vec![
        vector(
            "negative_infinity_first",
            Key::Number(f64::NEG_INFINITY),
            Key::Number(-1.0),
        ),
        vector("numbers_before_dates", Key::Number(f64::INFINITY), Key::Date(f64::NEG_INFINITY)),
        vector("dates_before_strings", Key::Date(8.64e15), Key::from("")),
        vector("prefix_first", Key::from("ab"), Key::from("abc")),
        vector("utf16_code_unit_order", Key::from("\u{1F600}"), Key::from("\u{ffff}")),
        vector("strings_before_binary", Key::from("\u{ffff}"), Key::Binary(Vec::new().into())),
        vector("binary_prefix_first", Key::Binary(vec![1].into()), Key::Binary(vec![1, 0].into())),
        vector("binary_before_arrays", Key::Binary(vec![0xff; 4].into()), Key::Array(Vec::new())),
        vector(
            "shorter_array_first",
            Key::Array(vec![Key::Number(1.0)]),
            Key::Array(vec![Key::Number(1.0), Key::Number(0.0)]),
        ),
        vector(
            "array_elementwise",
            Key::Array(vec![Key::Number(2.0)]),
            Key::Array(vec![Key::from("")]),
        ),
    ]
}

/// Encodes bytes as hexadecimal string.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Decodes hexadecimal string to bytes.
pub fn hex_decode(hex: &str) -> Vec<u8> {
    let hex = hex.replace([' ', '\n', '\r'], "");
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).expect("Invalid hex"))
        .collect()
}

/// Generate all test vectors as JSON.
pub fn all_vectors_json() -> String {
    let vectors = AllTestVectors {
        encoding: key_encoding_vectors(),
        malformed: malformed_key_vectors(),
        order: key_order_vectors(),
    };

    serde_json::to_string_pretty(&vectors).expect("Failed to serialize vectors")
}

#[derive(Debug, Serialize, Deserialize)]
struct AllTestVectors {
    encoding: Vec<KeyVector>,
    malformed: Vec<MalformedVector>,
    order: Vec<OrderVector>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use idb_codec::{decode_key, encode_key};

    #[test]
    fn test_key_encoding_vectors() {
        for vector in key_encoding_vectors() {
            assert_eq!(
                hex_encode(&encode_key(&vector.key)),
                vector.encoded_hex,
                "Vector {} failed: {}",
                vector.id,
                vector.description
            );
            let decoded = decode_key(&hex_decode(&vector.encoded_hex)).unwrap();
            assert_eq!(decoded, vector.key, "Vector {} did not decode back", vector.id);
        }
    }

    #[test]
    fn test_malformed_vectors() {
        for vector in malformed_key_vectors() {
            assert!(
                decode_key(&hex_decode(&vector.input_hex)).is_err(),
                "Vector {} decoded: {}",
                vector.id,
                vector.description
            );
        }
    }

    #[test]
    fn test_order_vectors() {
        for vector in key_order_vectors() {
            assert!(vector.lower < vector.upper, "Vector {} out of order", vector.id);
            assert_eq!(vector.lower.compare(&vector.upper), -1, "Vector {}", vector.id);
            assert!(
                encode_key(&vector.lower) < encode_key(&vector.upper),
                "Vector {} encodings out of order",
                vector.id
            );
        }
    }

    #[test]
    fn test_hex_roundtrip() {
        let bytes = vec![0x00, 0x01, 0xab, 0xff];
        assert_eq!(hex_encode(&bytes), "0001abff");
        assert_eq!(hex_decode("00 01 ab ff"), bytes);
    }

    #[test]
    fn test_all_vectors_json() {
        let json = all_vectors_json();
        assert!(json.contains("number_zero"));
        assert!(json.contains("trailing_bytes"));
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["encoding"].as_array().unwrap().len(), key_encoding_vectors().len());
    }
}
