//! # idb codec
//!
//! Keys and values for the idb engine.
//!
//! - [`Key`]: the valid key types with their total order, conversion from
//!   values, and [`encode_key`]/[`decode_key`], an order-preserving byte
//!   encoding whose bytewise order equals key order.
//! - [`Heap`], [`Value`] and [`Object`]: an arena model of script values,
//!   including shared references, cycles, accessor properties and
//!   non-cloneable objects.
//! - [`structured_clone`]: copies a value into a self-contained
//!   [`StructuredValue`], which can be serialized with
//!   [`StructuredValue::to_bytes`].
//!
//! ## Usage
//!
//! ```
//! use idb_codec::{decode_key, encode_key, Heap, Key, Value};
//!
//! let mut heap = Heap::new();
//! let value = heap.array([Value::from(1), Value::from("a")]);
//! let key = Key::from_value(&heap, &value).unwrap();
//!
//! let bytes = encode_key(&key);
//! assert_eq!(decode_key(&bytes).unwrap(), key);
//! assert!(encode_key(&Key::from(2)) < bytes);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clone;
mod decoder;
mod encoder;
mod error;
mod json;
mod key;
mod serialize;
mod value;

pub use clone::structured_clone;
pub use decoder::{decode_key, KeyDecoder};
pub use encoder::{encode_key, KeyEncoder};
pub use error::{CodecError, CodecResult};
pub use key::{Key, KeyType};
pub use value::{
    Blob, ErrorKind, File, Geometry, Getter, Heap, ImageData, Object, ObjectRef, Property, Slot,
    StructuredValue, Value, ViewKind,
};

/// Compares two values as keys, returning `-1`, `0` or `1`.
///
/// # Errors
///
/// Returns [`CodecError::InvalidKey`] if either value is not a valid key.
pub fn compare_values(heap: &Heap, a: &Value, b: &Value) -> CodecResult<i8> {
    let a = Key::from_value(heap, a)?;
    let b = Key::from_value(heap, b)?;
    Ok(a.compare(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use proptest::prelude::*;

    fn leaf() -> impl Strategy<Value = Key> {
        prop_oneof![
            any::<f64>()
                .prop_filter("NaN is not a key", |n| !n.is_nan())
                .prop_map(Key::Number),
            (-1e13f64..1e13).prop_map(Key::Date),
            "\\PC{0,6}".prop_map(Key::String),
            "[a\\x00\\x{ff61}\\x{1F600}]{0,4}".prop_map(Key::String),
            prop::collection::vec(any::<u8>(), 0..6).prop_map(|b| Key::Binary(Bytes::from(b))),
        ]
    }

    fn key() -> impl Strategy<Value = Key> {
        leaf().prop_recursive(3, 24, 4, |inner| {
            prop::collection::vec(inner, 0..4).prop_map(Key::Array)
        })
    }

    proptest! {
        #[test]
        fn encoding_order_matches_key_order(a in key(), b in key()) {
            prop_assert_eq!(encode_key(&a).cmp(&encode_key(&b)), a.cmp(&b));
        }

        #[test]
        fn comparison_is_antisymmetric(a in key(), b in key()) {
            prop_assert_eq!(a.compare(&b), -b.compare(&a));
        }

        #[test]
        fn decode_inverts_encode(k in key()) {
            prop_assert_eq!(decode_key(&encode_key(&k)).unwrap(), k);
        }

        #[test]
        fn comparison_is_transitive(a in key(), b in key(), c in key()) {
            let mut sorted = [a, b, c];
            sorted.sort();
            prop_assert!(sorted[0] <= sorted[1] && sorted[1] <= sorted[2]);
            prop_assert!(sorted[0] <= sorted[2]);
        }
    }

    #[test]
    fn compare_values_rejects_invalid_keys() {
        let mut heap = Heap::new();
        let obj = heap.object([("a", Value::from(1))]);
        assert!(compare_values(&heap, &Value::from(1), &obj).is_err());
        assert_eq!(compare_values(&heap, &Value::from(1), &Value::from("1")).unwrap(), -1);
    }
}
