//! Keys and key comparison.

use crate::error::{CodecError, CodecResult};
use crate::value::{Heap, Object, ObjectRef, Value};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The type of a key, in ascending sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyType {
    /// A number.
    Number,
    /// A date.
    Date,
    /// A string.
    String,
    /// Binary data.
    Binary,
    /// An array of keys.
    Array,
}

/// A valid key.
///
/// Keys are totally ordered: first by [`KeyType`], then by content. Numbers
/// and dates compare numerically (`-0 == 0`), strings by UTF-16 code units,
/// binary keys bytewise, and arrays element by element with a strict prefix
/// sorting first.
///
/// `NaN` never appears inside a key built by this crate; use
/// [`Key::validate`] on keys built by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Key {
    /// A number key.
    Number(f64),
    /// A date key holding its time value.
    Date(f64),
    /// A string key.
    String(String),
    /// A binary key.
    Binary(Bytes),
    /// An array key.
    Array(Vec<Key>),
}

impl Key {
    /// Returns the key's type.
    #[must_use]
    pub fn key_type(&self) -> KeyType {
        match self {
            Self::Number(_) => KeyType::Number,
            Self::Date(_) => KeyType::Date,
            Self::String(_) => KeyType::String,
            Self::Binary(_) => KeyType::Binary,
            Self::Array(_) => KeyType::Array,
        }
    }

    /// Returns true if no number or date anywhere in the key is `NaN`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Number(n) | Self::Date(n) => !n.is_nan(),
            Self::String(_) | Self::Binary(_) => true,
            Self::Array(items) => items.iter().all(Self::is_valid),
        }
    }

    /// Checks that the key is valid.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidKey`] if the key contains `NaN`.
    pub fn validate(self) -> CodecResult<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(CodecError::invalid_key("NaN is not a valid key"))
        }
    }

    /// The number, if this is a number key.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Converts a value to a key.
    ///
    /// Numbers, strings, `Date`s, buffers, views and arrays of those convert.
    /// Arrays must be dense and may not contain themselves; an array reached
    /// twice, even without a cycle, is also rejected.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidKey`] if the value is not a valid key.
    pub fn from_value(heap: &Heap, value: &Value) -> CodecResult<Self> {
        let mut seen = Vec::new();
        convert(heap, value, &mut seen)
    }

    /// Converts a value to the keys a multiEntry index records for it.
    ///
    /// An array yields its elements with duplicates removed, in key order.
    /// Any other value yields itself if it is a valid key, or nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidKey`] if an array element, or a hole, is
    /// not a valid key.
    pub fn multi_entry_from_value(heap: &Heap, value: &Value) -> CodecResult<Vec<Self>> {
        let array = value
            .as_object()
            .and_then(|r| match heap.get(r) {
                Some(Object::Array { elements, .. }) => Some((r, elements)),
                _ => None,
            });
        let Some((r, elements)) = array else {
            return Ok(Self::from_value(heap, value).into_iter().collect());
        };

        let mut keys: Vec<Self> = Vec::with_capacity(elements.len());
        for element in elements {
            let element = element
                .as_ref()
                .ok_or_else(|| CodecError::invalid_key("multiEntry array has a hole"))?;
            let mut seen = vec![r];
            keys.push(convert(heap, element, &mut seen)?);
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    /// Materializes this key as a value in `heap`.
    pub fn to_value(&self, heap: &mut Heap) -> Value {
        match self {
            Self::Number(n) => Value::Number(*n),
            Self::Date(t) => heap.date(*t),
            Self::String(s) => Value::String(s.clone()),
            Self::Binary(b) => heap.array_buffer(b.to_vec()),
            Self::Array(items) => {
                let values: Vec<Value> = items.iter().map(|k| k.to_value(heap)).collect();
                heap.array(values)
            }
        }
    }

    /// Compares two keys as `-1`, `0` or `1`.
    #[must_use]
    pub fn compare(&self, other: &Self) -> i8 {
        match self.cmp(other) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }
}

fn convert(heap: &Heap, value: &Value, seen: &mut Vec<ObjectRef>) -> CodecResult<Key> {
    match value {
        Value::Number(n) if n.is_nan() => Err(CodecError::invalid_key("NaN is not a valid key")),
        Value::Number(n) => Ok(Key::Number(*n)),
        Value::String(s) => Ok(Key::String(s.clone())),
        Value::Object(r) => convert_object(heap, *r, seen),
        other => Err(CodecError::invalid_key(format!(
            "{} is not a valid key",
            other.type_name()
        ))),
    }
}

fn convert_object(heap: &Heap, r: ObjectRef, seen: &mut Vec<ObjectRef>) -> CodecResult<Key> {
    let object = heap
        .get(r)
        .ok_or_else(|| CodecError::invalid_key(format!("dangling reference {r}")))?;
    match object {
        Object::Date(t) if t.is_nan() => Err(CodecError::invalid_key("invalid Date")),
        Object::Date(t) => Ok(Key::Date(*t)),
        Object::ArrayBuffer(_) | Object::View { .. } => heap
            .buffer_source_bytes(r)
            .map(|bytes| Key::Binary(Bytes::copy_from_slice(bytes)))
            .ok_or_else(|| CodecError::invalid_key("view is out of bounds")),
        Object::Array { elements, .. } => {
            if seen.contains(&r) {
                return Err(CodecError::invalid_key("array contains itself"));
            }
            seen.push(r);
            elements
                .iter()
                .map(|element| match element {
                    Some(v) => convert(heap, v, seen),
                    None => Err(CodecError::invalid_key("sparse array")),
                })
                .collect::<CodecResult<Vec<_>>>()
                .map(Key::Array)
        }
        other => Err(CodecError::invalid_key(format!(
            "{} is not a valid key",
            other.class_name()
        ))),
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) | (Self::Date(a), Self::Date(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Self::String(a), Self::String(b)) => a.encode_utf16().cmp(b.encode_utf16()),
            (Self::Binary(a), Self::Binary(b)) => a.cmp(b),
            (Self::Array(a), Self::Array(b)) => a.cmp(b),
            _ => self.key_type().cmp(&other.key_type()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Date(t) => write!(f, "Date({t})"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Binary(b) => write!(f, "Binary({} bytes)", b.len()),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<f64> for Key {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Key>> for Key {
    fn from(items: Vec<Key>) -> Self {
        Self::Array(items)
    }
}
