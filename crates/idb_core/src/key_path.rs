//! Key paths.
//!
//! A key path names where a record's key lives inside its value: either a
//! dotted string such as `"address.city"` (the empty string means the value
//! itself) or a non-empty list of such strings whose results form an array
//! key.
//!
//! Paths only ever see own data properties of the stored clone, plus a few
//! implicit properties: `length` of strings and arrays, `size` and `type` of
//! blobs and files, and `name` and `lastModified` of files.

use crate::error::IdbResult;
use idb_codec::{Heap, Key, Object, StructuredValue, Value};
use std::fmt;

/// A key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPath {
    /// A single dotted path.
    String(String),
    /// A list of dotted paths producing an array key.
    Array(Vec<String>),
}

/// Result of extracting a key from a value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Extracted {
    /// The path resolved to a valid key.
    Key(Key),
    /// The path resolved to something that is not a valid key.
    Invalid,
    /// Some identifier along the path did not resolve.
    Failure,
}

impl KeyPath {
    /// Returns true if every path is empty or a dot-separated list of
    /// identifier names, and an array path is non-empty.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            Self::String(path) => is_valid_path(path),
            Self::Array(paths) => !paths.is_empty() && paths.iter().all(|p| is_valid_path(p)),
        }
    }

    /// Returns true for array key paths.
    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Returns the path if this is a string key path.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(path) => Some(path),
            Self::Array(_) => None,
        }
    }

    /// Extracts a key from `value`.
    pub(crate) fn extract(&self, value: &StructuredValue) -> Extracted {
        match self {
            Self::String(path) => match evaluate(value.heap(), value.root(), path) {
                None => Extracted::Failure,
                Some(v) => Key::from_value(value.heap(), &v)
                    .map_or(Extracted::Invalid, Extracted::Key),
            },
            Self::Array(paths) => {
                let mut keys = Vec::with_capacity(paths.len());
                for path in paths {
                    let Some(v) = evaluate(value.heap(), value.root(), path) else {
                        return Extracted::Failure;
                    };
                    match Key::from_value(value.heap(), &v) {
                        Ok(key) => keys.push(key),
                        Err(_) => return Extracted::Invalid,
                    }
                }
                Extracted::Key(Key::Array(keys))
            }
        }
    }

    /// Extracts the keys a multiEntry index records for `value`.
    ///
    /// Fails with `DataError` when the path yields an array holding an
    /// invalid key.
    pub(crate) fn extract_multi_entry(&self, value: &StructuredValue) -> IdbResult<Vec<Key>> {
        match self {
            Self::String(path) => match evaluate(value.heap(), value.root(), path) {
                Some(v) => Ok(Key::multi_entry_from_value(value.heap(), &v)?),
                None => Ok(Vec::new()),
            },
            Self::Array(_) => Ok(match self.extract(value) {
                Extracted::Key(key) => vec![key],
                Extracted::Invalid | Extracted::Failure => Vec::new(),
            }),
        }
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(path) => write!(f, "{path:?}"),
            Self::Array(paths) => write!(f, "{paths:?}"),
        }
    }
}

impl From<&str> for KeyPath {
    fn from(path: &str) -> Self {
        Self::String(path.to_string())
    }
}

impl From<String> for KeyPath {
    fn from(path: String) -> Self {
        Self::String(path)
    }
}

impl From<Vec<&str>> for KeyPath {
    fn from(paths: Vec<&str>) -> Self {
        Self::Array(paths.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for KeyPath {
    fn from(paths: [&str; N]) -> Self {
        Self::Array(paths.iter().map(|p| (*p).to_string()).collect())
    }
}

fn is_valid_path(path: &str) -> bool {
    path.is_empty() || path.split('.').all(is_identifier_name)
}

fn is_identifier_name(ident: &str) -> bool {
    let mut chars = ident.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '$' || first == '_')
        && chars.all(|c| {
            c.is_alphanumeric() || c == '$' || c == '_' || c == '\u{200C}' || c == '\u{200D}'
        })
}

/// Evaluates a single dotted path. `None` means some identifier did not
/// resolve.
pub(crate) fn evaluate(heap: &Heap, root: &Value, path: &str) -> Option<Value> {
    if path.is_empty() {
        return Some(root.clone());
    }
    let mut current = root.clone();
    for ident in path.split('.') {
        current = property(heap, &current, ident)?;
        if current.is_undefined() {
            return None;
        }
    }
    Some(current)
}

fn property(heap: &Heap, value: &Value, ident: &str) -> Option<Value> {
    match value {
        Value::String(s) if ident == "length" => Some(utf16_length(s)),
        Value::Object(r) => match heap.get(*r)? {
            Object::Ordinary { .. } => heap.own_data_property(*r, ident).cloned(),
            Object::Array { elements, .. } if ident == "length" => {
                Some(Value::Number(elements.len() as f64))
            }
            Object::Array { .. } => heap.own_data_property(*r, ident).cloned(),
            Object::Blob(blob) => match ident {
                "size" => Some(Value::Number(blob.data.len() as f64)),
                "type" => Some(Value::String(blob.mime_type.clone())),
                _ => None,
            },
            Object::File(file) => match ident {
                "size" => Some(Value::Number(file.blob.data.len() as f64)),
                "type" => Some(Value::String(file.blob.mime_type.clone())),
                "name" => Some(Value::String(file.name.clone())),
                "lastModified" => Some(Value::Number(file.last_modified)),
                _ => None,
            },
            _ => None,
        },
        _ => None,
    }
}

fn utf16_length(s: &str) -> Value {
    Value::Number(s.encode_utf16().count() as f64)
}

/// Returns true if a generated key could be written at `path` inside
/// `value`.
///
/// Every existing hop must be an ordinary object or an array; the walk stops
/// early with success at the first missing identifier, since injection
/// creates the rest.
pub(crate) fn can_inject(value: &StructuredValue, path: &str) -> bool {
    let heap = value.heap();
    let mut idents: Vec<&str> = path.split('.').collect();
    idents.pop();
    let mut current = value.root().clone();
    for ident in idents {
        let Some(r) = injectable(heap, &current) else {
            return false;
        };
        match heap.own_data_property(r, ident) {
            Some(next) => current = next.clone(),
            None => return true,
        }
    }
    injectable(heap, &current).is_some()
}

/// Writes `key` at `path` inside `value`, creating intermediate objects.
///
/// Callers check [`can_inject`] first; if a hop cannot hold properties
/// nothing is written.
pub(crate) fn inject(value: &mut StructuredValue, path: &str, key: &Key) {
    let mut idents: Vec<&str> = path.split('.').collect();
    let Some(last) = idents.pop() else {
        return;
    };
    let mut current = value.root().clone();
    for ident in idents {
        let heap = value.heap_mut();
        let Some(r) = injectable(heap, &current) else {
            return;
        };
        current = match heap.own_data_property(r, ident) {
            Some(next) => next.clone(),
            None => {
                let created = heap.object::<&str>([]);
                heap.set_property(r, ident, created.clone());
                created
            }
        };
    }
    let heap = value.heap_mut();
    if let Some(r) = injectable(heap, &current) {
        let key_value = key.to_value(heap);
        heap.set_property(r, last, key_value);
    }
}

fn injectable(heap: &Heap, value: &Value) -> Option<idb_codec::ObjectRef> {
    let r = value.as_object()?;
    matches!(heap.get(r)?, Object::Ordinary { .. } | Object::Array { .. }).then_some(r)
}
