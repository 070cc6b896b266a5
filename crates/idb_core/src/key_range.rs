//! Key ranges and queries.

use crate::error::{IdbError, IdbResult};
use idb_codec::{encode_key, Key};
use std::ops::Bound;

/// A continuous interval over keys.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRange {
    lower: Option<Key>,
    upper: Option<Key>,
    lower_open: bool,
    upper_open: bool,
}

impl KeyRange {
    /// A range containing exactly `key`.
    ///
    /// # Errors
    ///
    /// `DataError` if the key is invalid.
    pub fn only(key: Key) -> IdbResult<Self> {
        let key = valid(key)?;
        Ok(Self {
            lower: Some(key.clone()),
            upper: Some(key),
            lower_open: false,
            upper_open: false,
        })
    }

    /// All keys above `key` (or equal unless `open`).
    ///
    /// # Errors
    ///
    /// `DataError` if the key is invalid.
    pub fn lower_bound(key: Key, open: bool) -> IdbResult<Self> {
        Ok(Self {
            lower: Some(valid(key)?),
            upper: None,
            lower_open: open,
            upper_open: true,
        })
    }

    /// All keys below `key` (or equal unless `open`).
    ///
    /// # Errors
    ///
    /// `DataError` if the key is invalid.
    pub fn upper_bound(key: Key, open: bool) -> IdbResult<Self> {
        Ok(Self {
            lower: None,
            upper: Some(valid(key)?),
            lower_open: true,
            upper_open: open,
        })
    }

    /// Keys between `lower` and `upper`.
    ///
    /// # Errors
    ///
    /// `DataError` if either key is invalid, if `lower > upper`, or if the
    /// bounds are equal and either side is open.
    pub fn bound(lower: Key, upper: Key, lower_open: bool, upper_open: bool) -> IdbResult<Self> {
        let lower = valid(lower)?;
        let upper = valid(upper)?;
        if lower > upper {
            return Err(IdbError::data("lower bound is greater than upper bound"));
        }
        if lower == upper && (lower_open || upper_open) {
            return Err(IdbError::data("equal bounds with an open side are empty"));
        }
        Ok(Self {
            lower: Some(lower),
            upper: Some(upper),
            lower_open,
            upper_open,
        })
    }

    /// The unbounded range.
    #[must_use]
    pub fn all() -> Self {
        Self {
            lower: None,
            upper: None,
            lower_open: true,
            upper_open: true,
        }
    }

    /// The lower bound, if any.
    #[must_use]
    pub fn lower(&self) -> Option<&Key> {
        self.lower.as_ref()
    }

    /// The upper bound, if any.
    #[must_use]
    pub fn upper(&self) -> Option<&Key> {
        self.upper.as_ref()
    }

    /// Whether the lower bound excludes its key.
    #[must_use]
    pub fn lower_open(&self) -> bool {
        self.lower_open
    }

    /// Whether the upper bound excludes its key.
    #[must_use]
    pub fn upper_open(&self) -> bool {
        self.upper_open
    }

    /// Returns true if `key` falls inside the range.
    ///
    /// # Errors
    ///
    /// `DataError` if the key is invalid.
    pub fn includes(&self, key: &Key) -> IdbResult<bool> {
        if !key.is_valid() {
            return Err(IdbError::data("invalid key"));
        }
        Ok(self.contains(key))
    }

    pub(crate) fn contains(&self, key: &Key) -> bool {
        let above = match &self.lower {
            None => true,
            Some(lower) if self.lower_open => key > lower,
            Some(lower) => key >= lower,
        };
        let below = match &self.upper {
            None => true,
            Some(upper) if self.upper_open => key < upper,
            Some(upper) => key <= upper,
        };
        above && below
    }

    /// Bounds over encoded keys, for ranging over a store's records.
    pub(crate) fn encoded_bounds(&self) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
        let encode = |key: &Option<Key>, open: bool| match key {
            None => Bound::Unbounded,
            Some(k) if open => Bound::Excluded(encode_key(k)),
            Some(k) => Bound::Included(encode_key(k)),
        };
        (
            encode(&self.lower, self.lower_open),
            encode(&self.upper, self.upper_open),
        )
    }

    /// Bounds over `(index key, primary key)` pairs, for ranging over an
    /// index.
    ///
    /// Encoded keys are prefix-free, so appending a zero byte to an encoded
    /// key yields a value above that key and below every larger key.
    pub(crate) fn index_bounds(&self) -> (Bound<IndexEntry>, Bound<IndexEntry>) {
        let lower = match &self.lower {
            None => Bound::Unbounded,
            Some(k) if self.lower_open => Bound::Included((successor(k), Vec::new())),
            Some(k) => Bound::Included((encode_key(k), Vec::new())),
        };
        let upper = match &self.upper {
            None => Bound::Unbounded,
            Some(k) if self.upper_open => Bound::Excluded((encode_key(k), Vec::new())),
            Some(k) => Bound::Excluded((successor(k), Vec::new())),
        };
        (lower, upper)
    }
}

/// An index entry: encoded index key then encoded primary key.
pub(crate) type IndexEntry = (Vec<u8>, Vec<u8>);

/// Smallest byte string above the encoding of `key` that is below the
/// encodings of all larger keys.
pub(crate) fn successor(key: &Key) -> Vec<u8> {
    let mut bytes = encode_key(key);
    bytes.push(0);
    bytes
}

fn valid(key: Key) -> IdbResult<Key> {
    key.validate().map_err(IdbError::from)
}

/// Returns false if a `BTreeMap::range` over these bounds would panic.
pub(crate) fn bounds_ordered<T: Ord>(lower: &Bound<T>, upper: &Bound<T>) -> bool {
    match (lower, upper) {
        (Bound::Included(a) | Bound::Excluded(a), Bound::Included(b) | Bound::Excluded(b)) => {
            a < b
                || (a == b
                    && !(matches!(lower, Bound::Excluded(_))
                        && matches!(upper, Bound::Excluded(_))))
        }
        _ => true,
    }
}

/// The query argument of store and index requests.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// A single key.
    Key(Key),
    /// A key range.
    Range(KeyRange),
    /// No restriction.
    All,
}

impl Query {
    /// Converts to a range. With `null_disallowed`, [`Query::All`] is a
    /// `DataError`.
    pub(crate) fn into_range(self, null_disallowed: bool) -> IdbResult<KeyRange> {
        match self {
            Self::Key(key) => KeyRange::only(key),
            Self::Range(range) => Ok(range),
            Self::All if null_disallowed => Err(IdbError::data("a key or key range is required")),
            Self::All => Ok(KeyRange::all()),
        }
    }
}

impl From<Key> for Query {
    fn from(key: Key) -> Self {
        Self::Key(key)
    }
}

impl From<KeyRange> for Query {
    fn from(range: KeyRange) -> Self {
        Self::Range(range)
    }
}

impl From<Option<KeyRange>> for Query {
    fn from(range: Option<KeyRange>) -> Self {
        range.map_or(Self::All, Self::Range)
    }
}

impl From<f64> for Query {
    fn from(n: f64) -> Self {
        Self::Key(Key::Number(n))
    }
}

impl From<i32> for Query {
    fn from(n: i32) -> Self {
        Self::Key(Key::from(n))
    }
}

impl From<&str> for Query {
    fn from(s: &str) -> Self {
        Self::Key(Key::from(s))
    }
}
