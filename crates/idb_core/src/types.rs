//! Identifier types.
//!
//! Every object the engine tracks is addressed by a numeric id drawn from a
//! single counter, so ids are unique across kinds and never reused. Client
//! handles carry ids rather than references.

use std::fmt;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);

        impl $name {
            /// Creates an id from its raw value.
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the raw id value.
            #[must_use]
            pub const fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Identifier for a database connection.
    ConnectionId,
    "conn"
);

define_id!(
    /// Identifier for a transaction.
    ///
    /// Transaction ids increase in creation order, which is the order the
    /// scheduler starts overlapping transactions in.
    TransactionId,
    "txn"
);

define_id!(
    /// Identifier for a request.
    RequestId,
    "req"
);

define_id!(
    /// Identifier for a cursor.
    CursorId,
    "cursor"
);

define_id!(
    /// Identifier for an object store. Stable across renames.
    StoreId,
    "store"
);

define_id!(
    /// Identifier for an index. Stable across renames.
    IndexId,
    "index"
);

/// Hands out ids in increasing order.
#[derive(Debug)]
pub(crate) struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub(crate) fn new() -> Self {
        Self { next: 1 }
    }

    pub(crate) fn next_raw(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}
