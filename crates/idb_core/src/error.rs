//! Error types for the engine.
//!
//! Every error carries one of the exception names clients match on
//! (`ConstraintError`, `DataError`, ...), available through
//! [`IdbError::name`], plus a human-readable message.

use idb_codec::CodecError;
use idb_storage::StorageError;
use thiserror::Error;

/// Result type for engine operations.
pub type IdbResult<T> = Result<T, IdbError>;

/// Errors raised synchronously by engine calls or delivered to requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdbError {
    /// The transaction was aborted while the request was pending.
    #[error("AbortError: {message}")]
    Abort {
        /// Description.
        message: String,
    },

    /// A uniqueness or key generator constraint was violated.
    #[error("ConstraintError: {message}")]
    Constraint {
        /// Description.
        message: String,
    },

    /// A key or key path argument was invalid.
    #[error("DataError: {message}")]
    Data {
        /// Description.
        message: String,
    },

    /// A value could not be cloned.
    #[error("DataCloneError: {message}")]
    DataClone {
        /// Description.
        message: String,
    },

    /// The operation does not apply to this object.
    #[error("InvalidAccessError: {message}")]
    InvalidAccess {
        /// Description.
        message: String,
    },

    /// The object is in the wrong state for the operation.
    #[error("InvalidStateError: {message}")]
    InvalidState {
        /// Description.
        message: String,
    },

    /// A named object store, index or database does not exist.
    #[error("NotFoundError: {message}")]
    NotFound {
        /// Description.
        message: String,
    },

    /// A write was attempted in a read-only transaction.
    #[error("ReadOnlyError: {message}")]
    ReadOnly {
        /// Description.
        message: String,
    },

    /// A key path was malformed.
    #[error("SyntaxError: {message}")]
    Syntax {
        /// Description.
        message: String,
    },

    /// The transaction is not active.
    #[error("TransactionInactiveError: {message}")]
    TransactionInactive {
        /// Description.
        message: String,
    },

    /// An argument had the wrong shape or range.
    #[error("TypeError: {message}")]
    Type {
        /// Description.
        message: String,
    },

    /// An open request asked for a version lower than the current one.
    #[error("VersionError: {message}")]
    Version {
        /// Description.
        message: String,
    },

    /// The backing store failed.
    #[error("UnknownError: {message}")]
    Unknown {
        /// Description.
        message: String,
    },
}

macro_rules! constructors {
    ($($(#[$doc:meta])* $fn_name:ident => $variant:ident),* $(,)?) => {
        impl IdbError {
            $(
                $(#[$doc])*
                pub fn $fn_name(message: impl Into<String>) -> Self {
                    Self::$variant {
                        message: message.into(),
                    }
                }
            )*
        }
    };
}

constructors! {
    /// Creates an `AbortError`.
    abort => Abort,
    /// Creates a `ConstraintError`.
    constraint => Constraint,
    /// Creates a `DataError`.
    data => Data,
    /// Creates a `DataCloneError`.
    data_clone => DataClone,
    /// Creates an `InvalidAccessError`.
    invalid_access => InvalidAccess,
    /// Creates an `InvalidStateError`.
    invalid_state => InvalidState,
    /// Creates a `NotFoundError`.
    not_found => NotFound,
    /// Creates a `ReadOnlyError`.
    read_only => ReadOnly,
    /// Creates a `SyntaxError`.
    syntax => Syntax,
    /// Creates a `TransactionInactiveError`.
    transaction_inactive => TransactionInactive,
    /// Creates a `TypeError`.
    type_error => Type,
    /// Creates a `VersionError`.
    version => Version,
    /// Creates an `UnknownError`.
    unknown => Unknown,
}

impl IdbError {
    /// The exception name, e.g. `"ConstraintError"`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Abort { .. } => "AbortError",
            Self::Constraint { .. } => "ConstraintError",
            Self::Data { .. } => "DataError",
            Self::DataClone { .. } => "DataCloneError",
            Self::InvalidAccess { .. } => "InvalidAccessError",
            Self::InvalidState { .. } => "InvalidStateError",
            Self::NotFound { .. } => "NotFoundError",
            Self::ReadOnly { .. } => "ReadOnlyError",
            Self::Syntax { .. } => "SyntaxError",
            Self::TransactionInactive { .. } => "TransactionInactiveError",
            Self::Type { .. } => "TypeError",
            Self::Version { .. } => "VersionError",
            Self::Unknown { .. } => "UnknownError",
        }
    }

    /// The message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Abort { message }
            | Self::Constraint { message }
            | Self::Data { message }
            | Self::DataClone { message }
            | Self::InvalidAccess { message }
            | Self::InvalidState { message }
            | Self::NotFound { message }
            | Self::ReadOnly { message }
            | Self::Syntax { message }
            | Self::TransactionInactive { message }
            | Self::Type { message }
            | Self::Version { message }
            | Self::Unknown { message } => message,
        }
    }
}

impl From<CodecError> for IdbError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::InvalidKey { message } => Self::data(message),
            CodecError::DataClone { message } => Self::data_clone(message),
            other => Self::unknown(other.to_string()),
        }
    }
}

impl From<StorageError> for IdbError {
    fn from(err: StorageError) -> Self {
        Self::unknown(err.to_string())
    }
}
