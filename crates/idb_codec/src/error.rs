//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while converting, cloning, encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A value could not be converted to a valid key.
    #[error("invalid key: {message}")]
    InvalidKey {
        /// Why the value is not a valid key.
        message: String,
    },

    /// A value cannot be structured-cloned.
    #[error("value could not be cloned: {message}")]
    DataClone {
        /// Description of the offending value.
        message: String,
    },

    /// Failed to serialize a structured value.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode bytes.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// Invalid UTF-16 inside an encoded string key.
    #[error("invalid UTF-16 string")]
    InvalidUtf16,

    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Unknown type tag inside an encoded key.
    #[error("unknown key tag 0x{0:02x}")]
    UnknownTag(u8),
}

impl CodecError {
    /// Create an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Create a data clone error.
    pub fn data_clone(message: impl Into<String>) -> Self {
        Self::DataClone {
            message: message.into(),
        }
    }

    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }
}
