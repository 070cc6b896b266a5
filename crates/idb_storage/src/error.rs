//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// A blob frame did not match the location that referenced it.
    #[error("corrupted blob frame at offset {offset}: {message}")]
    CorruptedFrame {
        /// Offset of the frame.
        offset: u64,
        /// What was wrong with it.
        message: String,
    },

    /// The blob is larger than a frame can describe.
    #[error("blob of {0} bytes exceeds the frame limit")]
    BlobTooLarge(usize),
}

impl StorageError {
    /// Creates a corrupted frame error.
    pub fn corrupted_frame(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptedFrame {
            offset,
            message: message.into(),
        }
    }
}
