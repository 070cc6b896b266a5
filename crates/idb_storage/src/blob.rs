//! Framed blob log on top of a [`StorageBackend`].

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use tracing::trace;

/// Marker byte opening every frame.
const FRAME_MAGIC: u8 = 0xB1;

/// Size of the frame header: magic byte + little-endian `u32` length.
pub const FRAME_HEADER_SIZE: usize = 5;

/// Where a wrapped value lives inside a [`BlobLog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobLocation {
    /// Offset of the frame header.
    pub offset: u64,
    /// Payload length in bytes.
    pub len: u32,
}

/// Append-only log of length-prefixed blobs.
///
/// Frames are never rewritten. A blob that is no longer referenced (for
/// example because the transaction that wrote it aborted) stays in the log
/// as dead space.
pub struct BlobLog {
    backend: Box<dyn StorageBackend>,
    dirty: bool,
}

impl BlobLog {
    /// Wraps a backend.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend,
            dirty: false,
        }
    }

    /// Appends a blob and returns its location.
    ///
    /// # Errors
    ///
    /// Fails if the payload does not fit a `u32` length or the backend
    /// rejects the write.
    pub fn write(&mut self, payload: &[u8]) -> StorageResult<BlobLocation> {
        let len = u32::try_from(payload.len()).map_err(|_| StorageError::BlobTooLarge(payload.len()))?;

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        frame.push(FRAME_MAGIC);
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(payload);

        let offset = self.backend.append(&frame)?;
        self.dirty = true;
        trace!(offset, len, "blob appended");
        Ok(BlobLocation { offset, len })
    }

    /// Reads the blob stored at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CorruptedFrame`] if the header at the offset
    /// does not describe the expected payload.
    pub fn read(&self, location: BlobLocation) -> StorageResult<Vec<u8>> {
        let header = self.backend.read_at(location.offset, FRAME_HEADER_SIZE)?;
        if header[0] != FRAME_MAGIC {
            return Err(StorageError::corrupted_frame(location.offset, "bad magic byte"));
        }
        let stored_len = u32::from_le_bytes([header[1], header[2], header[3], header[4]]);
        if stored_len != location.len {
            return Err(StorageError::corrupted_frame(
                location.offset,
                format!("length {stored_len} does not match reference {}", location.len),
            ));
        }
        self.backend
            .read_at(location.offset + FRAME_HEADER_SIZE as u64, location.len as usize)
    }

    /// Returns true if blobs were written since the last flush.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flushes the backend if anything was written; `sync` additionally
    /// forces metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn flush(&mut self, sync: bool) -> StorageResult<()> {
        if !self.dirty {
            return Ok(());
        }
        self.backend.flush()?;
        if sync {
            self.backend.sync()?;
        }
        self.dirty = false;
        Ok(())
    }

    /// Total bytes held by the backend, live or dead.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn size(&self) -> StorageResult<u64> {
        self.backend.size()
    }
}

impl std::fmt::Debug for BlobLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobLog")
            .field("size", &self.backend.size().ok())
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}
