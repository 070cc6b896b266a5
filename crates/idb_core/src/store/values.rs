//! Record value storage.
//!
//! Small values are held inline. Values whose serialized form is larger
//! than the configured threshold are appended to the value log and replaced
//! by their location ("wrapped"). The log is append-only, so rolling back a
//! transaction just drops the references it created.

use crate::error::IdbResult;
use crate::stats::EngineStats;
use idb_codec::StructuredValue;
use idb_storage::{BlobLocation, BlobLog, StorageBackend};
use std::sync::Arc;
use tracing::trace;

/// A stored record value.
#[derive(Debug, Clone)]
pub(crate) enum RecordValue {
    Inline(Arc<StructuredValue>),
    Wrapped(BlobLocation),
}

impl RecordValue {
    pub(crate) fn is_wrapped(&self) -> bool {
        matches!(self, Self::Wrapped(_))
    }
}

/// Value log plus the threshold deciding what goes into it.
pub(crate) struct ValueStore {
    log: BlobLog,
    threshold: usize,
    stats: Arc<EngineStats>,
}

impl ValueStore {
    pub(crate) fn new(
        backend: Box<dyn StorageBackend>,
        threshold: usize,
        stats: Arc<EngineStats>,
    ) -> Self {
        Self {
            log: BlobLog::new(backend),
            threshold,
            stats,
        }
    }

    /// Stores a value, wrapping it if it is large.
    pub(crate) fn wrap(&mut self, value: StructuredValue) -> IdbResult<RecordValue> {
        let bytes = value.to_bytes()?;
        if bytes.len() <= self.threshold {
            return Ok(RecordValue::Inline(Arc::new(value)));
        }
        let location = self.log.write(&bytes)?;
        self.stats.record_wrapped_value(bytes.len() as u64);
        trace!(offset = location.offset, len = bytes.len(), "wrapped value");
        Ok(RecordValue::Wrapped(location))
    }

    /// Returns the value a record refers to.
    pub(crate) fn load(&self, value: &RecordValue) -> IdbResult<Arc<StructuredValue>> {
        match value {
            RecordValue::Inline(v) => Ok(Arc::clone(v)),
            RecordValue::Wrapped(location) => {
                let bytes = self.log.read(*location)?;
                Ok(Arc::new(StructuredValue::from_bytes(&bytes)?))
            }
        }
    }

    /// Flushes pending log writes, if any.
    pub(crate) fn flush(&mut self, sync: bool) -> IdbResult<()> {
        if self.log.is_dirty() {
            self.log.flush(sync)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueStore")
            .field("threshold", &self.threshold)
            .field("dirty", &self.log.is_dirty())
            .finish_non_exhaustive()
    }
}
