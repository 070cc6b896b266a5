//! Serialized form of structured values.
//!
//! Values are written as CBOR through serde. The serialized length is what
//! decides whether a record is stored inline or out-of-line.

use crate::error::{CodecError, CodecResult};
use crate::value::StructuredValue;

impl StructuredValue {
    /// Serializes the value to CBOR.
    ///
    /// # Errors
    ///
    /// Fails if the value still holds accessor properties, which only
    /// uncloned values do.
    pub fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(self, &mut out)
            .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
        Ok(out)
    }

    /// Deserializes a value written by [`StructuredValue::to_bytes`].
    ///
    /// # Errors
    ///
    /// Fails if the bytes are not a serialized structured value.
    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
    }

    /// Length of the serialized form.
    ///
    /// # Errors
    ///
    /// Same as [`StructuredValue::to_bytes`].
    pub fn serialized_len(&self) -> CodecResult<usize> {
        self.to_bytes().map(|b| b.len())
    }
}
