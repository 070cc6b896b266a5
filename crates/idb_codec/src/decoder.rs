//! Decoding of order-preserving key bytes.

use crate::encoder::{
    from_sortable_bits, ESCAPE, TAG_ARRAY, TAG_BINARY, TAG_DATE, TAG_NUMBER, TAG_STRING,
    TERMINATOR,
};
use crate::error::{CodecError, CodecResult};
use crate::key::Key;
use bytes::Bytes;

/// Maximum array nesting accepted while decoding.
const MAX_DEPTH: usize = 512;

/// Decodes a key from bytes produced by [`encode_key`].
///
/// # Errors
///
/// Returns an error if the bytes are truncated, malformed, or have
/// trailing data.
///
/// [`encode_key`]: crate::encode_key
pub fn decode_key(bytes: &[u8]) -> CodecResult<Key> {
    let mut decoder = KeyDecoder::new(bytes);
    let key = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::decoding_failed("trailing bytes after key"));
    }
    Ok(key)
}

/// A decoder over encoded key bytes.
pub struct KeyDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> KeyDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
        }
    }

    /// Decode the next key.
    pub fn decode(&mut self) -> CodecResult<Key> {
        match self.read_byte()? {
            TAG_NUMBER => self.read_number().map(Key::Number),
            TAG_DATE => self.read_number().map(Key::Date),
            TAG_STRING => {
                let raw = self.read_escaped()?;
                if raw.len() % 2 != 0 {
                    return Err(CodecError::InvalidUtf16);
                }
                let units: Vec<u16> = raw
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units)
                    .map(Key::String)
                    .map_err(|_| CodecError::InvalidUtf16)
            }
            TAG_BINARY => self.read_escaped().map(|raw| Key::Binary(Bytes::from(raw))),
            TAG_ARRAY => {
                self.depth += 1;
                if self.depth > MAX_DEPTH {
                    return Err(CodecError::decoding_failed("array nesting too deep"));
                }
                let mut items = Vec::new();
                while self.peek_byte()? != TERMINATOR {
                    items.push(self.decode()?);
                }
                self.pos += 1;
                self.depth -= 1;
                Ok(Key::Array(items))
            }
            tag => Err(CodecError::UnknownTag(tag)),
        }
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn read_byte(&mut self) -> CodecResult<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        Ok(b)
    }

    fn peek_byte(&self) -> CodecResult<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(CodecError::UnexpectedEof)
    }

    fn read_number(&mut self) -> CodecResult<f64> {
        let end = self.pos + 8;
        let bytes: [u8; 8] = self
            .data
            .get(self.pos..end)
            .and_then(|s| s.try_into().ok())
            .ok_or(CodecError::UnexpectedEof)?;
        self.pos = end;
        Ok(from_sortable_bits(u64::from_be_bytes(bytes)))
    }

    fn read_escaped(&mut self) -> CodecResult<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let b = self.read_byte()?;
            if b != TERMINATOR {
                out.push(b);
                continue;
            }
            if self.data.get(self.pos) == Some(&ESCAPE) {
                self.pos += 1;
                out.push(TERMINATOR);
            } else {
                return Ok(out);
            }
        }
    }
}
