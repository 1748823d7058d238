// Bounds-checked cursor over the patch stream.
//
// The reader covers the patch minus its 12-byte footer, so header fields,
// instruction words, literals and offsets can never be read out of the
// checksum trailer.

use super::error::{BufferKind, DecodeError};
use super::varint;

#[derive(Debug, Clone)]
pub struct PatchReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PatchReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Start reading at `pos`, clamped to the end of `data`.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos: pos.min(data.len()),
        }
    }

    /// Current offset from the start of the patch.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn read_u64(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        let (val, consumed) =
            varint::read_u64(&self.data[self.pos..]).map_err(|source| DecodeError::VarInt {
                field,
                offset: self.pos,
                source,
            })?;
        self.pos += consumed;
        Ok(val)
    }

    pub fn read_i64(&mut self, field: &'static str) -> Result<i64, DecodeError> {
        let (val, consumed) =
            varint::read_i64(&self.data[self.pos..]).map_err(|source| DecodeError::VarInt {
                field,
                offset: self.pos,
                source,
            })?;
        self.pos += consumed;
        Ok(val)
    }

    pub fn read_usize(&mut self, field: &'static str) -> Result<usize, DecodeError> {
        let (val, consumed) =
            varint::read_usize(&self.data[self.pos..]).map_err(|source| DecodeError::VarInt {
                field,
                offset: self.pos,
                source,
            })?;
        self.pos += consumed;
        Ok(val)
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if len > self.remaining() {
            return Err(DecodeError::OutOfBounds {
                buffer: BufferKind::Patch,
                offset: self.pos,
                len,
                limit: self.data.len(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), DecodeError> {
        self.read_bytes(len).map(|_| ())
    }
}
