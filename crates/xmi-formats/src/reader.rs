//! Byte cursor over an in-memory file image.

use crate::{DecodeError, LoadError};

/// Read past the end of the data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Eof;

impl From<Eof> for LoadError {
    fn from(_: Eof) -> Self {
        LoadError::TruncatedContainer
    }
}

impl From<Eof> for DecodeError {
    fn from(_: Eof) -> Self {
        DecodeError::UnexpectedEof
    }
}

/// Cursor over a byte slice with explicit position control.
///
/// The container walker seeks freely (catalog offsets are absolute);
/// the event decoder only moves forward.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Cursor over `data` starting at `pos`.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn skip(&mut self, n: usize) -> Result<(), Eof> {
        if self.pos + n > self.data.len() {
            return Err(Eof);
        }
        self.pos += n;
        Ok(())
    }

    pub fn peek_u8(&self) -> Result<u8, Eof> {
        self.data.get(self.pos).copied().ok_or(Eof)
    }

    pub fn read_u8(&mut self) -> Result<u8, Eof> {
        let v = self.peek_u8()?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16_le(&mut self) -> Result<u16, Eof> {
        if self.pos + 2 > self.data.len() {
            return Err(Eof);
        }
        let v = u16::from_le_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u32_le(&mut self) -> Result<u32, Eof> {
        if self.pos + 4 > self.data.len() {
            return Err(Eof);
        }
        let v = u32::from_le_bytes([
            self.data[self.pos],
            self.data[self.pos + 1],
            self.data[self.pos + 2],
            self.data[self.pos + 3],
        ]);
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u32_be(&mut self) -> Result<u32, Eof> {
        if self.pos + 4 > self.data.len() {
            return Err(Eof);
        }
        let v = u32::from_be_bytes([
            self.data[self.pos],
            self.data[self.pos + 1],
            self.data[self.pos + 2],
            self.data[self.pos + 3],
        ]);
        self.pos += 4;
        Ok(v)
    }

    /// Read a 4-byte chunk identifier.
    pub fn read_tag(&mut self) -> Result<[u8; 4], Eof> {
        let tag = self.peek_tag()?;
        self.pos += 4;
        Ok(tag)
    }

    /// Look at the next 4 bytes without advancing.
    pub fn peek_tag(&self) -> Result<[u8; 4], Eof> {
        if self.pos + 4 > self.data.len() {
            return Err(Eof);
        }
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&self.data[self.pos..self.pos + 4]);
        Ok(tag)
    }
}
