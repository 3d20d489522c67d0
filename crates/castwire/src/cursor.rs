//! # Cursors
//!
//! Bounds-checked views for reading and appending little-endian wire fields.
//! Every field access goes through `Reader::need`, so call sites never index
//! into raw buffers themselves.

use crate::error::Error;
use crate::error::Result;
use crate::types::CallbackRef;

/// A cursor tracking a read position within a borrowed slice.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    slice: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(slice: &'a [u8]) -> Self {
        Self { slice, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.slice.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    #[inline]
    fn need(&self, n: usize) -> Result<()> {
        if n > self.remaining() {
            Err(Error::UnexpectedEnd { wanted: n, available: self.remaining() })
        } else {
            Ok(())
        }
    }

    /// Returns the next byte without consuming it.
    pub fn peek_u8(&self) -> Result<u8> {
        self.need(1)?;
        Ok(self.slice[self.pos])
    }

    pub fn get_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.need(len)?;
        let bytes = &self.slice[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn get_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.get_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.get_array::<1>()?[0])
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.get_array()?))
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.get_array()?))
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.get_array()?))
    }

    pub fn get_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.get_array()?))
    }

    pub fn get_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.get_array()?))
    }

    pub fn get_callback(&mut self) -> Result<CallbackRef> {
        Ok(CallbackRef(self.get_u64()?))
    }

    /// Reads a u32 length prefix followed by that many bytes.
    pub fn get_dynamic(&mut self) -> Result<&'a [u8]> {
        let len = self.get_u32()? as usize;
        self.get_bytes(len)
    }

    /// Reads a NUL terminated UTF-8 string and consumes the terminator.
    pub fn get_cstr(&mut self) -> Result<&'a str> {
        let rest = &self.slice[self.pos..];
        let end = rest.iter().position(|b| *b == 0).ok_or(Error::MissingTerminator)?;
        let name = std::str::from_utf8(&rest[..end]).map_err(|_| Error::InvalidUtf8)?;
        self.pos += end + 1;
        Ok(name)
    }

    /// Consumes and returns everything left.
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = &self.slice[self.pos..];
        self.pos = self.slice.len();
        rest
    }
}

/// Appends little-endian fields to a borrowed byte vector.
///
/// Writers never fail; capacity policy belongs to whoever owns the vector.
pub struct Writer<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> Writer<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        Self { buf }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn put_u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn put_u16(&mut self, v: u16) -> &mut Self {
        self.put_bytes(&v.to_le_bytes())
    }

    pub fn put_u32(&mut self, v: u32) -> &mut Self {
        self.put_bytes(&v.to_le_bytes())
    }

    pub fn put_u64(&mut self, v: u64) -> &mut Self {
        self.put_bytes(&v.to_le_bytes())
    }

    pub fn put_i32(&mut self, v: i32) -> &mut Self {
        self.put_bytes(&v.to_le_bytes())
    }

    pub fn put_i64(&mut self, v: i64) -> &mut Self {
        self.put_bytes(&v.to_le_bytes())
    }

    pub fn put_callback(&mut self, r: CallbackRef) -> &mut Self {
        self.put_u64(r.0)
    }

    /// Writes a u32 length prefix followed by the bytes.
    pub fn put_dynamic(&mut self, bytes: &[u8]) -> &mut Self {
        self.put_u32(bytes.len() as u32).put_bytes(bytes)
    }
}
