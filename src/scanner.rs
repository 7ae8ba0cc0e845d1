//! Positioned cursor over an in-memory byte buffer.
//!
//! The scanner owns every version- and encoding-dependent primitive decode
//! so that the layers above it stay agnostic of the v1/v2 wire differences.
//! Scanners are cheap; one is spawned per parsed region.

use byteorder::{BigEndian, ByteOrder};
use encoding_rs::UTF_16LE;

use crate::types::error::{MdictError, Result};
use crate::types::models::{MdictHeader, MdictVersion};

pub struct Scanner<'a> {
    buf: &'a [u8],
    pos: usize,
    header: &'a MdictHeader,
}

impl<'a> Scanner<'a> {
    pub fn new(buf: &'a [u8], header: &'a MdictHeader) -> Self {
        Self {
            buf,
            pos: 0,
            header,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                MdictError::MalformedBlock(format!(
                    "short read: wanted {} bytes, {} left",
                    len,
                    self.remaining()
                ))
            })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(BigEndian::read_u64(self.take(8)?))
    }

    /// Version-aware number field.
    ///
    /// v2 files store 8 bytes of which only the low 32 bits may be set;
    /// anything larger means the file addresses past the 4 GiB limit and
    /// cannot be read without corrupting offsets.
    pub fn read_num(&mut self) -> Result<u64> {
        match self.header.version {
            MdictVersion::V1 => Ok(u64::from(self.read_u32()?)),
            MdictVersion::V2 => {
                let value = self.read_u64()?;
                if value > u64::from(u32::MAX) {
                    return Err(MdictError::MalformedBlock(format!(
                        "number field {:#x} exceeds the 32-bit offset range",
                        value
                    )));
                }
                Ok(value)
            }
        }
    }

    /// Version-aware short field (text-length prefixes).
    pub fn read_short(&mut self) -> Result<u64> {
        match self.header.version {
            MdictVersion::V1 => Ok(u64::from(self.read_u8()?)),
            MdictVersion::V2 => Ok(u64::from(self.read_u16()?)),
        }
    }

    /// Fixed UTF-16LE decode of `len_bytes` bytes, whatever the configured
    /// encoding.
    pub fn read_utf16le(&mut self, len_bytes: usize) -> Result<String> {
        let bytes = self.take(len_bytes)?;
        let (text, _, _) = UTF_16LE.decode(bytes);
        Ok(text.into_owned())
    }

    /// NUL-terminated text in the configured encoding.
    ///
    /// The terminator is one code unit wide (two bytes under UTF-16) and is
    /// consumed along with the text.
    pub fn read_text(&mut self) -> Result<String> {
        let width = self.header.unit_width();
        let rest = &self.buf[self.pos..];
        let end = if width == 2 {
            rest.chunks_exact(2)
                .position(|unit| unit == [0, 0])
                .map(|units| units * 2)
        } else {
            rest.iter().position(|&b| b == 0)
        }
        .ok_or_else(|| MdictError::MalformedBlock("unterminated text".to_string()))?;

        let bytes = self.take(end)?;
        let (text, _, _) = self.header.encoding.decode(bytes);
        self.skip(width)?;
        Ok(text.into_owned())
    }

    /// Sized text: exactly `count_units` code units, then the v2 tail unit.
    pub fn read_text_sized(&mut self, count_units: usize) -> Result<String> {
        let width = self.header.unit_width();
        let tail = self.header.version.text_tail_units() * width;
        let bytes = self.take(count_units * width)?;
        let (text, _, _) = self.header.encoding.decode(bytes);
        self.skip(tail)?;
        Ok(text.into_owned())
    }

    /// Returns a view over `len` bytes and advances.
    pub fn read_raw(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    /// Advances past a 4-byte checksum field without validating it.
    pub fn skip_checksum(&mut self) -> Result<()> {
        self.skip(4)
    }
}
