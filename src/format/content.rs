//! Decoding of keyword and record blocks and the entries inside them.

use byteorder::{ByteOrder, LittleEndian};
use log::trace;

use crate::codec::compression;
use crate::scanner::Scanner;
use crate::types::error::{MdictError, Result};
use crate::types::models::{CompressionType, KeyEntry, MdictHeader};

/// Decodes one keyword or record block.
///
/// Blocks open with an 8-byte preamble: a 4-byte compression tag and a
/// 4-byte checksum field that is recognized and skipped. The rest is the
/// compressed payload.
pub fn decode_block(raw: &[u8], expected_decompressed_size: u64) -> Result<Vec<u8>> {
    if raw.len() < 8 {
        return Err(MdictError::MalformedBlock(format!(
            "block of {} bytes is shorter than its preamble",
            raw.len()
        )));
    }
    let tag = CompressionType::try_from(LittleEndian::read_u32(&raw[0..4]))?;
    trace!(
        "decoding block: tag={:?}, {} -> {} bytes",
        tag,
        raw.len() - 8,
        expected_decompressed_size
    );
    compression::decompress(&raw[8..], tag, expected_decompressed_size)
}

/// Parses the packed `(record_offset, keyword)` pairs of a decompressed
/// keyword block.
pub fn parse_key_entries(data: &[u8], header: &MdictHeader) -> Result<Vec<KeyEntry>> {
    let mut entries = Vec::new();
    let mut scanner = Scanner::new(data, header);
    while !scanner.is_empty() {
        let record_offset = scanner.read_num()?;
        let text = scanner.read_text()?;
        entries.push(KeyEntry {
            record_offset,
            text,
        });
    }
    Ok(entries)
}

/// Slices one record out of a decompressed record block.
///
/// `size` is absent only for the file's final record, which runs to the end
/// of its block.
pub fn record_slice(block: &[u8], offset_in_block: u64, size: Option<u64>) -> Result<&[u8]> {
    let start = offset_in_block as usize;
    let end = match size {
        Some(size) => start + size as usize,
        None => block.len(),
    };
    if start > end || end > block.len() {
        return Err(MdictError::MalformedBlock(format!(
            "record [{}..{}] out of bounds for a block of {} bytes",
            start,
            end,
            block.len()
        )));
    }
    Ok(&block[start..end])
}
