//! Record summary and record-block directory.
//!
//! The record section opens with four numbers (block count, entry count,
//! index length, data length) followed by `(compressed, decompressed)` size
//! pairs, one per record block. Running sums over those pairs give every
//! block's absolute file offset and its offset in the concatenated
//! decompressed record stream.

use log::{debug, info};

use crate::scanner::Scanner;
use crate::source::ByteSource;
use crate::types::error::{MdictError, Result};
use crate::types::models::{MdictHeader, RecordBlockMeta};

/// Ordered directory of record blocks.
///
/// Both the file-offset and the decompressed-offset columns are strictly
/// increasing, which makes block location a binary search.
pub struct RecordDirectory {
    blocks: Vec<RecordBlockMeta>,
    total_decompressed: u64,
}

impl RecordDirectory {
    pub fn blocks(&self) -> &[RecordBlockMeta] {
        &self.blocks
    }

    /// Total size of the decompressed record stream.
    pub fn total_decompressed(&self) -> u64 {
        self.total_decompressed
    }

    /// Locates the block containing `record_offset` in the concatenated
    /// decompressed record stream. Absent when the offset lies past the end.
    pub fn find(&self, record_offset: u64) -> Option<(usize, &RecordBlockMeta)> {
        if self.blocks.is_empty() || record_offset >= self.total_decompressed {
            return None;
        }
        let index = self
            .blocks
            .partition_point(|block| block.decompressed_offset <= record_offset)
            - 1;
        Some((index, &self.blocks[index]))
    }
}

/// Parses the record summary and record-block index starting at `offset`
/// (the first byte after the keyword blocks).
pub fn parse(
    source: &dyn ByteSource,
    header: &MdictHeader,
    offset: u64,
    expected_entries: u64,
) -> Result<RecordDirectory> {
    let summary_len = 4 * header.version.number_width();
    let summary = source.read_vec(offset, summary_len)?;
    let mut scanner = Scanner::new(&summary, header);

    let num_blocks = scanner.read_num()?;
    let num_entries = scanner.read_num()?;
    let index_len = scanner.read_num()?;
    let blocks_len = scanner.read_num()?;
    debug!(
        "record summary: {} blocks, {} entries, index {} bytes, data {} bytes",
        num_blocks, num_entries, index_len, blocks_len
    );

    if num_entries != expected_entries {
        return Err(MdictError::MalformedBlock(format!(
            "record section declares {} entries but the keyword section holds {}",
            num_entries, expected_entries
        )));
    }

    let index_offset = offset + summary_len as u64;
    let index_bytes = source.read_vec(index_offset, index_len as usize)?;
    let first_block_offset = index_offset + index_len;

    let mut blocks = Vec::with_capacity(num_blocks as usize);
    let mut scanner = Scanner::new(&index_bytes, header);
    let mut file_offset = first_block_offset;
    let mut decompressed_offset = 0u64;

    while !scanner.is_empty() {
        let compressed_size = scanner.read_num()?;
        let decompressed_size = scanner.read_num()?;
        blocks.push(RecordBlockMeta {
            compressed_size,
            decompressed_size,
            file_offset,
            decompressed_offset,
        });
        file_offset += compressed_size;
        decompressed_offset += decompressed_size;
    }

    if blocks.len() as u64 != num_blocks {
        return Err(MdictError::MalformedBlock(format!(
            "record index declares {} blocks but holds {}",
            num_blocks,
            blocks.len()
        )));
    }
    if file_offset != first_block_offset + blocks_len {
        return Err(MdictError::MalformedBlock(
            "record block sizes disagree with the summary".to_string(),
        ));
    }

    info!(
        "record directory: {} blocks, {} decompressed bytes",
        blocks.len(),
        decompressed_offset
    );
    Ok(RecordDirectory {
        blocks,
        total_decompressed: decompressed_offset,
    })
}
