//! Keyword summary and keyword-index decoding.
//!
//! After the header come the keyword summary fields, the (possibly
//! compressed and encrypted) keyword index, and the keyword blocks laid out
//! contiguously. The index describes one entry per keyword block: entry
//! count, first/last word, and compressed/decompressed sizes. Absolute
//! block offsets and cumulative ordinals are computed while walking it.

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, info};

use crate::codec::{compression, crypto};
use crate::scanner::Scanner;
use crate::source::ByteSource;
use crate::types::error::{MdictError, Result};
use crate::types::models::{CompressionType, KeywordIndexEntry, MdictHeader, MdictVersion};

/// The decoded keyword section: the block directory plus layout facts the
/// record section parser needs.
pub struct KeywordSection {
    pub entries: Vec<KeywordIndexEntry>,
    pub num_entries: u64,
    /// Offset of the first byte after the last keyword block.
    pub end_offset: u64,
}

/// Parses the keyword summary and index starting at `offset` (the first
/// byte after the header region).
pub fn parse(source: &dyn ByteSource, header: &MdictHeader, offset: u64) -> Result<KeywordSection> {
    let summary_len = match header.version {
        MdictVersion::V1 => 16,
        MdictVersion::V2 => 44,
    };
    let summary = source.read_vec(offset, summary_len)?;
    let mut scanner = Scanner::new(&summary, header);

    let num_blocks = scanner.read_num()?;
    let num_entries = scanner.read_num()?;
    let key_index_decomp_len = match header.version {
        MdictVersion::V1 => None,
        MdictVersion::V2 => Some(scanner.read_num()?),
    };
    let key_index_comp_len = scanner.read_num()?;
    let key_blocks_len = scanner.read_num()?;
    if header.version == MdictVersion::V2 {
        scanner.skip_checksum()?;
    }
    debug!(
        "keyword summary: {} blocks, {} entries, index {} bytes",
        num_blocks, num_entries, key_index_comp_len
    );

    let index_offset = offset + summary_len as u64;
    let index_comp = source.read_vec(index_offset, key_index_comp_len as usize)?;
    let index_data = decode_index(&index_comp, key_index_decomp_len, header)?;

    let first_block_offset = index_offset + key_index_comp_len;
    let mut entries = Vec::with_capacity(num_blocks as usize);
    let mut scanner = Scanner::new(&index_data, header);
    let mut file_offset = first_block_offset;
    let mut first_ordinal = 0u64;

    while !scanner.is_empty() {
        let block_entries = scanner.read_num()?;
        let first_len = scanner.read_short()?;
        let first_word = scanner.read_text_sized(first_len as usize)?;
        let last_len = scanner.read_short()?;
        let last_word = scanner.read_text_sized(last_len as usize)?;
        let compressed_size = scanner.read_num()?;
        let decompressed_size = scanner.read_num()?;

        entries.push(KeywordIndexEntry {
            num_entries: block_entries,
            first_word,
            last_word,
            compressed_size,
            decompressed_size,
            file_offset,
            first_ordinal,
        });
        file_offset += compressed_size;
        first_ordinal += block_entries;
    }

    if entries.len() as u64 != num_blocks {
        return Err(MdictError::MalformedBlock(format!(
            "keyword index declares {} blocks but holds {}",
            num_blocks,
            entries.len()
        )));
    }
    if first_ordinal != num_entries {
        return Err(MdictError::MalformedBlock(format!(
            "keyword index entry counts sum to {} but the summary declares {}",
            first_ordinal, num_entries
        )));
    }
    let end_offset = first_block_offset + key_blocks_len;
    if file_offset != end_offset {
        return Err(MdictError::MalformedBlock(
            "keyword block sizes disagree with the summary".to_string(),
        ));
    }

    info!(
        "keyword directory: {} blocks, {} entries",
        entries.len(),
        num_entries
    );
    Ok(KeywordSection {
        entries,
        num_entries,
        end_offset,
    })
}

/// Decodes the keyword-index region into its plain form.
///
/// v2 wraps the index in a block (compression tag, checksum field, payload)
/// and encrypts the payload when `Encrypted & 0x02` is set; v1 stores the
/// index raw.
fn decode_index(comp: &[u8], decomp_len: Option<u64>, header: &MdictHeader) -> Result<Vec<u8>> {
    let Some(decomp_len) = decomp_len else {
        return Ok(comp.to_vec());
    };

    if comp.len() < 8 {
        return Err(MdictError::MalformedBlock(
            "keyword index shorter than its preamble".to_string(),
        ));
    }
    let tag = CompressionType::try_from(LittleEndian::read_u32(&comp[0..4]))?;

    // The checksum field is skipped, but it seeds the passkey derivation.
    let mut payload = comp[8..].to_vec();
    if header.encryption.key_index_encrypted {
        debug!("keyword index is encrypted, deriving passkey");
        let mut checksum = [0u8; 4];
        checksum.copy_from_slice(&comp[4..8]);
        let key = crypto::keyword_index_key(&checksum);
        crypto::rotating_xor_decrypt(&mut payload, &key);
    }

    compression::decompress(&payload, tag, decomp_len)
}
