//! Core data structures for the MDict on-disk format.

use std::collections::HashMap;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE};

use super::error::{MdictError, Result};

/// Type alias for the text encoding used in MDict files.
pub type MdictEncoding = &'static Encoding;

/// Format variant selected by the `GeneratedByEngineVersion` attribute.
///
/// The two variants differ in field widths: v1 uses 32-bit numbers and
/// 8-bit text-length prefixes, v2 uses 64-bit numbers (of which only the
/// low 32 bits may be set) and 16-bit prefixes, and pads sized text with
/// one extra code unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MdictVersion {
    V1,
    V2,
}

impl MdictVersion {
    /// Byte width of a number field.
    pub fn number_width(&self) -> usize {
        match self {
            MdictVersion::V1 => 4,
            MdictVersion::V2 => 8,
        }
    }

    /// Byte width of a text-length prefix.
    pub fn short_width(&self) -> usize {
        match self {
            MdictVersion::V1 => 1,
            MdictVersion::V2 => 2,
        }
    }

    /// Code units of tail padding after sized text.
    pub fn text_tail_units(&self) -> usize {
        match self {
            MdictVersion::V1 => 0,
            MdictVersion::V2 => 1,
        }
    }
}

impl TryFrom<f32> for MdictVersion {
    type Error = MdictError;

    fn try_from(v: f32) -> Result<Self> {
        if v < 2.0 {
            Ok(Self::V1)
        } else if v < 3.0 {
            Ok(Self::V2)
        } else {
            Err(MdictError::BadHeader(format!(
                "unsupported engine version {}; only v1.x and v2.x files are readable",
                v
            )))
        }
    }
}

/// Encryption bits from the `Encrypted` header attribute.
///
/// Bit 0x01: sections are encrypted with an external registration key.
/// Bit 0x02: the keyword index is encrypted with a checksum-derived key.
#[derive(Debug, Default, Clone, Copy)]
pub struct EncryptionFlags {
    pub header_encrypted: bool,
    pub key_index_encrypted: bool,
}

/// How stored keys and queries are folded before comparison and hashing.
///
/// Derived from the `KeyCaseSensitive` and `StripKey` header attributes.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyAdapter {
    pub case_sensitive: bool,
    pub strip_punctuation: bool,
}

impl KeyAdapter {
    pub fn from_attributes(attrs: &HashMap<String, String>) -> Self {
        Self {
            case_sensitive: attr_is_yes(attrs.get("KeyCaseSensitive")),
            strip_punctuation: attr_is_yes(attrs.get("StripKey")),
        }
    }

    /// Folds a key into its comparison form.
    pub fn adapt(&self, key: &str) -> String {
        let mut out = String::with_capacity(key.len());
        for c in key.chars() {
            if self.strip_punctuation && matches!(c, ',' | '.' | ' ' | '\'' | '_' | '-') {
                continue;
            }
            if self.case_sensitive {
                out.push(c);
            } else {
                out.extend(c.to_lowercase());
            }
        }
        out
    }
}

fn attr_is_yes(value: Option<&String>) -> bool {
    value.map(|v| v.eq_ignore_ascii_case("yes")).unwrap_or(false)
}

/// Parsed MDict file header.
///
/// Populated once while opening the file and immutable afterwards. The raw
/// attribute map is kept alongside the derived configuration.
#[derive(Debug)]
pub struct MdictHeader {
    pub version: MdictVersion,
    pub encoding: MdictEncoding,
    pub encryption: EncryptionFlags,
    pub adapter: KeyAdapter,
    pub title: String,
    pub description: Option<String>,
    pub attributes: HashMap<String, String>,
}

impl MdictHeader {
    /// Bytes per text code unit under the configured encoding.
    pub fn unit_width(&self) -> usize {
        if self.encoding == UTF_16LE || self.encoding == UTF_16BE {
            2
        } else {
            1
        }
    }

    /// Folds a key with this dictionary's adapter.
    pub fn adapt(&self, key: &str) -> String {
        self.adapter.adapt(key)
    }
}

/// One keyword-index entry describing a single keyword block.
#[derive(Debug, Clone)]
pub struct KeywordIndexEntry {
    /// Number of key entries packed in this block.
    pub num_entries: u64,
    /// First keyword stored in the block.
    pub first_word: String,
    /// Last keyword stored in the block.
    pub last_word: String,
    /// Size of the compressed block as stored in the file.
    pub compressed_size: u64,
    /// Size of the block after decompression.
    pub decompressed_size: u64,
    /// Absolute byte offset of the block's compressed data.
    pub file_offset: u64,
    /// Cumulative index of this block's first entry over the whole file.
    pub first_ordinal: u64,
}

/// Metadata describing a single record block.
#[derive(Debug, Clone, Copy)]
pub struct RecordBlockMeta {
    pub compressed_size: u64,
    pub decompressed_size: u64,
    /// Absolute byte offset of the block's compressed data.
    pub file_offset: u64,
    /// Offset of this block in the concatenated decompressed record stream.
    pub decompressed_offset: u64,
}

/// A key entry as stored in a decompressed keyword block.
#[derive(Debug, Clone)]
pub struct KeyEntry {
    pub record_offset: u64,
    pub text: String,
}

/// Location of one record inside the concatenated decompressed record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInfo {
    pub record_offset: u64,
    /// `None` for the file's final record; its size comes from the block end.
    pub size: Option<u64>,
}

/// The result of materializing a dictionary record.
///
/// Records either carry content or redirect to another entry via the
/// `@@@LINK=` convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData<T> {
    Content(T),
    Redirect(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    None,
    Lzo,
    Zlib,
}

impl TryFrom<u32> for CompressionType {
    type Error = MdictError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Lzo),
            2 => Ok(Self::Zlib),
            _ => Err(MdictError::MalformedBlock(format!(
                "unknown compression tag: {}",
                value
            ))),
        }
    }
}
