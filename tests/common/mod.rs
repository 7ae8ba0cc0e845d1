//! In-memory MDict image builder for the integration tests.
//!
//! Produces byte-accurate v1/v2 images without touching disk; tests open
//! them through the `ByteSource` impl on `Vec<u8>`. Entries must be added
//! in dictionary order (the order their adapted keys sort in), exactly as
//! the publishing tools lay files out.

#![allow(dead_code)]

use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};
use flate2::write::ZlibEncoder;
use flate2::Compression;

use mdict_query::codec::crypto;

pub const STORED: u32 = 0;
pub const LZO: u32 = 1;
pub const ZLIB: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf16,
}

impl TextEncoding {
    fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Utf16 => "UTF-16",
        }
    }

    fn encode(self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Utf16 => text
                .encode_utf16()
                .flat_map(|unit| unit.to_le_bytes())
                .collect(),
        }
    }

    fn unit_len(self, text: &str) -> usize {
        match self {
            TextEncoding::Utf8 => text.len(),
            TextEncoding::Utf16 => text.encode_utf16().count(),
        }
    }

    fn nul(self) -> &'static [u8] {
        match self {
            TextEncoding::Utf8 => &[0],
            TextEncoding::Utf16 => &[0, 0],
        }
    }
}

pub struct Fixture {
    v2: bool,
    encoding: TextEncoding,
    library: bool,
    compression_tag: u32,
    encrypt_index: bool,
    attrs: Vec<(String, String)>,
    entries: Vec<(String, Vec<u8>)>,
    keys_per_block: usize,
    records_per_block: usize,
}

impl Fixture {
    pub fn mdx_v2(encoding: TextEncoding) -> Self {
        Self::new(true, encoding, false)
    }

    pub fn mdx_v1(encoding: TextEncoding) -> Self {
        Self::new(false, encoding, false)
    }

    /// Resource container. Keys and the index are UTF-16LE, as readers
    /// assume for .mdd regardless of the header attribute.
    pub fn mdd_v2() -> Self {
        Self::new(true, TextEncoding::Utf16, true)
    }

    fn new(v2: bool, encoding: TextEncoding, library: bool) -> Self {
        Self {
            v2,
            encoding,
            library,
            compression_tag: ZLIB,
            encrypt_index: false,
            attrs: Vec::new(),
            entries: Vec::new(),
            keys_per_block: 0,
            records_per_block: 0,
        }
    }

    pub fn attribute(mut self, key: &str, value: &str) -> Self {
        self.attrs.push((key.to_string(), value.to_string()));
        self
    }

    pub fn compression(mut self, tag: u32) -> Self {
        self.compression_tag = tag;
        self
    }

    pub fn encrypt_index(mut self) -> Self {
        self.encrypt_index = true;
        self
    }

    /// Splits keyword blocks every `n` entries (0 = one block for all).
    pub fn keys_per_block(mut self, n: usize) -> Self {
        self.keys_per_block = n;
        self
    }

    /// Splits record blocks every `n` records (0 = one block for all).
    pub fn records_per_block(mut self, n: usize) -> Self {
        self.records_per_block = n;
        self
    }

    /// Adds a definition entry; the text is stored NUL-terminated in the
    /// container encoding.
    pub fn entry(mut self, key: &str, definition: &str) -> Self {
        let mut record = self.encoding.encode(definition);
        record.extend_from_slice(self.encoding.nul());
        self.entries.push((key.to_string(), record));
        self
    }

    /// Adds a raw resource entry.
    pub fn raw_entry(mut self, key: &str, bytes: Vec<u8>) -> Self {
        self.entries.push((key.to_string(), bytes));
        self
    }

    pub fn build(self) -> Vec<u8> {
        // Record offsets follow the entry order.
        let mut offsets = Vec::with_capacity(self.entries.len());
        let mut stream_pos = 0u64;
        for (_, record) in &self.entries {
            offsets.push(stream_pos);
            stream_pos += record.len() as u64;
        }

        // --- keyword blocks ---
        let keys_chunk = if self.keys_per_block == 0 {
            self.entries.len().max(1)
        } else {
            self.keys_per_block
        };
        struct KeyBlock {
            count: u64,
            first: String,
            last: String,
            bytes: Vec<u8>,
            decompressed: u64,
        }
        let mut key_blocks = Vec::new();
        for chunk_start in (0..self.entries.len()).step_by(keys_chunk) {
            let chunk = &self.entries[chunk_start..(chunk_start + keys_chunk).min(self.entries.len())];
            let mut payload = Vec::new();
            for (i, (key, _)) in chunk.iter().enumerate() {
                self.write_num(&mut payload, offsets[chunk_start + i]);
                payload.extend_from_slice(&self.encoding.encode(key));
                payload.extend_from_slice(self.encoding.nul());
            }
            let bytes = self.wrap_block(&payload);
            key_blocks.push(KeyBlock {
                count: chunk.len() as u64,
                first: chunk[0].0.clone(),
                last: chunk[chunk.len() - 1].0.clone(),
                bytes,
                decompressed: payload.len() as u64,
            });
        }

        // --- keyword index ---
        let mut index_payload = Vec::new();
        for block in &key_blocks {
            self.write_num(&mut index_payload, block.count);
            self.write_short(&mut index_payload, self.encoding.unit_len(&block.first) as u64);
            index_payload.extend_from_slice(&self.encoding.encode(&block.first));
            if self.v2 {
                index_payload.extend_from_slice(self.encoding.nul());
            }
            self.write_short(&mut index_payload, self.encoding.unit_len(&block.last) as u64);
            index_payload.extend_from_slice(&self.encoding.encode(&block.last));
            if self.v2 {
                index_payload.extend_from_slice(self.encoding.nul());
            }
            self.write_num(&mut index_payload, block.bytes.len() as u64);
            self.write_num(&mut index_payload, block.decompressed);
        }
        let index_region = if self.v2 {
            let mut compressed = zlib_compress(&index_payload);
            if self.encrypt_index {
                let key = crypto::keyword_index_key(&[0, 0, 0, 0]);
                encrypt_in_place(&mut compressed, &key);
            }
            let mut region = Vec::new();
            region.write_u32::<byteorder::LittleEndian>(ZLIB).unwrap();
            region.extend_from_slice(&[0; 4]);
            region.extend_from_slice(&compressed);
            region
        } else {
            index_payload.clone()
        };

        // --- record blocks ---
        let records_chunk = if self.records_per_block == 0 {
            self.entries.len().max(1)
        } else {
            self.records_per_block
        };
        let mut record_blocks = Vec::new(); // (bytes, decompressed)
        for chunk_start in (0..self.entries.len()).step_by(records_chunk) {
            let chunk = &self.entries[chunk_start..(chunk_start + records_chunk).min(self.entries.len())];
            let mut payload = Vec::new();
            for (_, record) in chunk {
                payload.extend_from_slice(record);
            }
            let bytes = self.wrap_block(&payload);
            record_blocks.push((bytes, payload.len() as u64));
        }

        // --- assemble ---
        let mut out = Vec::new();
        self.write_header(&mut out);

        // keyword summary
        let key_blocks_len: u64 = key_blocks.iter().map(|b| b.bytes.len() as u64).sum();
        self.write_num(&mut out, key_blocks.len() as u64);
        self.write_num(&mut out, self.entries.len() as u64);
        if self.v2 {
            self.write_num(&mut out, index_payload.len() as u64);
        }
        self.write_num(&mut out, index_region.len() as u64);
        self.write_num(&mut out, key_blocks_len);
        if self.v2 {
            out.extend_from_slice(&[0; 4]); // summary checksum, never validated
        }

        out.extend_from_slice(&index_region);
        for block in &key_blocks {
            out.extend_from_slice(&block.bytes);
        }

        // record summary and index
        let record_blocks_len: u64 = record_blocks.iter().map(|(b, _)| b.len() as u64).sum();
        let pair_width: u64 = if self.v2 { 16 } else { 8 };
        self.write_num(&mut out, record_blocks.len() as u64);
        self.write_num(&mut out, self.entries.len() as u64);
        self.write_num(&mut out, record_blocks.len() as u64 * pair_width);
        self.write_num(&mut out, record_blocks_len);
        for (bytes, decompressed) in &record_blocks {
            self.write_num(&mut out, bytes.len() as u64);
            self.write_num(&mut out, *decompressed);
        }
        for (bytes, _) in &record_blocks {
            out.extend_from_slice(bytes);
        }

        out
    }

    fn write_header(&self, out: &mut Vec<u8>) {
        let element = if self.library { "Library_Data" } else { "Dictionary" };
        let mut attrs: Vec<(String, String)> = vec![
            (
                "GeneratedByEngineVersion".to_string(),
                if self.v2 { "2.0" } else { "1.2" }.to_string(),
            ),
            ("Encoding".to_string(), self.encoding.label().to_string()),
            (
                "Encrypted".to_string(),
                if self.encrypt_index { "2" } else { "0" }.to_string(),
            ),
        ];
        for (key, value) in &self.attrs {
            if let Some(existing) = attrs.iter_mut().find(|(k, _)| k == key) {
                existing.1 = value.clone();
            } else {
                attrs.push((key.clone(), value.clone()));
            }
        }

        let mut xml = format!("<{}", element);
        for (key, value) in &attrs {
            xml.push_str(&format!(" {}=\"{}\"", key, value));
        }
        xml.push_str("/>");

        // The header XML is always UTF-16LE, NUL-terminated.
        let mut header_bytes: Vec<u8> = xml
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect();
        header_bytes.extend_from_slice(&[0, 0]);

        out.write_u32::<BigEndian>(header_bytes.len() as u32).unwrap();
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&[0; 4]); // header checksum, never validated
    }

    /// Wraps a payload as an on-disk block: tag, checksum field, compressed
    /// payload.
    fn wrap_block(&self, payload: &[u8]) -> Vec<u8> {
        let compressed = match self.compression_tag {
            STORED => payload.to_vec(),
            LZO => lzokay::compress::compress(payload).expect("lzo compress"),
            ZLIB => zlib_compress(payload),
            other => panic!("unknown compression tag {}", other),
        };
        let mut block = Vec::with_capacity(8 + compressed.len());
        block
            .write_u32::<byteorder::LittleEndian>(self.compression_tag)
            .unwrap();
        block.extend_from_slice(&[0; 4]);
        block.extend_from_slice(&compressed);
        block
    }

    fn write_num(&self, out: &mut Vec<u8>, value: u64) {
        if self.v2 {
            out.write_u64::<BigEndian>(value).unwrap();
        } else {
            out.write_u32::<BigEndian>(value as u32).unwrap();
        }
    }

    fn write_short(&self, out: &mut Vec<u8>, value: u64) {
        if self.v2 {
            out.write_u16::<BigEndian>(value as u16).unwrap();
        } else {
            out.write_u8(value as u8).unwrap();
        }
    }
}

pub fn zlib_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("zlib write");
    encoder.finish().expect("zlib finish")
}

/// Inverse of the reader's rotating-XOR decryption.
pub fn encrypt_in_place(data: &mut [u8], key: &[u8; 16]) {
    let mut prev = 0x36u8;
    for (i, byte) in data.iter_mut().enumerate() {
        let cipher = (*byte ^ prev ^ (i as u8) ^ key[i % key.len()]).rotate_left(4);
        *byte = cipher;
        prev = cipher;
    }
}
