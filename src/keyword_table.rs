//! Express-mode keyword table.
//!
//! After a full pass over the keyword blocks, every key is stored as a
//! packed `(hash << 32) | ordinal` value in one array, with the record
//! offsets in a parallel array indexed by ordinal. A single unstable sort
//! orders the packed values by hash (and by ordinal within a hash), after
//! which lookups are a binary search plus a short forward walk.

use log::trace;

use crate::types::models::KeyInfo;

/// Seed for the keyword hash.
const HASH_SEED: u32 = 0xFE176;

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

/// Hashes an adapted key for table lookup.
pub fn hash_key(adapted_key: &str) -> u32 {
    murmur3_x86_32(adapted_key.as_bytes(), HASH_SEED)
}

/// MurmurHash3, x86 32-bit variant.
pub fn murmur3_x86_32(data: &[u8], seed: u32) -> u32 {
    let mut h = seed;

    let mut chunks = data.chunks_exact(4);
    for chunk in chunks.by_ref() {
        let k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        h ^= mix_k(k);
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k = 0u32;
        for (i, &b) in tail.iter().enumerate() {
            k |= u32::from(b) << (8 * i);
        }
        h ^= mix_k(k);
    }

    h ^= data.len() as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

#[inline]
fn mix_k(mut k: u32) -> u32 {
    k = k.wrapping_mul(C1);
    k = k.rotate_left(15);
    k.wrapping_mul(C2)
}

/// Sorted map from key hashes to record offsets.
///
/// Ordinals follow the file's own key order, so the offsets array is
/// non-decreasing and an entry's size is the distance to its successor.
/// Hash collisions are possible: callers must verify each returned
/// ordinal's true key against the query before trusting a hit.
#[derive(Debug, Default)]
pub struct KeywordTable {
    entries: Vec<u64>,
    offsets: Vec<u64>,
    sorted: bool,
}

impl KeywordTable {
    pub fn with_capacity(num_entries: usize) -> Self {
        Self {
            entries: Vec::with_capacity(num_entries),
            offsets: Vec::with_capacity(num_entries),
            sorted: false,
        }
    }

    /// Appends the next keyword in file order.
    pub fn push(&mut self, hash: u32, record_offset: u64) {
        let ordinal = self.offsets.len() as u64;
        self.entries.push(u64::from(hash) << 32 | ordinal);
        self.offsets.push(record_offset);
        self.sorted = false;
    }

    /// Orders the table for lookup. Must run once after the last `push`.
    pub fn sort(&mut self) {
        self.entries.sort_unstable();
        self.sorted = true;
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// All entries whose key hash equals `hash`, as `(ordinal, keyinfo)`
    /// pairs in ordinal order. Empty when the hash is absent.
    pub fn find(&self, hash: u32) -> Vec<(u64, KeyInfo)> {
        debug_assert!(self.sorted, "find() before sort()");

        let probe = u64::from(hash) << 32;
        let start = self.entries.partition_point(|&packed| packed < probe);

        let mut out = Vec::new();
        for &packed in &self.entries[start..] {
            if packed >> 32 != u64::from(hash) {
                break;
            }
            let ordinal = packed & 0xFFFF_FFFF;
            out.push((ordinal, self.keyinfo(ordinal as usize)));
        }
        if out.len() > 1 {
            trace!("hash {:#010x} matches {} entries", hash, out.len());
        }
        out
    }

    fn keyinfo(&self, ordinal: usize) -> KeyInfo {
        let record_offset = self.offsets[ordinal];
        let size = self
            .offsets
            .get(ordinal + 1)
            .map(|next| next - record_offset);
        KeyInfo {
            record_offset,
            size,
        }
    }
}
