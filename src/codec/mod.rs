//! Codec layer: decompression and keyword-index decryption primitives.

pub mod compression;
pub mod crypto;
