//! Decryption of the keyword index.
//!
//! When `Encrypted` bit 0x02 is set, the keyword index block is encrypted
//! with a byte-rotation stream cipher keyed by a RIPEMD-128 digest. No
//! external secret is involved: the passkey is derived from the block's own
//! checksum field.

use log::trace;
use ripemd::{Digest, Ripemd128};

/// Derives the 16-byte key for an encrypted keyword index.
///
/// The 8-byte passkey is the block's checksum field followed by the fixed
/// bytes `95 36 00 00`; RIPEMD-128 of the passkey yields the key.
pub fn keyword_index_key(checksum: &[u8; 4]) -> [u8; 16] {
    let mut hasher = Ripemd128::new();
    hasher.update(checksum);
    hasher.update(0x3695u32.to_le_bytes());
    hasher.finalize().into()
}

/// In-place byte-rotation stream decryption.
///
/// Each byte has its nibbles swapped, then is XORed with the previous
/// ciphertext byte (seeded with `0x36`), its index, and the rolling key.
pub fn rotating_xor_decrypt(data: &mut [u8], key: &[u8; 16]) {
    trace!("decrypting {} bytes", data.len());

    let mut prev = 0x36u8;
    for (i, byte) in data.iter_mut().enumerate() {
        let current = *byte;
        let swapped = current.rotate_left(4);
        *byte = swapped ^ prev ^ (i as u8) ^ key[i % key.len()];
        prev = current;
    }
}
