//! Decompression of MDict data blocks.
//!
//! Blocks carry a compression tag: 0 = stored, 1 = LZO1x, 2 = zlib/deflate.

use std::io::Read;

use flate2::read::ZlibDecoder;
use log::trace;
use lzokay::decompress::decompress as lzokay_decompress;

use crate::types::error::{MdictError, Result};
use crate::types::models::CompressionType;

/// Decompresses a block payload and validates the resulting size.
pub fn decompress(payload: &[u8], tag: CompressionType, expected_size: u64) -> Result<Vec<u8>> {
    let decompressed = match tag {
        CompressionType::None => {
            trace!("stored block, copying {} bytes", payload.len());
            payload.to_vec()
        }
        CompressionType::Lzo => {
            trace!(
                "LZO block: {} -> {} bytes (declared)",
                payload.len(),
                expected_size
            );
            let mut output = vec![0u8; expected_size as usize];
            lzokay_decompress(payload, &mut output)
                .map_err(|e| MdictError::MalformedBlock(format!("LZO decompression failed: {}", e)))?;
            output
        }
        CompressionType::Zlib => {
            trace!(
                "zlib block: {} -> {} bytes (declared)",
                payload.len(),
                expected_size
            );
            let mut output = Vec::with_capacity(expected_size as usize);
            let mut decoder = ZlibDecoder::new(payload);
            decoder
                .read_to_end(&mut output)
                .map_err(|e| MdictError::MalformedBlock(format!("zlib decompression failed: {}", e)))?;
            output
        }
    };

    if decompressed.len() as u64 != expected_size {
        return Err(MdictError::MalformedBlock(format!(
            "decompressed size {} disagrees with declared size {}",
            decompressed.len(),
            expected_size
        )));
    }

    Ok(decompressed)
}
