//! Wire format compression for network messages.
//!
//! All network messages (gossip and request/response) are LZ4-compressed
//! to reduce bandwidth.
//!
//! The size prefix is part of LZ4's framing - it stores the original
//! uncompressed size so decompression can pre-allocate the output buffer.

use thiserror::Error;

/// Errors from wire encoding/decoding.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),
}

/// Compress data for transmission over the network.
///
/// Uses LZ4 block compression with a prepended size header.
#[inline]
pub fn compress(data: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(data)
}

/// Decompress data received from the network.
///
/// Expects LZ4 block format with prepended size header.
#[inline]
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, WireError> {
    lz4_flex::decompress_size_prepended(data)
        .map_err(|e| WireError::DecompressionFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_roundtrip() {
        let data = b"the same bytes come back".repeat(10);
        let compressed = compress(&data);
        let restored = decompress(&compressed).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        assert!(decompress(&[0xFF, 0xFF, 0xFF, 0xFF, 0x00]).is_err());
    }
}
