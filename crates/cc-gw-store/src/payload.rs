use std::io::Read;

use crate::error::{Result, StoreError};

const BROTLI_QUALITY: u32 = 5;
const BROTLI_LGWIN: u32 = 22;

/// Compress a prompt/response body for storage in `request_payloads`.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let params = brotli::enc::BrotliEncoderParams {
        quality: BROTLI_QUALITY as i32,
        lgwin: BROTLI_LGWIN as i32,
        ..Default::default()
    };
    brotli::BrotliCompress(&mut std::io::Cursor::new(data), &mut out, &params)
        .map_err(|e| StoreError::Internal(format!("brotli compress failed: {e}")))?;
    Ok(out)
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut reader = brotli::Decompressor::new(data, 4096);
    let mut out = Vec::new();
    reader
        .read_to_end(&mut out)
        .map_err(|e| StoreError::Internal(format!("brotli decompress failed: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let original = b"the quick brown fox jumps over the lazy dog".repeat(20);
        let compressed = compress(&original).unwrap();
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, original);
    }
}
