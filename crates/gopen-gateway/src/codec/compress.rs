//! Gzip and deflate body compression.

use crate::error::GatewayError;
use bytes::Bytes;
use flate2::read::{DeflateDecoder, GzDecoder};
use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;
use std::io::{Read, Write};

pub fn compress_gzip(bytes: &[u8]) -> Result<Bytes, GatewayError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .and_then(|_| encoder.finish())
        .map(Bytes::from)
        .map_err(|e| GatewayError::content_conversion(format!("Gzip compression failed: {e}")))
}

pub fn decompress_gzip(bytes: &[u8]) -> Result<Bytes, GatewayError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map(|_| Bytes::from(out))
        .map_err(|e| GatewayError::content_conversion(format!("Gzip decompression failed: {e}")))
}

pub fn compress_deflate(bytes: &[u8]) -> Result<Bytes, GatewayError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .and_then(|_| encoder.finish())
        .map(Bytes::from)
        .map_err(|e| GatewayError::content_conversion(format!("Deflate compression failed: {e}")))
}

pub fn decompress_deflate(bytes: &[u8]) -> Result<Bytes, GatewayError> {
    let mut decoder = DeflateDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map(|_| Bytes::from(out))
        .map_err(|e| GatewayError::content_conversion(format!("Deflate decompression failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_round_trip() {
        let input = b"the same bytes come back".as_slice();
        let compressed = compress_gzip(input).unwrap();
        assert_eq!(decompress_gzip(&compressed).unwrap(), input);
    }

    #[test]
    fn test_deflate_round_trip() {
        let input = b"the same bytes come back".as_slice();
        let compressed = compress_deflate(input).unwrap();
        assert_eq!(decompress_deflate(&compressed).unwrap(), input);
    }

    #[test]
    fn test_decompress_garbage_fails() {
        assert!(decompress_gzip(b"not gzip").is_err());
    }
}
