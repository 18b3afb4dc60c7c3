//! Per-block transform: each block becomes one standalone gzip member.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::IbzError;
use crate::types::{Chunk, Result};

/// Compresses the payload of `chunk`, keeping its position.
pub fn compress_chunk(chunk: &Chunk, level: u32) -> Result<Chunk> {
    let mut encoder = GzEncoder::new(
        Vec::with_capacity(chunk.len() / 2 + 64),
        Compression::new(level.min(9)),
    );
    let compressed = encoder
        .write_all(chunk.data())
        .and_then(|()| encoder.finish())
        .map_err(|error| {
            IbzError::CompressionError(format!(
                "gzip encode failed at offset {}: {error}",
                chunk.position()
            ))
        })?;

    chunk.with_data(compressed)
}

/// Restores the payload of a compressed `chunk`, keeping its position.
pub fn decompress_chunk(chunk: &Chunk) -> Result<Chunk> {
    let mut decoder = GzDecoder::new(chunk.data());
    let mut plain = Vec::with_capacity(chunk.len().saturating_mul(2));
    decoder.read_to_end(&mut plain).map_err(|error| {
        IbzError::DecompressionError(format!(
            "gzip decode failed at offset {}: {error}",
            chunk.position()
        ))
    })?;

    if plain.is_empty() {
        return Err(IbzError::DecompressionError(format!(
            "record at offset {} decodes to an empty block",
            chunk.position()
        )));
    }

    chunk.with_data(plain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_block_restores_exactly() -> Result<()> {
        let chunk = Chunk::new(16384, b"abcabcabcabcabcabc".repeat(64))?;
        let compressed = compress_chunk(&chunk, 6)?;
        assert_eq!(compressed.position(), 16384);
        assert!(compressed.len() < chunk.len());

        let restored = decompress_chunk(&compressed)?;
        assert_eq!(restored, chunk);
        Ok(())
    }

    #[test]
    fn garbage_payload_fails_to_decode() -> Result<()> {
        let chunk = Chunk::new(0, vec![0xAAu8; 32])?;
        assert!(matches!(
            decompress_chunk(&chunk),
            Err(IbzError::DecompressionError(_))
        ));
        Ok(())
    }
}
