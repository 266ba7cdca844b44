//! Chunk body compression.

use async_compression::tokio::write::{ZstdDecoder, ZstdEncoder};
use bytes::Bytes;
use cairn_core::Compression;
use tokio::io::AsyncWriteExt;

/// Compress a chunk body for upload.
pub async fn compress(algo: Compression, data: &[u8]) -> std::io::Result<Bytes> {
    match algo {
        Compression::None => Ok(Bytes::copy_from_slice(data)),
        Compression::Zstd => {
            let mut encoder = ZstdEncoder::new(Vec::with_capacity(data.len() / 2));
            encoder.write_all(data).await?;
            encoder.shutdown().await?;
            Ok(Bytes::from(encoder.into_inner()))
        }
    }
}

/// Decompress a stored chunk body.
pub async fn decompress(algo: Compression, data: &[u8]) -> std::io::Result<Bytes> {
    match algo {
        Compression::None => Ok(Bytes::copy_from_slice(data)),
        Compression::Zstd => {
            let mut decoder = ZstdDecoder::new(Vec::with_capacity(data.len() * 2));
            decoder.write_all(data).await?;
            decoder.shutdown().await?;
            Ok(Bytes::from(decoder.into_inner()))
        }
    }
}
