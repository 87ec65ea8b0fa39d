//! Per-field compression.
//!
//! GBF only ever writes a field as `"none"` or `"zlib"` — there is no codec
//! registry, UUID identity, or plugin negotiation to speak of, since the
//! compression name lives directly in each field's header entry and is
//! always one of these two known strings. The `Codec` trait is kept anyway
//! because it is the natural seam for `writer.rs`/`reader.rs` to call
//! through, and because a third codec should be addable here without
//! touching either of them.

use std::io::{Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecId {
    None,
    Zlib,
}

impl CodecId {
    pub fn name(self) -> &'static str {
        match self {
            CodecId::None => "none",
            CodecId::Zlib => "zlib",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(CodecId::None),
            "zlib" => Some(CodecId::Zlib),
            _ => None,
        }
    }
}

pub trait Codec: Send + Sync {
    fn codec_id(&self) -> CodecId;
    /// `level` follows the zlib convention: `-1` means "library default",
    /// `0..=9` are forwarded as-is.
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>, CodecError>;
}

pub struct NoneCodec;
impl Codec for NoneCodec {
    fn codec_id(&self) -> CodecId { CodecId::None }
    fn compress(&self, data: &[u8], _level: i32) -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>, CodecError> {
        if data.len() != expected_size {
            return Err(CodecError::Decompression(format!(
                "uncompressed length {} does not match declared usize {}",
                data.len(),
                expected_size
            )));
        }
        Ok(data.to_vec())
    }
}

pub struct ZlibCodec;
impl Codec for ZlibCodec {
    fn codec_id(&self) -> CodecId { CodecId::Zlib }

    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;

        let compression = if level < 0 { Compression::default() } else { Compression::new(level as u32) };
        let mut encoder = ZlibEncoder::new(Vec::new(), compression);
        encoder.write_all(data).map_err(|e| CodecError::Compression(e.to_string()))?;
        encoder.finish().map_err(|e| CodecError::Compression(e.to_string()))
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>, CodecError> {
        use flate2::read::ZlibDecoder;

        let mut decoder = ZlibDecoder::new(data);
        let mut out = Vec::with_capacity(expected_size);
        decoder.read_to_end(&mut out).map_err(|e| CodecError::Decompression(e.to_string()))?;
        if out.len() != expected_size {
            return Err(CodecError::Decompression(format!(
                "decompressed length {} does not match declared usize {}",
                out.len(),
                expected_size
            )));
        }
        Ok(out)
    }
}

pub fn get_codec(id: CodecId) -> Box<dyn Codec> {
    match id {
        CodecId::None => Box::new(NoneCodec),
        CodecId::Zlib => Box::new(ZlibCodec),
    }
}

/// Default zlib compression level used whenever a field is stored compressed:
/// `-1` defers to `flate2::Compression::default()` rather than naming a
/// specific level.
pub const DEFAULT_ZLIB_LEVEL: i32 = -1;

/// Minimum uncompressed size worth attempting compression on, and the ratio
/// a compressed candidate must beat to be kept, under `CompressionMode::Auto`.
pub const AUTO_MIN_SIZE: usize = 256;
pub const AUTO_RATIO_THRESHOLD: f64 = 0.95;

/// Decides, for `CompressionMode::Auto`, whether a field should be stored
/// compressed. Compresses a trial candidate and keeps it only if it beats
/// the threshold and the field is large enough to bother.
pub fn auto_should_compress(uncompressed: &[u8], level: i32) -> Option<Vec<u8>> {
    if uncompressed.len() < AUTO_MIN_SIZE {
        return None;
    }
    let candidate = ZlibCodec.compress(uncompressed, level).ok()?;
    if (candidate.len() as f64) < (uncompressed.len() as f64) * AUTO_RATIO_THRESHOLD {
        Some(candidate)
    } else {
        None
    }
}
