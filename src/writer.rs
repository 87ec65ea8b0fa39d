//! Serializes a [`GbfValue`] tree to a `.gbf` file.
//!
//! Algorithm, in order:
//! 1. Depth-first walk of the value tree, collecting dotted leaf paths.
//! 2. Canonicalize each leaf's bytes (column-major, little-endian — already
//!    true of every `value.rs` type by construction).
//! 3. Pick a compression per `WriteOptions::compression_mode`.
//! 4. Record offset/csize/usize/crc32 into a `FieldMeta`.
//! 5. Build the header JSON with a zeroed `header_crc32_hex` placeholder.
//! 6. Compute the header CRC over that zeroed layout, patch it in.
//! 7. Write magic + header length + header + payload to a temp file,
//!    `fsync`, then rename over the destination so a crash mid-write never
//!    leaves a half-written file at the final path.

use std::fs::File;
use std::io::Write as IoWrite;
use std::path::Path;

use tracing::{debug, trace};

use crate::bytesio;
use crate::codec::{self, CodecId};
use crate::error::{GbfError, Result};
use crate::header::{FieldMeta, Header, DEFAULT_ENDIANNESS, DEFAULT_ORDER, FORMAT_NAME, MAGIC_BYTES, VERSION};
use crate::value::{
    CalendarDurationArray, CategoricalArray, CharArray, DatetimeArray, DurationArray, GbfValue, LogicalArray,
    NumericArray, OpaqueValue, StringArray, StructValue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Whether to compute and store per-field CRC32 values.
    pub crc: bool,
    pub compression_mode: CompressionMode,
    /// zlib level: `-1` for the library default, `0..=9` forwarded as-is.
    pub compression_level: i32,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions { crc: true, compression_mode: CompressionMode::Auto, compression_level: codec::DEFAULT_ZLIB_LEVEL }
    }
}

struct EncodedField {
    meta: FieldMeta,
    payload: Vec<u8>,
}

pub fn write_file<P: AsRef<Path>>(path: P, value: &GbfValue, opts: WriteOptions) -> Result<()> {
    let path = path.as_ref();
    debug!(target: "gbf::writer", path = %path.display(), "writing GBF file");

    if !matches!(value, GbfValue::Struct(_)) {
        return Err(GbfError::InvalidArgument("root value must be a struct".into()));
    }

    let mut leaves = Vec::new();
    value.walk_leaves("", &mut leaves);

    let mut encoded = Vec::with_capacity(leaves.len());
    let mut running_offset: u64 = 0;
    for (leaf_path, leaf) in &leaves {
        let field = encode_leaf(leaf_path, leaf, &opts, running_offset)?;
        running_offset = running_offset
            .checked_add(field.meta.csize)
            .ok_or_else(|| GbfError::FieldLayoutInvalid("payload exceeds addressable size".into()))?;
        encoded.push(field);
    }

    // Field offsets are relative to `payload_start` per the wire contract
    // (spec §3/§4.5), so they're already correct as recorded by `encode_leaf`
    // — nothing here needs to add `payload_start` to them.
    let fields: Vec<FieldMeta> = encoded.iter().map(|f| f.meta.clone()).collect();
    let total_payload_len: u64 = encoded.iter().map(|f| f.meta.csize).sum();
    let mut header = Header {
        format: FORMAT_NAME.to_string(),
        magic: String::from_utf8_lossy(&MAGIC_BYTES).trim_end_matches('\0').to_string(),
        version: VERSION,
        endianness: DEFAULT_ENDIANNESS.to_string(),
        order: DEFAULT_ORDER.to_string(),
        root: "".to_string(),
        fields,
        payload_start: 0,
        file_size: 0,
        header_crc32_hex: "00000000".to_string(),
    };

    // payload_start depends on the header's own serialized length, which
    // depends on payload_start's own digit width in the worst case — but
    // u64 values never change digit width across values that fit in the
    // 12-byte prefix's addressable range in practice, so a single fixed
    // point (serialize once, recompute payload_start/file_size, serialize
    // again) is enough.
    let prefix_len = 12u64;
    let first_pass = crate::header::serialize_with_crc(&header)?;
    let payload_start = prefix_len + first_pass.len() as u64;
    header.payload_start = payload_start;
    header.file_size = payload_start + total_payload_len;

    let header_bytes = crate::header::serialize_with_crc(&header)?;
    // Re-check: if the header grew/shrank because payload_start's digit
    // width changed, recompute once more. In practice this only matters
    // for files that cross a power-of-ten boundary at the exact byte the
    // header was sized against. Field offsets are relative and never move.
    let header_bytes = if prefix_len + header_bytes.len() as u64 != payload_start {
        let corrected_start = prefix_len + header_bytes.len() as u64;
        header.payload_start = corrected_start;
        header.file_size = corrected_start + total_payload_len;
        crate::header::serialize_with_crc(&header)?
    } else {
        header_bytes
    };

    trace!(target: "gbf::writer", fields = header.fields.len(), header_len = header_bytes.len(), "header assembled");

    let tmp_path = sibling_temp_path(path);
    {
        let mut f = File::create(&tmp_path)?;
        f.write_all(&MAGIC_BYTES)?;
        let mut len_buf = Vec::new();
        bytesio::write_u32_le(&mut len_buf, header_bytes.len() as u32);
        f.write_all(&len_buf)?;
        f.write_all(&header_bytes)?;
        for field in &encoded {
            f.write_all(&field.payload)?;
        }
        f.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    debug!(target: "gbf::writer", path = %path.display(), bytes = header.file_size, "wrote GBF file");
    Ok(())
}

fn sibling_temp_path(path: &Path) -> std::path::PathBuf {
    let pid = std::process::id();
    let file_name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "gbf".to_string());
    let tmp_name = format!(".{file_name}.tmp-{pid}");
    path.with_file_name(tmp_name)
}

fn encode_leaf(path: &str, value: &GbfValue, opts: &WriteOptions, running_offset: u64) -> Result<EncodedField> {
    let (kind, class, shape, complex, raw, encoding) = canonicalize(value)?;
    let (compression, payload, usize_) = compress_payload(&raw, opts);
    let crc32 = if opts.crc { bytesio::crc32(&raw) } else { 0 };

    Ok(EncodedField {
        meta: FieldMeta {
            path: path.to_string(),
            kind,
            class,
            shape,
            complex,
            compression: compression.name().to_string(),
            offset: running_offset,
            csize: payload.len() as u64,
            usize: usize_ as u64,
            crc32,
            encoding,
        },
        payload,
    })
}

fn compress_payload(raw: &[u8], opts: &WriteOptions) -> (CodecId, Vec<u8>, usize) {
    match opts.compression_mode {
        CompressionMode::Never => (CodecId::None, raw.to_vec(), raw.len()),
        CompressionMode::Always => {
            let codec = codec::get_codec(CodecId::Zlib);
            match codec.compress(raw, opts.compression_level) {
                Ok(compressed) => (CodecId::Zlib, compressed, raw.len()),
                Err(_) => (CodecId::None, raw.to_vec(), raw.len()),
            }
        }
        CompressionMode::Auto => match codec::auto_should_compress(raw, opts.compression_level) {
            Some(compressed) => (CodecId::Zlib, compressed, raw.len()),
            None => (CodecId::None, raw.to_vec(), raw.len()),
        },
    }
}

type Canonical = (String, String, Vec<u64>, bool, Vec<u8>, Option<String>);

/// Writes a `None`-or-`Some(String)` field the same way `canonicalize_string`
/// writes a missing element: a `u32` byte length (or `u32::MAX` for `None`)
/// followed by the UTF-8 bytes.
fn write_opt_string(out: &mut Vec<u8>, s: &Option<String>) {
    match s {
        None => bytesio::write_u32_le(out, u32::MAX),
        Some(text) => {
            let bytes = text.as_bytes();
            bytesio::write_u32_le(out, bytes.len() as u32);
            out.extend_from_slice(bytes);
        }
    }
}

/// Flattens one leaf value into on-disk bytes plus the header metadata that
/// describes it, per the per-kind layout rules each `value.rs` type commits
/// to at construction time (column-major, little-endian, real-then-imag).
/// Any per-kind metadata (datetime timezone/locale/format, categorical
/// category list) is encoded into these payload bytes, not the header —
/// the header carries only the documented `FieldMeta` columns.
fn canonicalize(value: &GbfValue) -> Result<Canonical> {
    Ok(match value {
        GbfValue::Struct(_) => {
            return Err(GbfError::FieldLayoutInvalid("struct nodes are not leaves".into()));
        }
        GbfValue::EmptyStruct => {
            ("empty_struct".to_string(), "empty_struct".to_string(), vec![0, 0], false, Vec::new(), None)
        }
        GbfValue::Numeric(n) => canonicalize_numeric(n)?,
        GbfValue::Logical(l) => canonicalize_logical(l),
        GbfValue::String(s) => canonicalize_string(s),
        GbfValue::Char(c) => canonicalize_char(c),
        GbfValue::Datetime(d) => canonicalize_datetime(d),
        GbfValue::Duration(d) => canonicalize_duration(d),
        GbfValue::CalendarDuration(d) => canonicalize_calendar_duration(d),
        GbfValue::Categorical(c) => canonicalize_categorical(c),
        GbfValue::Opaque(o) => {
            ("opaque".to_string(), o.class_name.clone(), o.shape.clone(), false, o.data.clone(), None)
        }
    })
}

fn canonicalize_numeric(n: &NumericArray) -> Result<Canonical> {
    let mut raw = n.real_le.clone();
    if n.complex {
        let imag = n
            .imag_le
            .as_ref()
            .filter(|imag| !imag.is_empty())
            .ok_or_else(|| GbfError::InvalidArgument("complex numeric field has zero-length imaginary part".into()))?;
        raw.extend_from_slice(imag);
    }
    Ok(("numeric".to_string(), n.class.name().to_string(), n.shape.clone(), n.complex, raw, None))
}

fn canonicalize_logical(l: &LogicalArray) -> Canonical {
    ("logical".to_string(), "logical".to_string(), l.shape.clone(), false, l.data.clone(), None)
}

fn canonicalize_string(s: &StringArray) -> Canonical {
    let mut raw = Vec::new();
    for item in &s.data {
        match item {
            None => bytesio::write_u32_le(&mut raw, u32::MAX),
            Some(text) => {
                let bytes = text.as_bytes();
                bytesio::write_u32_le(&mut raw, bytes.len() as u32);
                raw.extend_from_slice(bytes);
            }
        }
    }
    ("string".to_string(), "string".to_string(), s.shape.clone(), false, raw, None)
}

fn canonicalize_char(c: &CharArray) -> Canonical {
    let mut raw = Vec::with_capacity(c.utf16.len() * 2);
    for unit in &c.utf16 {
        raw.extend_from_slice(&unit.to_le_bytes());
    }
    ("char".to_string(), "char".to_string(), c.shape.clone(), false, raw, Some("utf-16-codeunits".to_string()))
}

fn canonicalize_datetime(d: &DatetimeArray) -> Canonical {
    let mut raw = Vec::new();
    write_opt_string(&mut raw, &d.tz);
    write_opt_string(&mut raw, &d.locale);
    write_opt_string(&mut raw, &d.format);
    for (is_nat, ms) in d.is_nat.iter().zip(&d.ms) {
        raw.push(*is_nat);
        bytesio::write_i64_le(&mut raw, *ms);
    }
    ("datetime".to_string(), "datetime".to_string(), d.shape.clone(), false, raw, None)
}

fn canonicalize_duration(d: &DurationArray) -> Canonical {
    let mut raw = Vec::with_capacity(d.ms.len() * 9);
    for (is_nan, ms) in d.is_nan.iter().zip(&d.ms) {
        raw.push(*is_nan);
        bytesio::write_i64_le(&mut raw, *ms);
    }
    ("duration".to_string(), "duration".to_string(), d.shape.clone(), false, raw, None)
}

fn canonicalize_calendar_duration(d: &CalendarDurationArray) -> Canonical {
    let mut raw = Vec::with_capacity(d.months.len() * 17);
    for i in 0..d.months.len() {
        raw.push(d.is_missing[i]);
        raw.extend_from_slice(&d.months[i].to_le_bytes());
        raw.extend_from_slice(&d.days[i].to_le_bytes());
        bytesio::write_i64_le(&mut raw, d.time_ms[i]);
    }
    ("calendarduration".to_string(), "calendarduration".to_string(), d.shape.clone(), false, raw, None)
}

fn canonicalize_categorical(c: &CategoricalArray) -> Canonical {
    let mut raw = Vec::new();
    bytesio::write_u32_le(&mut raw, c.categories.len() as u32);
    for cat in &c.categories {
        let bytes = cat.as_bytes();
        bytesio::write_u32_le(&mut raw, bytes.len() as u32);
        raw.extend_from_slice(bytes);
    }
    for code in &c.codes {
        bytesio::write_u32_le(&mut raw, *code);
    }
    ("categorical".to_string(), "categorical".to_string(), c.shape.clone(), false, raw, None)
}
