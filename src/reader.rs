//! Reads a `.gbf` file back into a [`GbfValue`] tree.
//!
//! Validation proceeds through the same stages the format's prefix enforces
//! in order: magic bytes, header length, header JSON syntax, header CRC,
//! version/endianness/order support, then — lazily, only for the fields
//! actually requested — per-field CRC and decompression. A failure at any
//! stage is terminal; there is no partial-success return.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, trace};

use crate::bytesio;
use crate::codec::{self, CodecId};
use crate::error::{GbfError, Result};
use crate::header::{FieldMeta, Header, MAGIC_BYTES, VERSION};
use crate::value::{
    CalendarDurationArray, CategoricalArray, CharArray, DatetimeArray, DurationArray, GbfValue, LogicalArray,
    NumericArray, NumericClass, OpaqueValue, StringArray, StructValue,
};

#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Verify header and per-field CRCs while reading. When false, a
    /// stored CRC of 0 is also always treated as "not recorded" and
    /// skipped, matching the writer's convention for `WriteOptions::crc == false`.
    pub validate: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions { validate: true }
    }
}

/// Reads and validates only the 12-byte prefix and header JSON, without
/// touching the payload. Used by the CLI's `header`/`tree` commands and by
/// `read_var` to avoid paying for fields the caller doesn't want.
pub fn read_header_only<P: AsRef<Path>>(path: P) -> Result<Header> {
    let mut f = File::open(path.as_ref())?;
    let (header, _header_bytes) = read_header_bytes(&mut f)?;
    Ok(header)
}

fn read_header_bytes(f: &mut File) -> Result<(Header, Vec<u8>)> {
    let mut prefix = [0u8; 12];
    f.read_exact(&mut prefix).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            GbfError::HeaderLengthInvalid(0)
        } else {
            GbfError::Io(e)
        }
    })?;

    let magic: [u8; 8] = prefix[0..8].try_into().unwrap();
    if magic != MAGIC_BYTES {
        return Err(GbfError::MagicMismatch { expected: MAGIC_BYTES, found: magic });
    }
    trace!(target: "gbf::reader", "magic ok");

    let header_len = bytesio::read_u32_le(&prefix[8..12]) as u64;
    let file_len = f.metadata()?.len();
    if header_len == 0 || 12 + header_len > file_len {
        return Err(GbfError::HeaderLengthInvalid(header_len));
    }

    let mut header_bytes = vec![0u8; header_len as usize];
    f.read_exact(&mut header_bytes)?;

    let json = crate::header::parse_header_json(&header_bytes)?;
    let header = Header::from_json(&json)?;

    if header.version != VERSION {
        return Err(GbfError::UnsupportedVersion(header.version));
    }
    if header.endianness != "little" {
        return Err(GbfError::UnsupportedEndianness(header.endianness.clone()));
    }
    if header.order != "col-major" {
        return Err(GbfError::UnsupportedOrder(header.order.clone()));
    }

    crate::header::validate_header_crc(&header, &header_bytes)?;
    validate_field_layout(&header)?;
    debug!(target: "gbf::reader", fields = header.fields.len(), "header validated");

    Ok((header, header_bytes))
}

/// Checks the §4.5 field-layout invariants: offsets are monotone and
/// non-overlapping, and every `[offset, offset+csize)` range lies within
/// the payload region `[0, file_size - payload_start)`. A header can pass
/// its own CRC check and still describe an overlapping or out-of-range
/// layout, so this runs as a separate step right after the header parses.
fn validate_field_layout(header: &Header) -> Result<()> {
    let payload_len = header.file_size.saturating_sub(header.payload_start);
    let mut prev_end: u64 = 0;
    for field in &header.fields {
        let end = field
            .offset
            .checked_add(field.csize)
            .ok_or_else(|| GbfError::FieldLayoutInvalid(format!("field '{}' offset+csize overflows", field.path)))?;
        if field.offset < prev_end {
            return Err(GbfError::FieldLayoutInvalid(format!(
                "field '{}' at offset {} overlaps the preceding field ending at {}",
                field.path, field.offset, prev_end
            )));
        }
        if end > payload_len {
            return Err(GbfError::FieldLayoutInvalid(format!(
                "field '{}' range [{}, {}) exceeds payload region of {} bytes",
                field.path, field.offset, end, payload_len
            )));
        }
        prev_end = end;
    }
    Ok(())
}

pub fn read_file<P: AsRef<Path>>(path: P, opts: ReadOptions) -> Result<GbfValue> {
    let mut f = File::open(path.as_ref())?;
    let (header, _) = read_header_bytes(&mut f)?;
    build_tree(&header, &mut f, opts)
}

/// Reads a single variable at `var_path` without decoding sibling fields.
pub fn read_var<P: AsRef<Path>>(path: P, var_path: &str, opts: ReadOptions) -> Result<GbfValue> {
    let mut f = File::open(path.as_ref())?;
    let (header, _) = read_header_bytes(&mut f)?;

    let matches = header.fields_under(var_path);
    if matches.is_empty() {
        return Err(GbfError::VarNotFound { path: var_path.to_string() });
    }

    if matches.len() == 1 && matches[0].path == var_path {
        return decode_field(matches[0], header.payload_start, &mut f, opts);
    }

    // var_path names a struct prefix: build only the matching subtree.
    let sub_fields: Vec<FieldMeta> = matches.into_iter().cloned().collect();
    let prefix = format!("{var_path}.");
    let stripped: Vec<FieldMeta> = sub_fields
        .into_iter()
        .map(|mut meta| {
            meta.path = meta.path.strip_prefix(&prefix).unwrap_or(&meta.path).to_string();
            meta
        })
        .collect();
    let sub_header = Header { fields: stripped, ..header };
    build_tree(&sub_header, &mut f, opts)
}

fn build_tree(header: &Header, f: &mut File, opts: ReadOptions) -> Result<GbfValue> {
    let mut root = StructValue { fields: Vec::new() };
    for field in &header.fields {
        let leaf = decode_field(field, header.payload_start, f, opts)?;
        insert_at_path(&mut root, &field.path, leaf);
    }
    Ok(GbfValue::Struct(root))
}

fn insert_at_path(root: &mut StructValue, path: &str, leaf: GbfValue) {
    let segments: Vec<&str> = path.split('.').collect();
    let mut current = root;
    for (i, segment) in segments.iter().enumerate() {
        let is_last = i == segments.len() - 1;
        if is_last {
            current.fields.push((segment.to_string(), leaf));
            return;
        }
        let idx = current.fields.iter().position(|(name, _)| name == segment);
        let idx = match idx {
            Some(idx) => idx,
            None => {
                current.fields.push((segment.to_string(), GbfValue::Struct(StructValue { fields: Vec::new() })));
                current.fields.len() - 1
            }
        };
        match &mut current.fields[idx].1 {
            GbfValue::Struct(s) => current = s,
            _ => unreachable!("intermediate path segment must be a struct"),
        }
    }
}

fn decode_field(field: &FieldMeta, payload_start: u64, f: &mut File, opts: ReadOptions) -> Result<GbfValue> {
    if field.kind == "empty_struct" {
        return Ok(GbfValue::EmptyStruct);
    }

    f.seek(SeekFrom::Start(payload_start + field.offset))?;
    let mut compressed = vec![0u8; field.csize as usize];
    f.read_exact(&mut compressed)?;

    let codec_id = CodecId::from_name(&field.compression)
        .ok_or_else(|| GbfError::FieldLayoutInvalid(format!("unknown compression '{}' for '{}'", field.compression, field.path)))?;
    let raw = codec::get_codec(codec_id)
        .decompress(&compressed, field.usize as usize)
        .map_err(|e| GbfError::DecompressionFailed(format!("{}: {e}", field.path)))?;

    if opts.validate && field.crc32 != 0 {
        let got = bytesio::crc32(&raw);
        if got != field.crc32 {
            return Err(GbfError::FieldCrcMismatch { path: field.path.clone(), expected: field.crc32, got });
        }
    }

    decode_leaf(field, &raw)
}

fn decode_leaf(field: &FieldMeta, raw: &[u8]) -> Result<GbfValue> {
    match field.kind.as_str() {
        "numeric" => decode_numeric(field, raw),
        "logical" => Ok(GbfValue::Logical(LogicalArray { shape: field.shape.clone(), data: raw.to_vec() })),
        "string" => decode_string(field, raw),
        "char" => decode_char(field, raw),
        "datetime" => decode_datetime(field, raw),
        "duration" => decode_duration(field, raw),
        "calendarduration" => decode_calendar_duration(field, raw),
        "categorical" => decode_categorical(field, raw),
        "opaque" => Ok(GbfValue::Opaque(OpaqueValue { shape: field.shape.clone(), class_name: field.class.clone(), data: raw.to_vec() })),
        other => Err(GbfError::FieldLayoutInvalid(format!("unknown field kind '{other}'"))),
    }
}

fn decode_numeric(field: &FieldMeta, raw: &[u8]) -> Result<GbfValue> {
    let class = NumericClass::from_name(&field.class)
        .ok_or_else(|| GbfError::TypeMismatch { expected: "numeric class".to_string(), found: field.class.clone() })?;
    let width = class.element_width();
    let count = bytesio::checked_shape_product(&field.shape).unwrap_or(0) as usize;
    let expected_len = if field.complex { count * width * 2 } else { count * width };
    if raw.len() != expected_len {
        return Err(GbfError::FieldLayoutInvalid(format!(
            "numeric field '{}' payload length {} does not match shape*width {}",
            field.path,
            raw.len(),
            expected_len
        )));
    }
    let (real_le, imag_le) = if field.complex {
        (raw[..count * width].to_vec(), Some(raw[count * width..].to_vec()))
    } else {
        (raw.to_vec(), None)
    };
    Ok(GbfValue::Numeric(NumericArray { shape: field.shape.clone(), class, complex: field.complex, real_le, imag_le }))
}

fn decode_string(field: &FieldMeta, raw: &[u8]) -> Result<GbfValue> {
    let count = bytesio::checked_shape_product(&field.shape).unwrap_or(0) as usize;
    let mut data = Vec::with_capacity(count);
    let mut pos = 0usize;
    for _ in 0..count {
        if pos + 4 > raw.len() {
            return Err(GbfError::FieldLayoutInvalid(format!("string field '{}' truncated", field.path)));
        }
        let len = bytesio::read_u32_le(&raw[pos..pos + 4]);
        pos += 4;
        if len == u32::MAX {
            data.push(None);
            continue;
        }
        let len = len as usize;
        if pos + len > raw.len() {
            return Err(GbfError::FieldLayoutInvalid(format!("string field '{}' truncated", field.path)));
        }
        let s = std::str::from_utf8(&raw[pos..pos + len])
            .map_err(|_| GbfError::FieldLayoutInvalid(format!("string field '{}' is not valid UTF-8", field.path)))?
            .to_string();
        data.push(Some(s));
        pos += len;
    }
    Ok(GbfValue::String(StringArray { shape: field.shape.clone(), data }))
}

fn decode_char(field: &FieldMeta, raw: &[u8]) -> Result<GbfValue> {
    if raw.len() % 2 != 0 {
        return Err(GbfError::FieldLayoutInvalid(format!("char field '{}' has odd byte length", field.path)));
    }
    let utf16 = raw.chunks(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
    Ok(GbfValue::Char(CharArray { shape: field.shape.clone(), utf16 }))
}

/// Reads one `write_opt_string`-encoded field: a `u32` byte length (or
/// `u32::MAX` for `None`) followed by that many UTF-8 bytes.
fn read_opt_string(field: &FieldMeta, raw: &[u8], pos: &mut usize) -> Result<Option<String>> {
    if *pos + 4 > raw.len() {
        return Err(GbfError::FieldLayoutInvalid(format!("datetime field '{}' truncated", field.path)));
    }
    let len = bytesio::read_u32_le(&raw[*pos..*pos + 4]);
    *pos += 4;
    if len == u32::MAX {
        return Ok(None);
    }
    let len = len as usize;
    if *pos + len > raw.len() {
        return Err(GbfError::FieldLayoutInvalid(format!("datetime field '{}' truncated", field.path)));
    }
    let s = std::str::from_utf8(&raw[*pos..*pos + len])
        .map_err(|_| GbfError::FieldLayoutInvalid(format!("datetime field '{}' is not valid UTF-8", field.path)))?
        .to_string();
    *pos += len;
    Ok(Some(s))
}

fn decode_datetime(field: &FieldMeta, raw: &[u8]) -> Result<GbfValue> {
    let count = bytesio::checked_shape_product(&field.shape).unwrap_or(0) as usize;
    let mut pos = 0usize;
    let tz = read_opt_string(field, raw, &mut pos)?;
    let locale = read_opt_string(field, raw, &mut pos)?;
    let format = read_opt_string(field, raw, &mut pos)?;
    if raw.len() - pos != count * 9 {
        return Err(GbfError::FieldLayoutInvalid(format!("datetime field '{}' has unexpected length", field.path)));
    }
    let mut is_nat = Vec::with_capacity(count);
    let mut ms = Vec::with_capacity(count);
    for chunk in raw[pos..].chunks(9) {
        is_nat.push(chunk[0]);
        ms.push(bytesio::read_i64_le(&chunk[1..9]));
    }
    Ok(GbfValue::Datetime(DatetimeArray { shape: field.shape.clone(), tz, locale, format, is_nat, ms }))
}

fn decode_duration(field: &FieldMeta, raw: &[u8]) -> Result<GbfValue> {
    let count = bytesio::checked_shape_product(&field.shape).unwrap_or(0) as usize;
    if raw.len() != count * 9 {
        return Err(GbfError::FieldLayoutInvalid(format!("duration field '{}' has unexpected length", field.path)));
    }
    let mut is_nan = Vec::with_capacity(count);
    let mut ms = Vec::with_capacity(count);
    for chunk in raw.chunks(9) {
        is_nan.push(chunk[0]);
        ms.push(bytesio::read_i64_le(&chunk[1..9]));
    }
    Ok(GbfValue::Duration(DurationArray { shape: field.shape.clone(), is_nan, ms }))
}

fn decode_calendar_duration(field: &FieldMeta, raw: &[u8]) -> Result<GbfValue> {
    let count = bytesio::checked_shape_product(&field.shape).unwrap_or(0) as usize;
    if raw.len() != count * 17 {
        return Err(GbfError::FieldLayoutInvalid(format!("calendarDuration field '{}' has unexpected length", field.path)));
    }
    let mut is_missing = Vec::with_capacity(count);
    let mut months = Vec::with_capacity(count);
    let mut days = Vec::with_capacity(count);
    let mut time_ms = Vec::with_capacity(count);
    for chunk in raw.chunks(17) {
        is_missing.push(chunk[0]);
        months.push(i32::from_le_bytes(chunk[1..5].try_into().unwrap()));
        days.push(i32::from_le_bytes(chunk[5..9].try_into().unwrap()));
        time_ms.push(bytesio::read_i64_le(&chunk[9..17]));
    }
    Ok(GbfValue::CalendarDuration(CalendarDurationArray { shape: field.shape.clone(), is_missing, months, days, time_ms }))
}

fn decode_categorical(field: &FieldMeta, raw: &[u8]) -> Result<GbfValue> {
    if raw.len() < 4 {
        return Err(GbfError::FieldLayoutInvalid(format!("categorical field '{}' truncated", field.path)));
    }
    let mut pos = 0usize;
    let n_categories = bytesio::read_u32_le(&raw[pos..pos + 4]) as usize;
    pos += 4;
    let mut categories = Vec::with_capacity(n_categories);
    for _ in 0..n_categories {
        if pos + 4 > raw.len() {
            return Err(GbfError::FieldLayoutInvalid(format!("categorical field '{}' truncated", field.path)));
        }
        let len = bytesio::read_u32_le(&raw[pos..pos + 4]) as usize;
        pos += 4;
        if pos + len > raw.len() {
            return Err(GbfError::FieldLayoutInvalid(format!("categorical field '{}' truncated", field.path)));
        }
        let cat = std::str::from_utf8(&raw[pos..pos + len])
            .map_err(|_| GbfError::FieldLayoutInvalid(format!("categorical field '{}' is not valid UTF-8", field.path)))?
            .to_string();
        categories.push(cat);
        pos += len;
    }
    if (raw.len() - pos) % 4 != 0 {
        return Err(GbfError::FieldLayoutInvalid(format!("categorical field '{}' has unexpected length", field.path)));
    }
    let codes = raw[pos..].chunks(4).map(bytesio::read_u32_le).collect();
    Ok(GbfValue::Categorical(CategoricalArray { shape: field.shape.clone(), categories, codes }))
}
