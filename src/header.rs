//! The GBF header: a typed view over the JSON object that precedes the
//! payload region, plus the placeholder/patch CRC dance that lets the
//! header certify its own integrity without a chicken-and-egg problem.
//!
//! # CRC placement
//! `header_crc32_hex` is itself a field inside the JSON it's checksumming.
//! The trick (inherited unchanged from the format this crate's predecessor
//! used): hash the header with the field's 8 hex characters all replaced
//! with ASCII `'0'`, store that hash in the real field, and on read, redo
//! the same zero-out-and-hash to verify. No length-prefix or out-of-band
//! checksum is needed.

use crate::error::{GbfError, Result};
use crate::json::{self, Number, Value};

pub const MAGIC_BYTES: [u8; 8] = *b"GREDBIN\0";
pub const VERSION: u32 = 1;
pub const FORMAT_NAME: &str = "GBF";
pub const DEFAULT_ENDIANNESS: &str = "little";
pub const DEFAULT_ORDER: &str = "col-major";

#[derive(Debug, Clone, PartialEq)]
pub struct FieldMeta {
    /// Dot-separated path from the struct root to this leaf.
    pub path: String,
    /// One of: struct, numeric, logical, string, char, datetime, duration,
    /// calendarDuration, categorical, opaque.
    pub kind: String,
    /// Subtype within `kind` (numeric class name, opaque class name, or
    /// empty where the kind has no subtype).
    pub class: String,
    pub shape: Vec<u64>,
    pub complex: bool,
    /// "none" or "zlib".
    pub compression: String,
    pub offset: u64,
    pub csize: u64,
    pub usize: u64,
    /// CRC32 of the uncompressed field bytes; 0 means "not recorded"
    /// (written when `WriteOptions::crc` is false).
    pub crc32: u32,
    /// Optional encoding note (e.g. `"utf-16-codeunits"` for char fields).
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub format: String,
    pub magic: String,
    pub version: u32,
    pub endianness: String,
    pub order: String,
    pub root: String,
    pub fields: Vec<FieldMeta>,
    pub payload_start: u64,
    pub file_size: u64,
    pub header_crc32_hex: String,
}

impl Header {
    pub fn find_field(&self, path: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.path == path)
    }

    /// Resolves `path` against the field table the way `GbfValue::get_path`
    /// resolves it against an in-memory tree: an exact match, or — for a
    /// struct-shaped prefix with no literal field of its own — every field
    /// whose path starts with `path` followed by a `.` boundary.
    pub fn fields_under(&self, path: &str) -> Vec<&FieldMeta> {
        if let Some(exact) = self.find_field(path) {
            return vec![exact];
        }
        self.fields.iter().filter(|f| crate::path::is_under(&f.path, path)).collect()
    }

    pub fn to_json(&self) -> Value {
        let fields = self
            .fields
            .iter()
            .map(|f| {
                let mut pairs = vec![
                    ("name".to_string(), Value::String(f.path.clone())),
                    ("kind".to_string(), Value::String(f.kind.clone())),
                    ("class_name".to_string(), Value::String(f.class.clone())),
                    (
                        "shape".to_string(),
                        Value::Array(f.shape.iter().map(|&d| Value::Number(Number::from_u64(d))).collect()),
                    ),
                    ("complex".to_string(), Value::Bool(f.complex)),
                    ("compression".to_string(), Value::String(f.compression.clone())),
                    ("offset".to_string(), Value::Number(Number::from_u64(f.offset))),
                    ("csize".to_string(), Value::Number(Number::from_u64(f.csize))),
                    ("usize".to_string(), Value::Number(Number::from_u64(f.usize))),
                    ("crc32".to_string(), Value::Number(Number::from_u64(f.crc32 as u64))),
                ];
                if let Some(encoding) = &f.encoding {
                    pairs.push(("encoding".to_string(), Value::String(encoding.clone())));
                }
                Value::Object(pairs)
            })
            .collect();

        Value::Object(vec![
            ("format".to_string(), Value::String(self.format.clone())),
            ("magic".to_string(), Value::String(self.magic.clone())),
            ("version".to_string(), Value::Number(Number::from_u64(self.version as u64))),
            ("endianness".to_string(), Value::String(self.endianness.clone())),
            ("order".to_string(), Value::String(self.order.clone())),
            ("root".to_string(), Value::String(self.root.clone())),
            ("payload_start".to_string(), Value::Number(Number::from_u64(self.payload_start))),
            ("file_size".to_string(), Value::Number(Number::from_u64(self.file_size))),
            ("header_crc32_hex".to_string(), Value::String(self.header_crc32_hex.clone())),
            ("fields".to_string(), Value::Array(fields)),
        ])
    }

    pub fn from_json(v: &Value) -> Result<Self> {
        let get_str = |key: &str| -> Result<String> {
            v.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| GbfError::FieldLayoutInvalid(format!("header missing string field '{key}'")))
        };
        let get_u64 = |key: &str| -> Result<u64> {
            v.get(key)
                .and_then(Value::as_u64)
                .ok_or_else(|| GbfError::FieldLayoutInvalid(format!("header missing numeric field '{key}'")))
        };

        let fields_json = v
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| GbfError::FieldLayoutInvalid("header missing 'fields' array".into()))?;

        let mut fields = Vec::with_capacity(fields_json.len());
        for fv in fields_json {
            fields.push(field_from_json(fv)?);
        }

        Ok(Header {
            format: get_str("format")?,
            magic: get_str("magic")?,
            version: get_u64("version")? as u32,
            endianness: get_str("endianness").unwrap_or_else(|_| DEFAULT_ENDIANNESS.to_string()),
            order: get_str("order").unwrap_or_else(|_| DEFAULT_ORDER.to_string()),
            root: get_str("root").unwrap_or_default(),
            fields,
            payload_start: get_u64("payload_start")?,
            file_size: get_u64("file_size")?,
            header_crc32_hex: get_str("header_crc32_hex")?,
        })
    }
}

fn field_from_json(v: &Value) -> Result<FieldMeta> {
    let get_str = |key: &str| -> Result<String> {
        v.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GbfError::FieldLayoutInvalid(format!("field missing string '{key}'")))
    };
    let shape = v
        .get("shape")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_u64).collect())
        .unwrap_or_default();

    Ok(FieldMeta {
        path: get_str("name")?,
        kind: get_str("kind")?,
        class: v.get("class_name").and_then(Value::as_str).unwrap_or_default().to_string(),
        shape,
        complex: v.get("complex").and_then(Value::as_bool).unwrap_or(false),
        compression: v.get("compression").and_then(Value::as_str).unwrap_or("none").to_string(),
        offset: v.get("offset").and_then(Value::as_u64).unwrap_or(0),
        csize: v.get("csize").and_then(Value::as_u64).unwrap_or(0),
        usize: v.get("usize").and_then(Value::as_u64).unwrap_or(0),
        crc32: v.get("crc32").and_then(Value::as_u64).unwrap_or(0) as u32,
        encoding: v.get("encoding").and_then(Value::as_str).map(str::to_string),
    })
}

/// Computes the header CRC over `header_json` with `header_crc32_hex`'s
/// value zeroed out, as both `write_file` (before patching the real value
/// in) and `read_header` (to verify) must.
pub fn compute_header_crc(header_json: &[u8]) -> Result<u32> {
    let zeroed = zero_out_crc_field(header_json)?;
    Ok(crate::bytesio::crc32(&zeroed))
}

/// Replaces the value of the top-level `"header_crc32_hex"` key with eight
/// ASCII `'0'` characters, byte-for-byte, so the replacement doesn't shift
/// any other byte in the document (keeping the hash stable regardless of
/// whether it's computed before or after the placeholder is patched in).
fn zero_out_crc_field(header_json: &[u8]) -> Result<Vec<u8>> {
    let needle = b"\"header_crc32_hex\":\"";
    let pos = find_subslice(header_json, needle)
        .ok_or_else(|| GbfError::FieldLayoutInvalid("header_crc32_hex key not found verbatim in header JSON".into()))?;
    let value_start = pos + needle.len();
    if header_json.len() < value_start + 8 || header_json[value_start + 8] != b'"' {
        return Err(GbfError::FieldLayoutInvalid("header_crc32_hex value is not 8 characters".into()));
    }
    let mut out = header_json.to_vec();
    out[value_start..value_start + 8].copy_from_slice(b"00000000");
    Ok(out)
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Serializes `header` with `header_crc32_hex` set to its correct value:
/// emit once with a placeholder, compute the CRC over that exact byte
/// layout, then patch the value in place (same length, so no other offset
/// moves).
pub fn serialize_with_crc(header: &Header) -> Result<Vec<u8>> {
    let mut placeholder = header.clone();
    placeholder.header_crc32_hex = "0".repeat(8);
    let json_bytes = placeholder.to_json().to_bytes();
    let crc = crate::bytesio::crc32(&zero_out_crc_field(&json_bytes)?);
    let hex = format!("{crc:08x}");

    let mut finalized = header.clone();
    finalized.header_crc32_hex = hex;
    Ok(finalized.to_json().to_bytes())
}

/// Validates the header's own CRC. A `header_crc32_hex` of all zeros (or
/// empty) is treated as "not recorded" and skipped, matching the same
/// convention used for per-field CRCs.
pub fn validate_header_crc(header: &Header, header_json: &[u8]) -> Result<()> {
    if header.header_crc32_hex.is_empty() || header.header_crc32_hex == "00000000" {
        return Ok(());
    }
    let got = compute_header_crc(header_json)?;
    let got_hex = format!("{got:08x}");
    if got_hex != header.header_crc32_hex {
        return Err(GbfError::HeaderCrcMismatch { expected: header.header_crc32_hex.clone(), got: got_hex });
    }
    Ok(())
}

pub fn parse_header_json(bytes: &[u8]) -> Result<Value> {
    json::parse(bytes).map_err(GbfError::from)
}
