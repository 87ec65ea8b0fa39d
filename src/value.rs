//! The in-memory value tree: every leaf and struct node a GBF file can hold.
//!
//! This mirrors the header's `kind`/`class` taxonomy one-to-one so that
//! `writer.rs` can walk a `GbfValue` tree depth-first and `reader.rs` can
//! rebuild an equivalent tree from a header plus payload bytes, without
//! either side needing to know about the other's encoding details.
//!
//! Numeric real/imaginary parts and all array payloads are kept as raw
//! little-endian bytes here (`real_le`/`imag_le`/`data`) rather than typed
//! Rust vectors, because the column-major byte layout is exactly what gets
//! written to disk — converting to/from typed slices happens at the edges
//! (`from_f64_column_major` and friends), not in the tree itself.

use crate::bytesio;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericClass {
    Double,
    Single,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
}

impl NumericClass {
    pub fn element_width(self) -> usize {
        match self {
            NumericClass::Double | NumericClass::Int64 | NumericClass::Uint64 => 8,
            NumericClass::Single | NumericClass::Int32 | NumericClass::Uint32 => 4,
            NumericClass::Int16 | NumericClass::Uint16 => 2,
            NumericClass::Int8 | NumericClass::Uint8 => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NumericClass::Double => "double",
            NumericClass::Single => "single",
            NumericClass::Int8 => "int8",
            NumericClass::Uint8 => "uint8",
            NumericClass::Int16 => "int16",
            NumericClass::Uint16 => "uint16",
            NumericClass::Int32 => "int32",
            NumericClass::Uint32 => "uint32",
            NumericClass::Int64 => "int64",
            NumericClass::Uint64 => "uint64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "double" => NumericClass::Double,
            "single" => NumericClass::Single,
            "int8" => NumericClass::Int8,
            "uint8" => NumericClass::Uint8,
            "int16" => NumericClass::Int16,
            "uint16" => NumericClass::Uint16,
            "int32" => NumericClass::Int32,
            "uint32" => NumericClass::Uint32,
            "int64" => NumericClass::Int64,
            "uint64" => NumericClass::Uint64,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericArray {
    pub shape: Vec<u64>,
    pub class: NumericClass,
    pub complex: bool,
    /// Column-major, little-endian, `element_width()` bytes per element.
    pub real_le: Vec<u8>,
    pub imag_le: Option<Vec<u8>>,
}

impl NumericArray {
    /// Builds a real-valued `double` array from row-major input, the shape
    /// most callers naturally have in hand, and stores it column-major as
    /// the on-disk format requires.
    pub fn from_f64_row_major(shape: &[u64], values: &[f64]) -> Self {
        let total = bytesio::checked_shape_product(shape).unwrap_or(0) as usize;
        assert_eq!(values.len(), total, "value count must match shape product");
        let column_major = reorder_row_to_column_major(shape, values);
        let mut real_le = Vec::with_capacity(column_major.len() * 8);
        for v in &column_major {
            bytesio::write_f64_le(&mut real_le, *v);
        }
        NumericArray { shape: shape.to_vec(), class: NumericClass::Double, complex: false, real_le, imag_le: None }
    }

    pub fn scalar(value: f64) -> Self {
        Self::from_f64_row_major(&[1, 1], &[value])
    }
}

/// Re-indexes a row-major flat buffer into column-major order for an
/// arbitrary N-dimensional shape.
fn reorder_row_to_column_major(shape: &[u64], values: &[f64]) -> Vec<f64> {
    if shape.len() <= 1 {
        return values.to_vec();
    }
    let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    let total: usize = dims.iter().product();
    let mut row_strides = vec![1usize; dims.len()];
    for i in (0..dims.len().saturating_sub(1)).rev() {
        row_strides[i] = row_strides[i + 1] * dims[i + 1];
    }
    let mut col_strides = vec![1usize; dims.len()];
    for i in 1..dims.len() {
        col_strides[i] = col_strides[i - 1] * dims[i - 1];
    }
    let mut out = vec![0.0; total];
    let mut idx = vec![0usize; dims.len()];
    for flat_row in 0..total {
        let mut rem = flat_row;
        for d in 0..dims.len() {
            idx[d] = rem / row_strides[d];
            rem %= row_strides[d];
        }
        let flat_col: usize = idx.iter().zip(&col_strides).map(|(i, s)| i * s).sum();
        out[flat_col] = values[flat_row];
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalArray {
    pub shape: Vec<u64>,
    /// One byte per element, column-major: 0 or 1.
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringArray {
    pub shape: Vec<u64>,
    /// Column-major; `None` marks a missing string (stored as a NULL marker
    /// byte, not an empty string, per the header's string encoding).
    pub data: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharArray {
    pub shape: Vec<u64>,
    /// UTF-16 code units, column-major, one `u16` per character cell.
    pub utf16: Vec<u16>,
}

impl CharArray {
    pub fn from_str_row(s: &str) -> Self {
        let units: Vec<u16> = s.encode_utf16().collect();
        CharArray { shape: vec![1, units.len() as u64], utf16: units }
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.utf16)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatetimeArray {
    pub shape: Vec<u64>,
    pub tz: Option<String>,
    pub locale: Option<String>,
    pub format: Option<String>,
    /// Column-major; `true` marks Not-a-Time (the backing `ms` value is
    /// then a don't-care sentinel, conventionally 0).
    pub is_nat: Vec<u8>,
    /// Column-major milliseconds since the Unix epoch (UTC).
    pub ms: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DurationArray {
    pub shape: Vec<u64>,
    pub is_nan: Vec<u8>,
    pub ms: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarDurationArray {
    pub shape: Vec<u64>,
    pub is_missing: Vec<u8>,
    pub months: Vec<i32>,
    pub days: Vec<i32>,
    pub time_ms: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalArray {
    pub shape: Vec<u64>,
    pub categories: Vec<String>,
    /// Column-major; code `0` means undefined/missing, codes `1..=N` index
    /// `categories[code - 1]`.
    pub codes: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueValue {
    pub shape: Vec<u64>,
    pub class_name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    /// Insertion-ordered fields, matching the struct's declared field order.
    pub fields: Vec<(String, GbfValue)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GbfValue {
    Struct(StructValue),
    /// A 0-field struct, distinguished from `Struct` so an empty struct
    /// still round-trips as a struct rather than vanishing.
    EmptyStruct,
    Numeric(NumericArray),
    Logical(LogicalArray),
    String(StringArray),
    Char(CharArray),
    Datetime(DatetimeArray),
    Duration(DurationArray),
    CalendarDuration(CalendarDurationArray),
    Categorical(CategoricalArray),
    Opaque(OpaqueValue),
}

impl GbfValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            GbfValue::Struct(_) => "struct",
            GbfValue::EmptyStruct => "empty_struct",
            GbfValue::Numeric(_) => "numeric",
            GbfValue::Logical(_) => "logical",
            GbfValue::String(_) => "string",
            GbfValue::Char(_) => "char",
            GbfValue::Datetime(_) => "datetime",
            GbfValue::Duration(_) => "duration",
            GbfValue::CalendarDuration(_) => "calendarduration",
            GbfValue::Categorical(_) => "categorical",
            GbfValue::Opaque(_) => "opaque",
        }
    }

    /// Resolves a dot-separated path against this tree. Exact struct-field
    /// matches take priority; a leaf further down a dotted path is only
    /// reached by descending through structs at each `.`-boundary.
    pub fn get_path(&self, path: &str) -> Option<&GbfValue> {
        let mut cur = self;
        if path.is_empty() {
            return Some(cur);
        }
        for segment in path.split('.') {
            match cur {
                GbfValue::Struct(s) => {
                    cur = &s.fields.iter().find(|(name, _)| name == segment)?.1;
                }
                _ => return None,
            }
        }
        Some(cur)
    }

    /// Depth-first walk, yielding `(dotted_path, &GbfValue)` for every leaf
    /// (non-struct) node. Struct nodes themselves are not yielded — only
    /// their descendants — matching the header's flat `fields` table, which
    /// lists leaves only. An `EmptyStruct` anywhere in the tree is yielded
    /// as its own leaf since it has no descendants to flatten into.
    pub fn walk_leaves<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a GbfValue)>) {
        match self {
            GbfValue::Struct(s) => {
                for (name, child) in &s.fields {
                    let path = if prefix.is_empty() { name.clone() } else { format!("{prefix}.{name}") };
                    child.walk_leaves(&path, out);
                }
            }
            _ => out.push((prefix.to_string(), self)),
        }
    }
}
