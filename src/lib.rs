//! # gbf — GBF (GREDBIN) container format reference implementation
//!
//! Format guarantees:
//! - All numeric fields are little-endian; never negotiated
//! - Every file opens with a fixed 12-byte prefix (8-byte magic + 4-byte
//!   header length), followed by a JSON header, followed by a payload
//!   region of packed per-field bytes
//! - The header is self-checking: `header_crc32_hex` covers the header's
//!   own bytes with its own value zeroed out
//! - Every field's bytes are column-major and little-endian; complex
//!   numerics store the real part followed by the imaginary part
//! - A field is compressed with zlib, or not at all — there is no codec
//!   negotiation and no encryption
//! - Paths are dot-separated; a dotted path resolves against a struct
//!   field first, and only then as a boundary-respecting prefix match

pub mod bytesio;
pub mod codec;
pub mod error;
pub mod header;
pub mod json;
pub mod path;
pub mod reader;
pub mod value;
pub mod writer;

pub use error::{GbfError, Result};
pub use header::{FieldMeta, Header, MAGIC_BYTES, VERSION};
pub use reader::{read_file, read_header_only, read_var, ReadOptions};
pub use value::{
    CalendarDurationArray, CategoricalArray, CharArray, DatetimeArray, DurationArray, GbfValue, LogicalArray,
    NumericArray, NumericClass, OpaqueValue, StringArray, StructValue,
};
pub use writer::{write_file, CompressionMode, WriteOptions};
