//! Little-endian byte helpers and checksums shared by every codec path.
//!
//! # Endianness
//! Every numeric field on disk is little-endian, independent of host
//! endianness. This is frozen for the format; a future big-endian variant
//! would need a distinct magic.
//!
//! # CRC32
//! Uses the IEEE 802.3 polynomial (the same one zlib uses), via
//! [`crc32fast`], initialised to all-ones and finalised by inversion —
//! `crc32fast` already implements that internally, so this module is a
//! thin, explicit wrapper documenting the contract at the call sites that
//! matter: the header CRC and the per-field payload CRC.

use byteorder::{ByteOrder, LittleEndian};
use crc32fast::Hasher;

/// CRC32 (IEEE 802.3 polynomial) of a byte slice.
#[inline]
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut h = Hasher::new();
    h.update(bytes);
    h.finalize()
}

/// Multiply every element of `dims` together, failing on overflow rather
/// than silently wrapping. Used to validate a field's declared `shape`
/// against its `usize` (spec: "shape-size products must match usize").
pub fn checked_shape_product(dims: &[u64]) -> Option<u64> {
    dims.iter().try_fold(1u64, |acc, &d| acc.checked_mul(d))
}

/// `a * b`, failing on overflow. Used when sizing payload buffers from
/// element counts and element widths.
#[inline]
pub fn checked_mul_usize(a: usize, b: usize) -> Option<usize> {
    a.checked_mul(b)
}

#[inline]
pub fn read_u16_le(buf: &[u8]) -> u16 {
    LittleEndian::read_u16(buf)
}

#[inline]
pub fn read_u32_le(buf: &[u8]) -> u32 {
    LittleEndian::read_u32(buf)
}

#[inline]
pub fn read_u64_le(buf: &[u8]) -> u64 {
    LittleEndian::read_u64(buf)
}

#[inline]
pub fn read_i64_le(buf: &[u8]) -> i64 {
    LittleEndian::read_i64(buf)
}

#[inline]
pub fn read_f64_le(buf: &[u8]) -> f64 {
    LittleEndian::read_f64(buf)
}

#[inline]
pub fn write_u32_le(out: &mut Vec<u8>, v: u32) {
    let mut b = [0u8; 4];
    LittleEndian::write_u32(&mut b, v);
    out.extend_from_slice(&b);
}

#[inline]
pub fn write_u64_le(out: &mut Vec<u8>, v: u64) {
    let mut b = [0u8; 8];
    LittleEndian::write_u64(&mut b, v);
    out.extend_from_slice(&b);
}

#[inline]
pub fn write_i64_le(out: &mut Vec<u8>, v: i64) {
    let mut b = [0u8; 8];
    LittleEndian::write_i64(&mut b, v);
    out.extend_from_slice(&b);
}

#[inline]
pub fn write_f64_le(out: &mut Vec<u8>, v: f64) {
    let mut b = [0u8; 8];
    LittleEndian::write_f64(&mut b, v);
    out.extend_from_slice(&b);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_matches_known_vector() {
        // "123456789" is the standard CRC-32/ISO-HDLC check string.
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn shape_product_overflow_is_detected() {
        assert_eq!(checked_shape_product(&[2, 3, 4]), Some(24));
        assert_eq!(checked_shape_product(&[u64::MAX, 2]), None);
    }

    #[test]
    fn le_roundtrip() {
        let mut out = Vec::new();
        write_u64_le(&mut out, 0x0102_0304_0506_0708);
        assert_eq!(read_u64_le(&out), 0x0102_0304_0506_0708);

        let mut out = Vec::new();
        write_f64_le(&mut out, 42.0);
        assert_eq!(read_f64_le(&out), 42.0);
    }
}
