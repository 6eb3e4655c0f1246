//! Binary format constants and encoding primitives.
//!
//! The constants name the bytes the decoder matches on. The writers append
//! LEB128 integers, little-endian floats, names and whole sections to a
//! caller-provided `&mut Vec<u8>`; they are what tests and tools use to
//! assemble module binaries by hand.

use byteorder::{ByteOrder, LittleEndian};

// ---------------------------------------------------------------------------
// Module header
// ---------------------------------------------------------------------------

/// `"\0asm"` read as a little-endian u32
pub const MAGIC: u32 = 0x6d736100;
pub const VERSION: u32 = 1;
pub const HEADER_LEN: usize = 8;

// Section codes
pub const SECTION_CUSTOM: u8 = 0;
pub const SECTION_TYPE: u8 = 1;
pub const SECTION_IMPORT: u8 = 2;
pub const SECTION_FUNCTION: u8 = 3;
pub const SECTION_TABLE: u8 = 4;
pub const SECTION_MEMORY: u8 = 5;
pub const SECTION_GLOBAL: u8 = 6;
pub const SECTION_EXPORT: u8 = 7;
pub const SECTION_START: u8 = 8;
pub const SECTION_ELEMENT: u8 = 9;
pub const SECTION_CODE: u8 = 10;
pub const SECTION_DATA: u8 = 11;

// Type constructors, as the single byte of their varint7 encoding
pub const TYPE_I32: u8 = 0x7f;
pub const TYPE_I64: u8 = 0x7e;
pub const TYPE_F32: u8 = 0x7d;
pub const TYPE_F64: u8 = 0x7c;
pub const TYPE_ANYFUNC: u8 = 0x70;
pub const TYPE_FUNC: u8 = 0x60;

// Import/export descriptor kinds
pub const DESC_FUNC: u8 = 0x00;
pub const DESC_TABLE: u8 = 0x01;
pub const DESC_MEMORY: u8 = 0x02;
pub const DESC_GLOBAL: u8 = 0x03;

// Limits flags
pub const LIMITS_MIN: u8 = 0x00;
pub const LIMITS_MIN_MAX: u8 = 0x01;

// Name section
pub const NAME_SECTION: &str = "name";
pub const NAME_MODULE: u8 = 0;
pub const NAME_FUNCTION: u8 = 1;
pub const NAME_LOCAL: u8 = 2;

// Expression terminator
pub const OP_END: u8 = 0x0B;

// Block type: empty
pub const BLOCK_TYPE_EMPTY: u8 = 0x40;

// ---------------------------------------------------------------------------
// Unsigned LEB128
// ---------------------------------------------------------------------------

fn write_vu(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        }
        byte |= 0x80;
        buf.push(byte);
    }
}

pub fn write_vu32(buf: &mut Vec<u8>, v: u32) {
    write_vu(buf, v as u64);
}

pub fn write_vu64(buf: &mut Vec<u8>, v: u64) {
    write_vu(buf, v);
}

/// Appends a single-bit flag as a one-byte LEB128 value (0x00 or 0x01).
pub fn write_vu1(buf: &mut Vec<u8>, v: bool) {
    buf.push(if v { 1 } else { 0 });
}

// ---------------------------------------------------------------------------
// Signed LEB128
// ---------------------------------------------------------------------------

fn write_vs(buf: &mut Vec<u8>, mut value: i64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if (value == 0 && (byte & 0x40) == 0) || (value == -1 && (byte & 0x40) != 0) {
            buf.push(byte);
            break;
        }
        byte |= 0x80;
        buf.push(byte);
    }
}

pub fn write_vs32(buf: &mut Vec<u8>, v: i32) {
    write_vs(buf, v as i64);
}

pub fn write_vs64(buf: &mut Vec<u8>, v: i64) {
    write_vs(buf, v);
}

// ---------------------------------------------------------------------------
// IEEE 754 floats (little-endian)
// ---------------------------------------------------------------------------

pub fn write_f32(buf: &mut Vec<u8>, v: f32) {
    let mut bytes = [0u8; 4];
    LittleEndian::write_f32(&mut bytes, v);
    buf.extend_from_slice(&bytes);
}

pub fn write_f64(buf: &mut Vec<u8>, v: f64) {
    let mut bytes = [0u8; 8];
    LittleEndian::write_f64(&mut bytes, v);
    buf.extend_from_slice(&bytes);
}

// ---------------------------------------------------------------------------
// Vectors, names, sections
// ---------------------------------------------------------------------------

/// Appends a length-prefixed byte vector (vu32 length + raw bytes) to `buf`.
pub fn write_u8vec(buf: &mut Vec<u8>, v: &[u8]) {
    write_vu32(buf, v.len() as u32);
    buf.extend_from_slice(v);
}

/// Appends a length-prefixed UTF-8 name.
pub fn write_name(buf: &mut Vec<u8>, name: &str) {
    write_u8vec(buf, name.as_bytes());
}

/// Appends the 8-byte module header.
pub fn write_header(buf: &mut Vec<u8>) {
    let mut bytes = [0u8; 8];
    LittleEndian::write_u32(&mut bytes[..4], MAGIC);
    LittleEndian::write_u32(&mut bytes[4..], VERSION);
    buf.extend_from_slice(&bytes);
}

/// Appends a section with the given code and payload, computing its length.
pub fn write_section(buf: &mut Vec<u8>, code: u8, payload: &[u8]) {
    buf.push(code);
    write_u8vec(buf, payload);
}

/// Appends a custom section. The name is counted in the payload length.
pub fn write_custom_section(buf: &mut Vec<u8>, name: &str, payload: &[u8]) {
    let mut body = Vec::new();
    write_name(&mut body, name);
    body.extend_from_slice(payload);
    write_section(buf, SECTION_CUSTOM, &body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::reader::Reader;

    fn assert_eq_with_diag<T: std::fmt::Debug + std::cmp::PartialEq>(actual: T, expected: T) {
        assert!(
            actual == expected,
            "Assertion failed. Actual: {actual:?}, Expected: {expected:?}",
        );
    }

    fn encode_vu32(v: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        write_vu32(&mut buf, v);
        buf
    }

    fn encode_vs32(v: i32) -> Vec<u8> {
        let mut buf = Vec::new();
        write_vs32(&mut buf, v);
        buf
    }

    fn encode_vs64(v: i64) -> Vec<u8> {
        let mut buf = Vec::new();
        write_vs64(&mut buf, v);
        buf
    }

    #[test]
    fn test_write_vu32() {
        assert_eq_with_diag(encode_vu32(0), vec![0]);
        assert_eq_with_diag(encode_vu32(624485), vec![0b11100101, 0b10001110, 0b00100110]);
        assert_eq_with_diag(encode_vu32(127), vec![0x7f]);
        assert_eq_with_diag(encode_vu32(16256), vec![0x80, 0x7f]);
        assert_eq_with_diag(encode_vu32(0xffffffff), vec![0xff, 0xff, 0xff, 0xff, 0xf]);
        assert_eq_with_diag(encode_vu32(0x80000000), vec![128, 128, 128, 128, 8]);
    }

    #[test]
    fn test_write_vs32() {
        assert_eq_with_diag(encode_vs32(0), vec![0]);
        assert_eq_with_diag(encode_vs32(-1), vec![0x7f]);
        assert_eq_with_diag(encode_vs32(-128), vec![0x80, 0x7f]);
        assert_eq_with_diag(encode_vs32(42), vec![0x2a]);
        assert_eq_with_diag(encode_vs32(64), vec![0xc0, 0x00]);
        assert_eq_with_diag(encode_vs32(-624485), vec![0b10011011, 0b11110001, 0b01011001]);
        assert_eq_with_diag(encode_vs32(i32::MIN), vec![128, 128, 128, 128, 120]);
    }

    #[test]
    fn test_write_vs64() {
        assert_eq_with_diag(encode_vs64(-1), vec![0x7f]);
        assert_eq_with_diag(
            encode_vs64(0x7ff8000000000000),
            vec![128, 128, 128, 128, 128, 128, 128, 252, 255, 0],
        );
        assert_eq_with_diag(
            encode_vs64(i64::MIN),
            vec![128, 128, 128, 128, 128, 128, 128, 128, 128, 127],
        );
    }

    #[test]
    fn test_rt_vs32_boundaries() {
        let mut test_values = vec![0, 1, -1, i32::MAX, i32::MIN, 63, 64, -64, -65, 624485];
        for i in 0..31 {
            let value = 1i32 << i;
            test_values.push(value);
            test_values.push(-value);
            test_values.push(value - 1);
        }

        for &expected in &test_values {
            let byts = encode_vs32(expected);
            let mut reader = Reader::new(&byts);
            let actual = reader.read_vs32().unwrap_or_else(|_| {
                panic!("Failed to read vs32");
            });
            assert_eq_with_diag(actual, expected);
            assert_eq_with_diag(reader.remaining(), 0);
        }
    }

    #[test]
    fn test_write_f32_f64() {
        let mut buf = Vec::new();
        write_f32(&mut buf, 6.283_185_5);
        assert_eq!(buf, vec![219, 15, 201, 64]);

        let mut buf = Vec::new();
        write_f64(&mut buf, std::f64::consts::TAU);
        assert_eq!(buf, vec![24, 45, 68, 84, 251, 33, 25, 64]);
    }

    #[test]
    fn test_write_header() {
        let mut buf = Vec::new();
        write_header(&mut buf);
        assert_eq!(hex::encode(&buf), "0061736d01000000");
    }

    #[test]
    fn test_write_custom_section() {
        let mut buf = Vec::new();
        write_custom_section(&mut buf, "name", &[0xaa]);
        // length covers the name header as well as the payload
        assert_eq!(buf, vec![0x00, 0x06, 0x04, b'n', b'a', b'm', b'e', 0xaa]);
    }

    #[test]
    fn test_write_u8vec_into_buffer() {
        let mut buf = vec![0xBB];
        write_u8vec(&mut buf, &[0xDE, 0xAD]);
        assert_eq!(buf, vec![0xBB, 2, 0xDE, 0xAD]);
    }
}
