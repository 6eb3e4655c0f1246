use byteorder::{ByteOrder, LittleEndian};

use super::error::ParseError;

/// Cursor over a borrowed byte buffer.
///
/// Every read either advances `pos` by exactly the bytes it consumed or fails
/// with [`ParseError::UnexpectedEof`]; the cursor never walks past the end of
/// `bytes`. `base` is the absolute offset of `bytes[0]` in the enclosing
/// module so that errors and instruction positions are reported against the
/// original input even when reading a section payload.
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Reader<'a> {
        Reader {
            bytes,
            pos: 0,
            base: 0,
        }
    }

    /// Reader over a sub-slice that starts at `base` in the parent buffer.
    pub fn with_base(bytes: &'a [u8], base: usize) -> Reader<'a> {
        Reader { bytes, pos: 0, base }
    }
}

impl<'a> Reader<'a> {
    // Basic operations --------------------------------------------------------
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Absolute position in the original module buffer.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn has_at_least(&self, count: usize) -> bool {
        self.remaining() >= count
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn eof(&self, needed: usize) -> ParseError {
        ParseError::UnexpectedEof {
            offset: self.offset(),
            needed,
            available: self.remaining(),
        }
    }

    pub fn read_byte(&mut self) -> Result<u8, ParseError> {
        match self.bytes.get(self.pos) {
            Some(&byte) => {
                self.pos += 1;
                Ok(byte)
            }
            None => Err(self.eof(1)),
        }
    }

    pub fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    /// Borrow the next `len` bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        if !self.has_at_least(len) {
            return Err(self.eof(len));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Reject vector counts that cannot possibly fit in what is left of the
    /// buffer, before anything is allocated for them. Every vector element
    /// occupies at least one byte.
    pub fn validate_item_count(&self, count: u32) -> Result<(), ParseError> {
        if count as usize > self.remaining() {
            return Err(self.eof(count as usize));
        }
        Ok(())
    }

    // Read and interpret types ------------------------------------------------

    // le
    pub fn read_u32(&mut self) -> Result<u32, ParseError> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    // le
    pub fn read_u64(&mut self) -> Result<u64, ParseError> {
        Ok(LittleEndian::read_u64(self.read_bytes(8)?))
    }

    /// Unsigned LEB128 of nominal bit width `size`.
    ///
    /// Stops at the first byte with the continuation bit clear or after
    /// `ceil(size / 7)` bytes, whichever comes first.
    pub fn read_vu(&mut self, size: u32) -> Result<u64, ParseError> {
        let start = self.offset();
        let mut result: u64 = 0;
        let max_bytes = (size + 6) / 7;

        for i in 0..max_bytes {
            let b = self.read_byte()? as u64;
            let shift = 7 * i;
            let value = b & 0x7f;
            if shift >= 64 || (shift > 0 && value >> (64 - shift) != 0) {
                return Err(ParseError::IntegerTooLarge { offset: start });
            }
            result |= value << shift;
            if (b & 0x80) == 0 {
                break;
            }
        }

        Ok(result)
    }

    /// Signed LEB128 of nominal bit width `size`, sign-extended from the last
    /// byte read.
    pub fn read_vs(&mut self, size: u32) -> Result<i64, ParseError> {
        let mut result: i64 = 0;
        let mut shift = 0;
        let max_bytes = (size + 6) / 7;

        for _ in 0..max_bytes {
            let b = self.read_byte()?;
            if shift < 64 {
                result |= ((b & 0x7f) as i64) << shift;
            }
            shift += 7;
            if (b & 0x80) == 0 {
                if shift < 64 && (b & 0x40) != 0 {
                    result |= -1i64 << shift;
                }
                break;
            }
        }
        Ok(result)
    }

    pub fn read_vu1(&mut self) -> Result<u8, ParseError> {
        self.read_vu(1).map(|v| v as u8)
    }

    pub fn read_vu7(&mut self) -> Result<u8, ParseError> {
        self.read_vu(7).map(|v| v as u8)
    }

    pub fn read_vu32(&mut self) -> Result<u32, ParseError> {
        self.read_vu(32).map(|v| v as u32)
    }

    pub fn read_vu64(&mut self) -> Result<u64, ParseError> {
        self.read_vu(64)
    }

    pub fn read_vs7(&mut self) -> Result<i8, ParseError> {
        self.read_vs(7).map(|v| v as i8)
    }

    pub fn read_vs32(&mut self) -> Result<i32, ParseError> {
        self.read_vs(32).map(|v| v as i32)
    }

    pub fn read_vs64(&mut self) -> Result<i64, ParseError> {
        self.read_vs(64)
    }

    pub fn read_f32(&mut self) -> Result<f32, ParseError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, ParseError> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// `len` bytes decoded as UTF-8.
    pub fn read_string(&mut self, len: usize) -> Result<String, ParseError> {
        let offset = self.offset();
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ParseError::InvalidUtf8 { offset })
    }

    /// A varuint32 length followed by that many UTF-8 bytes.
    pub fn read_name(&mut self) -> Result<String, ParseError> {
        let len = self.read_vu32()?;
        self.read_string(len as usize)
    }

    /// Hand the next `len` bytes to an independent reader.
    pub fn sub_reader(&mut self, len: usize) -> Result<Reader<'a>, ParseError> {
        let base = self.offset();
        let bytes = self.read_bytes(len)?;
        Ok(Reader::with_base(bytes, base))
    }
}
