//! Linear memory
//!
//! A zero-initialised byte buffer sized in 64 KiB pages. Every access is
//! bounds-checked; multi-byte values are little-endian and need no
//! alignment.

use byteorder::{ByteOrder, LittleEndian};

use super::RuntimeError;

/// Page size in bytes (64 KiB)
pub const PAGE_SIZE: usize = 65536;

/// Maximum number of pages for a 32-bit address space (4 GiB)
pub const MAX_PAGES: u32 = 65536;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    data: Vec<u8>,
    current_pages: u32,
    max_pages: Option<u32>,
}

impl Memory {
    pub fn new(initial_pages: u32, max_pages: Option<u32>) -> Result<Self, RuntimeError> {
        if initial_pages > MAX_PAGES {
            return Err(RuntimeError::MemoryError(format!(
                "Initial memory size {initial_pages} pages exceeds maximum {MAX_PAGES} pages"
            )));
        }

        if let Some(max) = max_pages {
            if initial_pages > max {
                return Err(RuntimeError::MemoryError(format!(
                    "Initial size {initial_pages} pages exceeds specified maximum {max} pages"
                )));
            }
            if max > MAX_PAGES {
                return Err(RuntimeError::MemoryError(format!(
                    "Maximum size {max} pages exceeds system maximum {MAX_PAGES} pages"
                )));
            }
        }

        Ok(Memory {
            data: vec![0u8; initial_pages as usize * PAGE_SIZE],
            current_pages: initial_pages,
            max_pages,
        })
    }

    /// Current size in pages
    pub fn size(&self) -> u32 {
        self.current_pages
    }

    pub fn max_pages(&self) -> Option<u32> {
        self.max_pages
    }

    /// Current size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Grow by `delta_pages`. Returns the previous size in pages, or -1 if
    /// the new size would exceed the maximum.
    pub fn grow(&mut self, delta_pages: u32) -> i32 {
        let current = self.current_pages;

        let Some(new_pages) = current.checked_add(delta_pages) else {
            return -1;
        };
        if new_pages > self.max_pages.unwrap_or(MAX_PAGES) {
            return -1;
        }

        let new_bytes = new_pages as usize * PAGE_SIZE;
        match self.data.try_reserve(new_bytes - self.data.len()) {
            Ok(()) => {
                self.data.resize(new_bytes, 0);
                self.current_pages = new_pages;
                current as i32
            }
            Err(_) => -1,
        }
    }

    /// The byte range `addr..addr + size`, if it lies inside the buffer.
    #[inline]
    fn range(&self, addr: u32, size: usize) -> Result<std::ops::Range<usize>, RuntimeError> {
        let start = addr as usize;
        let end = start.checked_add(size).ok_or_else(|| {
            RuntimeError::MemoryError(format!(
                "Memory access overflow: address {start} + size {size} overflows"
            ))
        })?;
        if end > self.data.len() {
            return Err(RuntimeError::MemoryError(format!(
                "out of bounds memory access: {start}..{end} of {}",
                self.data.len()
            )));
        }
        Ok(start..end)
    }

    pub fn read_u8(&self, addr: u32) -> Result<u8, RuntimeError> {
        let r = self.range(addr, 1)?;
        Ok(self.data[r.start])
    }

    pub fn read_u16(&self, addr: u32) -> Result<u16, RuntimeError> {
        Ok(LittleEndian::read_u16(&self.data[self.range(addr, 2)?]))
    }

    pub fn read_u32(&self, addr: u32) -> Result<u32, RuntimeError> {
        Ok(LittleEndian::read_u32(&self.data[self.range(addr, 4)?]))
    }

    pub fn read_u64(&self, addr: u32) -> Result<u64, RuntimeError> {
        Ok(LittleEndian::read_u64(&self.data[self.range(addr, 8)?]))
    }

    pub fn read_i8(&self, addr: u32) -> Result<i8, RuntimeError> {
        Ok(self.read_u8(addr)? as i8)
    }

    pub fn read_i16(&self, addr: u32) -> Result<i16, RuntimeError> {
        Ok(LittleEndian::read_i16(&self.data[self.range(addr, 2)?]))
    }

    pub fn read_i32(&self, addr: u32) -> Result<i32, RuntimeError> {
        Ok(LittleEndian::read_i32(&self.data[self.range(addr, 4)?]))
    }

    pub fn read_i64(&self, addr: u32) -> Result<i64, RuntimeError> {
        Ok(LittleEndian::read_i64(&self.data[self.range(addr, 8)?]))
    }

    pub fn read_f32(&self, addr: u32) -> Result<f32, RuntimeError> {
        Ok(LittleEndian::read_f32(&self.data[self.range(addr, 4)?]))
    }

    pub fn read_f64(&self, addr: u32) -> Result<f64, RuntimeError> {
        Ok(LittleEndian::read_f64(&self.data[self.range(addr, 8)?]))
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) -> Result<(), RuntimeError> {
        let r = self.range(addr, 1)?;
        self.data[r.start] = value;
        Ok(())
    }

    pub fn write_u16(&mut self, addr: u32, value: u16) -> Result<(), RuntimeError> {
        let r = self.range(addr, 2)?;
        LittleEndian::write_u16(&mut self.data[r], value);
        Ok(())
    }

    pub fn write_u32(&mut self, addr: u32, value: u32) -> Result<(), RuntimeError> {
        let r = self.range(addr, 4)?;
        LittleEndian::write_u32(&mut self.data[r], value);
        Ok(())
    }

    pub fn write_u64(&mut self, addr: u32, value: u64) -> Result<(), RuntimeError> {
        let r = self.range(addr, 8)?;
        LittleEndian::write_u64(&mut self.data[r], value);
        Ok(())
    }

    pub fn write_i8(&mut self, addr: u32, value: i8) -> Result<(), RuntimeError> {
        self.write_u8(addr, value as u8)
    }

    pub fn write_i16(&mut self, addr: u32, value: i16) -> Result<(), RuntimeError> {
        self.write_u16(addr, value as u16)
    }

    pub fn write_i32(&mut self, addr: u32, value: i32) -> Result<(), RuntimeError> {
        self.write_u32(addr, value as u32)
    }

    pub fn write_i64(&mut self, addr: u32, value: i64) -> Result<(), RuntimeError> {
        self.write_u64(addr, value as u64)
    }

    pub fn write_f32(&mut self, addr: u32, value: f32) -> Result<(), RuntimeError> {
        let r = self.range(addr, 4)?;
        LittleEndian::write_f32(&mut self.data[r], value);
        Ok(())
    }

    pub fn write_f64(&mut self, addr: u32, value: f64) -> Result<(), RuntimeError> {
        let r = self.range(addr, 8)?;
        LittleEndian::write_f64(&mut self.data[r], value);
        Ok(())
    }

    pub fn read_bytes(&self, addr: u32, len: usize) -> Result<&[u8], RuntimeError> {
        Ok(&self.data[self.range(addr, len)?])
    }

    pub fn write_bytes(&mut self, addr: u32, bytes: &[u8]) -> Result<(), RuntimeError> {
        let r = self.range(addr, bytes.len())?;
        self.data[r].copy_from_slice(bytes);
        Ok(())
    }
}
