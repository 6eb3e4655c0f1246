//! Tables of function references
//!
//! Each slot holds a function index or nothing. Slots start empty; element
//! segments fill them in.

use super::RuntimeError;
use crate::parser::limits::MAX_TABLE_SIZE;
use crate::parser::types::Limits;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    elements: Vec<Option<u32>>,
    limits: Limits,
}

impl Table {
    /// A table of `limits.min` empty slots.
    pub fn new(limits: Limits) -> Result<Self, RuntimeError> {
        if limits.min > MAX_TABLE_SIZE {
            return Err(RuntimeError::TableSizeExceeded);
        }
        if let Some(max) = limits.max {
            if limits.min > max {
                return Err(RuntimeError::TableSizeExceeded);
            }
        }
        Ok(Table {
            elements: vec![None; limits.min as usize],
            limits,
        })
    }

    pub fn size(&self) -> u32 {
        self.elements.len() as u32
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// The function index in slot `index`; `Ok(None)` for an empty slot.
    pub fn get(&self, index: u32) -> Result<Option<u32>, RuntimeError> {
        self.elements
            .get(index as usize)
            .copied()
            .ok_or(RuntimeError::TableIndexOutOfBounds(index))
    }

    pub fn set(&mut self, index: u32, function: Option<u32>) -> Result<(), RuntimeError> {
        let slot = self
            .elements
            .get_mut(index as usize)
            .ok_or(RuntimeError::TableIndexOutOfBounds(index))?;
        *slot = function;
        Ok(())
    }

    /// Write `functions` into consecutive slots starting at `offset`. Nothing
    /// is written unless every slot is in range.
    pub fn init(&mut self, offset: u32, functions: &[u32]) -> Result<(), RuntimeError> {
        let start = offset as usize;
        let end = start
            .checked_add(functions.len())
            .filter(|&end| end <= self.elements.len())
            .ok_or(RuntimeError::TableIndexOutOfBounds(offset))?;
        for (slot, &function) in self.elements[start..end].iter_mut().zip(functions) {
            *slot = Some(function);
        }
        Ok(())
    }

    /// Grow by `delta` empty slots. Returns the old size, or `None` if the
    /// table would exceed its maximum.
    pub fn grow(&mut self, delta: u32) -> Option<u32> {
        let old_size = self.size();
        let new_size = old_size.checked_add(delta)?;
        if new_size > self.limits.max.unwrap_or(MAX_TABLE_SIZE) {
            return None;
        }
        self.elements.resize(new_size as usize, None);
        Some(old_size)
    }
}
