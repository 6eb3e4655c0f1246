//! Decoded module entities: value types, signatures, limits, imports,
//! exports, globals, segments and function bodies.

use std::fmt;

use super::encoding;
use super::error::{check_limit, ParseError};
use super::instruction::{read_constant_expression, ByteRange, Instruction};
use super::limits;
use super::reader::Reader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
}

impl ValueType {
    pub fn decode(byte: u8) -> Result<Self, ParseError> {
        match byte {
            encoding::TYPE_I32 => Ok(ValueType::I32),
            encoding::TYPE_I64 => Ok(ValueType::I64),
            encoding::TYPE_F32 => Ok(ValueType::F32),
            encoding::TYPE_F64 => Ok(ValueType::F64),
            _ => Err(ParseError::InvalidValueType(byte)),
        }
    }

    pub fn is_value_type_byte(byte: u8) -> bool {
        matches!(
            byte,
            encoding::TYPE_I32 | encoding::TYPE_I64 | encoding::TYPE_F32 | encoding::TYPE_F64
        )
    }

    pub fn read(reader: &mut Reader) -> Result<Self, ParseError> {
        ValueType::decode(reader.read_byte()?)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
        };
        write!(f, "{s}")
    }
}

/// The only table element type in the MVP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    AnyFunc,
}

impl ElementType {
    pub fn read(reader: &mut Reader) -> Result<Self, ParseError> {
        match reader.read_byte()? {
            encoding::TYPE_ANYFUNC => Ok(ElementType::AnyFunc),
            b => Err(ParseError::InvalidElementType(b)),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "anyfunc")
    }
}

/// A function signature. MVP functions return at most one value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub params: Vec<ValueType>,
    pub result: Option<ValueType>,
}

impl FunctionType {
    pub fn read(reader: &mut Reader) -> Result<Self, ParseError> {
        let form = reader.read_byte()?;
        if form != encoding::TYPE_FUNC {
            return Err(ParseError::InvalidFunctionForm(form));
        }

        let param_count = reader.read_vu32()?;
        check_limit("function param", param_count, limits::MAX_FUNCTION_PARAMS)?;
        reader.validate_item_count(param_count)?;
        let mut params = Vec::with_capacity(param_count as usize);
        for _ in 0..param_count {
            params.push(ValueType::read(reader)?);
        }

        let result = match reader.read_vu1()? {
            0 => None,
            1 => Some(ValueType::read(reader)?),
            n => return Err(ParseError::InvalidResultCount(n)),
        };

        Ok(FunctionType { params, result })
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ") -> ")?;
        match self.result {
            Some(r) => write!(f, "{r}"),
            None => write!(f, "nil"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
}

impl Limits {
    pub fn read(reader: &mut Reader) -> Result<Self, ParseError> {
        let flags = reader.read_byte()?;
        match flags {
            encoding::LIMITS_MIN => Ok(Limits {
                min: reader.read_vu32()?,
                max: None,
            }),
            encoding::LIMITS_MIN_MAX => {
                let min = reader.read_vu32()?;
                let max = reader.read_vu32()?;
                Ok(Limits {
                    min,
                    max: Some(max),
                })
            }
            _ => Err(ParseError::InvalidLimitsFlags(flags)),
        }
    }
}

impl fmt::Display for Limits {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "initial={}", self.min)?;
        if let Some(max) = self.max {
            write!(f, " max={max}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableType {
    pub element_type: ElementType,
    pub limits: Limits,
}

impl TableType {
    pub fn read(reader: &mut Reader) -> Result<Self, ParseError> {
        let element_type = ElementType::read(reader)?;
        let limits = Limits::read(reader)?;
        check_limit("table size", limits.min, limits::MAX_TABLE_SIZE)?;
        Ok(TableType {
            element_type,
            limits,
        })
    }
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "type={} {}", self.element_type, self.limits)
    }
}

/// Memory limits are counted in 64 KiB pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType {
    pub limits: Limits,
}

impl MemoryType {
    pub fn read(reader: &mut Reader) -> Result<Self, ParseError> {
        let limits = Limits::read(reader)?;
        check_limit("memory page", limits.min, limits::MAX_MEMORY_PAGES)?;
        if let Some(max) = limits.max {
            check_limit("memory page", max, limits::MAX_MEMORY_PAGES)?;
        }
        Ok(MemoryType { limits })
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "pages: {}", self.limits)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalType {
    pub value_type: ValueType,
    pub mutable: bool,
}

impl GlobalType {
    pub fn read(reader: &mut Reader) -> Result<Self, ParseError> {
        let value_type = ValueType::read(reader)?;
        let mutable = match reader.read_byte()? {
            0 => false,
            1 => true,
            b => return Err(ParseError::InvalidMutability(b)),
        };
        Ok(GlobalType {
            value_type,
            mutable,
        })
    }
}

impl fmt::Display for GlobalType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} mutable={}", self.value_type, u8::from(self.mutable))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalKind {
    Function,
    Table,
    Memory,
    Global,
}

impl ExternalKind {
    pub fn read(reader: &mut Reader) -> Result<Self, ParseError> {
        match reader.read_byte()? {
            encoding::DESC_FUNC => Ok(ExternalKind::Function),
            encoding::DESC_TABLE => Ok(ExternalKind::Table),
            encoding::DESC_MEMORY => Ok(ExternalKind::Memory),
            encoding::DESC_GLOBAL => Ok(ExternalKind::Global),
            b => Err(ParseError::InvalidExternalKind(b)),
        }
    }
}

impl fmt::Display for ExternalKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ExternalKind::Function => "func",
            ExternalKind::Table => "table",
            ExternalKind::Memory => "memory",
            ExternalKind::Global => "global",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportDescriptor {
    /// Index into the type section
    Function(u32),
    Table(TableType),
    Memory(MemoryType),
    Global(GlobalType),
}

impl ImportDescriptor {
    pub fn kind(&self) -> ExternalKind {
        match self {
            ImportDescriptor::Function(_) => ExternalKind::Function,
            ImportDescriptor::Table(_) => ExternalKind::Table,
            ImportDescriptor::Memory(_) => ExternalKind::Memory,
            ImportDescriptor::Global(_) => ExternalKind::Global,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub module: String,
    pub field: String,
    pub descriptor: ImportDescriptor,
}

impl Import {
    pub fn read(reader: &mut Reader) -> Result<Self, ParseError> {
        let module = reader.read_name()?;
        let field = reader.read_name()?;
        let descriptor = match ExternalKind::read(reader)? {
            ExternalKind::Function => ImportDescriptor::Function(reader.read_vu32()?),
            ExternalKind::Table => ImportDescriptor::Table(TableType::read(reader)?),
            ExternalKind::Memory => ImportDescriptor::Memory(MemoryType::read(reader)?),
            ExternalKind::Global => ImportDescriptor::Global(GlobalType::read(reader)?),
        };
        Ok(Import {
            module,
            field,
            descriptor,
        })
    }
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{}.{}> {}", self.module, self.field, self.descriptor.kind())?;
        match &self.descriptor {
            ImportDescriptor::Function(type_idx) => write!(f, " sig={type_idx}"),
            ImportDescriptor::Table(t) => write!(f, " {t}"),
            ImportDescriptor::Memory(m) => write!(f, " {m}"),
            ImportDescriptor::Global(g) => write!(f, " {g}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub kind: ExternalKind,
    pub index: u32,
}

impl Export {
    pub fn read(reader: &mut Reader) -> Result<Self, ParseError> {
        let name = reader.read_name()?;
        let kind = ExternalKind::read(reader)?;
        let index = reader.read_vu32()?;
        Ok(Export { name, kind, index })
    }
}

impl fmt::Display for Export {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}[{}] -> \"{}\"", self.kind, self.index, self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub global_type: GlobalType,
    pub init: Vec<Instruction>,
}

impl Global {
    pub fn read(reader: &mut Reader) -> Result<Self, ParseError> {
        let global_type = GlobalType::read(reader)?;
        let init = read_constant_expression(reader)?;
        Ok(Global { global_type, init })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementSegment {
    pub table_index: u32,
    pub offset: Vec<Instruction>,
    pub functions: Vec<u32>,
}

impl ElementSegment {
    pub fn read(reader: &mut Reader) -> Result<Self, ParseError> {
        let table_index = reader.read_vu32()?;
        let offset = read_constant_expression(reader)?;
        let count = reader.read_vu32()?;
        check_limit("element segment entry", count, limits::MAX_TABLE_INIT_ENTRIES)?;
        reader.validate_item_count(count)?;
        let mut functions = Vec::with_capacity(count as usize);
        for _ in 0..count {
            functions.push(reader.read_vu32()?);
        }
        Ok(ElementSegment {
            table_index,
            offset,
            functions,
        })
    }
}

/// A data segment. `bytes` borrows from the module binary.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSegment<'a> {
    pub memory_index: u32,
    pub offset: Vec<Instruction>,
    pub bytes: &'a [u8],
}

impl<'a> DataSegment<'a> {
    pub fn read(reader: &mut Reader<'a>) -> Result<Self, ParseError> {
        let memory_index = reader.read_vu32()?;
        let offset = read_constant_expression(reader)?;
        let size = reader.read_vu32()?;
        let bytes = reader.read_bytes(size as usize)?;
        Ok(DataSegment {
            memory_index,
            offset,
            bytes,
        })
    }
}

impl fmt::Display for DataSegment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "memory={} size={} - {}",
            self.memory_index,
            self.bytes.len(),
            hex::encode(self.bytes)
        )
    }
}

/// Local declarations of a function body, kept as run-length groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locals {
    entries: Vec<(u32, ValueType)>,
}

impl Locals {
    pub fn new(entries: Vec<(u32, ValueType)>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> u64 {
        self.entries.iter().map(|(count, _)| *count as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (u32, ValueType)> {
        self.entries.iter()
    }

    pub fn get(&self, index: u32) -> Option<&ValueType> {
        let mut remaining = index;
        for (count, value_type) in &self.entries {
            if remaining < *count {
                return Some(value_type);
            }
            remaining -= count;
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBody {
    pub locals: Locals,
    pub instructions: Vec<Instruction>,
    pub position: ByteRange,
}
