//! Section identifiers, payload shapes and the per-section readers.

use std::fmt;

use super::error::{check_limit, ParseError};
use super::instruction::read_function_body;
use super::limits;
use super::names::NameSection;
use super::reader::Reader;
use super::types::{
    DataSegment, ElementSegment, Export, FunctionBody, FunctionType, Global, Import, MemoryType,
    TableType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SectionId {
    Custom = 0,
    Type = 1,
    Import = 2,
    Function = 3,
    Table = 4,
    Memory = 5,
    Global = 6,
    Export = 7,
    Start = 8,
    Element = 9,
    Code = 10,
    Data = 11,
}

impl SectionId {
    pub fn from_code(code: u8) -> Option<SectionId> {
        let id = match code {
            0 => SectionId::Custom,
            1 => SectionId::Type,
            2 => SectionId::Import,
            3 => SectionId::Function,
            4 => SectionId::Table,
            5 => SectionId::Memory,
            6 => SectionId::Global,
            7 => SectionId::Export,
            8 => SectionId::Start,
            9 => SectionId::Element,
            10 => SectionId::Code,
            11 => SectionId::Data,
            _ => return None,
        };
        Some(id)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            SectionId::Custom => "Custom",
            SectionId::Type => "Type",
            SectionId::Import => "Import",
            SectionId::Function => "Function",
            SectionId::Table => "Table",
            SectionId::Memory => "Memory",
            SectionId::Global => "Global",
            SectionId::Export => "Export",
            SectionId::Start => "Start",
            SectionId::Element => "Elem",
            SectionId::Code => "Code",
            SectionId::Data => "Data",
        }
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomSection<'a> {
    pub name: String,
    /// Bytes after the name, borrowed from the module binary.
    pub payload: &'a [u8],
    /// Decoded names when this is a well-formed `"name"` section.
    pub names: Option<NameSection>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SectionPayload<'a> {
    Custom(CustomSection<'a>),
    Type(Vec<FunctionType>),
    Import(Vec<Import>),
    /// Type index of each locally declared function
    Function(Vec<u32>),
    Table(Vec<TableType>),
    Memory(Vec<MemoryType>),
    Global(Vec<Global>),
    Export(Vec<Export>),
    Start(u32),
    Element(Vec<ElementSegment>),
    Code(Vec<FunctionBody>),
    Data(Vec<DataSegment<'a>>),
}

/// One top-level section as it appeared in the binary.
#[derive(Debug, Clone, PartialEq)]
pub struct Section<'a> {
    pub id: SectionId,
    /// Declared payload length, including a custom section's name.
    pub length: u32,
    /// Offset of the payload in the module binary.
    pub offset: usize,
    pub payload: SectionPayload<'a>,
}

impl Section<'_> {
    pub fn item_count(&self) -> usize {
        match &self.payload {
            SectionPayload::Custom(_) | SectionPayload::Start(_) => 1,
            SectionPayload::Type(v) => v.len(),
            SectionPayload::Import(v) => v.len(),
            SectionPayload::Function(v) => v.len(),
            SectionPayload::Table(v) => v.len(),
            SectionPayload::Memory(v) => v.len(),
            SectionPayload::Global(v) => v.len(),
            SectionPayload::Export(v) => v.len(),
            SectionPayload::Element(v) => v.len(),
            SectionPayload::Code(v) => v.len(),
            SectionPayload::Data(v) => v.len(),
        }
    }
}

impl fmt::Display for Section<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:>9} start=0x{:08x} end=0x{:08x} (size=0x{:08x})",
            self.id.name(),
            self.offset,
            self.offset + self.length as usize,
            self.length
        )?;
        match &self.payload {
            SectionPayload::Custom(c) => write!(f, " \"{}\"", c.name),
            SectionPayload::Start(idx) => write!(f, " start: {idx}"),
            _ => write!(f, " count: {}", self.item_count()),
        }
    }
}

/// Read a `count:varuint32` prefixed vector, checking the count against
/// `limit` and against the bytes left before allocating.
fn read_vec<'a, T>(
    reader: &mut Reader<'a>,
    what: &'static str,
    limit: u32,
    mut read_item: impl FnMut(&mut Reader<'a>) -> Result<T, ParseError>,
) -> Result<Vec<T>, ParseError> {
    let count = reader.read_vu32()?;
    check_limit(what, count, limit)?;
    reader.validate_item_count(count)?;
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        items.push(read_item(reader)?);
    }
    Ok(items)
}

/// Decode the payload of a non-custom section. `reader` covers exactly the
/// payload; the caller checks that it was fully consumed.
pub(crate) fn read_payload<'a>(
    id: SectionId,
    reader: &mut Reader<'a>,
) -> Result<SectionPayload<'a>, ParseError> {
    let payload = match id {
        SectionId::Type => SectionPayload::Type(read_vec(
            reader,
            "type",
            limits::MAX_TYPES,
            FunctionType::read,
        )?),
        SectionId::Import => SectionPayload::Import(read_vec(
            reader,
            "import",
            limits::MAX_IMPORTS,
            Import::read,
        )?),
        SectionId::Function => SectionPayload::Function(read_vec(
            reader,
            "function",
            limits::MAX_FUNCTIONS,
            |r| r.read_vu32(),
        )?),
        SectionId::Table => SectionPayload::Table(read_vec(
            reader,
            "table",
            limits::MAX_TABLES,
            TableType::read,
        )?),
        SectionId::Memory => SectionPayload::Memory(read_vec(
            reader,
            "memory",
            limits::MAX_MEMORIES,
            MemoryType::read,
        )?),
        SectionId::Global => SectionPayload::Global(read_vec(
            reader,
            "global",
            limits::MAX_GLOBALS,
            Global::read,
        )?),
        SectionId::Export => SectionPayload::Export(read_vec(
            reader,
            "export",
            limits::MAX_EXPORTS,
            Export::read,
        )?),
        SectionId::Start => SectionPayload::Start(reader.read_vu32()?),
        SectionId::Element => SectionPayload::Element(read_vec(
            reader,
            "element segment",
            limits::MAX_ELEMENT_SEGMENTS,
            ElementSegment::read,
        )?),
        SectionId::Code => SectionPayload::Code(read_vec(
            reader,
            "function body",
            limits::MAX_FUNCTIONS,
            read_function_body,
        )?),
        SectionId::Data => SectionPayload::Data(read_vec(
            reader,
            "data segment",
            limits::MAX_DATA_SEGMENTS,
            DataSegment::read,
        )?),
        SectionId::Custom => unreachable!("custom sections are read by the section loop"),
    };
    Ok(payload)
}

/// Fail unless `reader` has been consumed to its last byte.
pub(crate) fn check_aligned(id: SectionId, reader: &Reader) -> Result<(), ParseError> {
    if !reader.is_empty() {
        return Err(ParseError::SectionNotAligned {
            code: id.code(),
            consumed: reader.pos(),
            length: reader.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::encoding::*;
    use crate::parser::types::ValueType;
    use rstest::rstest;

    #[test]
    fn test_section_ids() {
        for code in 0..=11u8 {
            let id = SectionId::from_code(code).unwrap();
            assert_eq!(id.code(), code);
        }
        assert_eq!(SectionId::from_code(12), None);
        assert!(SectionId::Type < SectionId::Data);
        assert_eq!(SectionId::Element.to_string(), "Elem");
    }

    #[test]
    fn test_type_payload() {
        let bytes = [0x02, 0x60, 0x01, 0x7f, 0x01, 0x7f, 0x60, 0x00, 0x00];
        let mut reader = Reader::new(&bytes);
        let payload = read_payload(SectionId::Type, &mut reader).unwrap();
        check_aligned(SectionId::Type, &reader).unwrap();
        match payload {
            SectionPayload::Type(types) => {
                assert_eq!(types.len(), 2);
                assert_eq!(types[0].params, vec![ValueType::I32]);
                assert_eq!(types[1].result, None);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[rstest]
    #[case(SectionId::Function, &[0x01, 0x00, 0x00])]
    #[case(SectionId::Start, &[0x00, 0x00])]
    #[case(SectionId::Memory, &[0x01, 0x00, 0x01, 0xaa])]
    #[case(SectionId::Export, &[0x00, 0x00])]
    fn test_trailing_bytes_not_aligned(#[case] id: SectionId, #[case] bytes: &[u8]) {
        let mut reader = Reader::new(bytes);
        read_payload(id, &mut reader).unwrap();
        assert!(matches!(
            check_aligned(id, &reader),
            Err(ParseError::SectionNotAligned { code, .. }) if code == id.code()
        ));
    }

    #[test]
    fn test_vector_count_past_end() {
        let mut bytes = Vec::new();
        write_vu32(&mut bytes, 1000);
        bytes.push(0x00);
        let mut reader = Reader::new(&bytes);
        assert!(matches!(
            read_payload(SectionId::Function, &mut reader),
            Err(ParseError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_code_payload() {
        // one body: no locals, i32.const 1, end
        let bytes = [0x01, 0x04, 0x00, 0x41, 0x01, 0x0b];
        let mut reader = Reader::new(&bytes);
        let payload = read_payload(SectionId::Code, &mut reader).unwrap();
        check_aligned(SectionId::Code, &reader).unwrap();
        match payload {
            SectionPayload::Code(bodies) => {
                assert_eq!(bodies.len(), 1);
                assert_eq!(bodies[0].instructions.len(), 2);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
