//! Binary module decoder.
//!
//! [`parse`] checks the header, then reads sections until the buffer is
//! exhausted. Each section payload is decoded from its own [`Reader`] and
//! must be consumed exactly. Everything borrowed from the input (custom
//! section payloads, data segment bytes) lives as long as the input.

pub mod encoding;
pub mod error;
pub mod instruction;
pub mod limits;
pub mod names;
pub mod reader;
pub mod section;
pub mod types;

pub use error::{ParseError, Warning};
pub use reader::Reader;
pub use section::{CustomSection, Section, SectionId, SectionPayload};

use error::push_warning;
use names::NameSection;

/// Result of decoding a module binary.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedModule<'a> {
    pub magic: u32,
    pub version: u32,
    pub sections: Vec<Section<'a>>,
    pub warnings: Vec<Warning>,
}

impl<'a> ParsedModule<'a> {
    pub fn section(&self, id: SectionId) -> Option<&Section<'a>> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn custom_section(&self, name: &str) -> Option<&CustomSection<'a>> {
        self.sections.iter().find_map(|s| match &s.payload {
            SectionPayload::Custom(c) if c.name == name => Some(c),
            _ => None,
        })
    }
}

/// Decode a complete module binary.
pub fn parse(bytes: &[u8]) -> Result<ParsedModule<'_>, ParseError> {
    if bytes.len() < encoding::HEADER_LEN {
        return Err(ParseError::TooShort {
            length: bytes.len(),
        });
    }

    let mut reader = Reader::new(bytes);
    let magic = reader.read_u32()?;
    if magic != encoding::MAGIC {
        return Err(ParseError::InvalidMagic(magic));
    }
    let version = reader.read_u32()?;
    log::debug!("module header: magic=0x{magic:08x} version={version}");

    let mut sections = Vec::new();
    let mut warnings = Vec::new();
    let mut seen = [false; 12];
    let mut last: Option<SectionId> = None;

    while !reader.is_empty() {
        let code = reader.read_vu7()?;
        let id = SectionId::from_code(code).ok_or(ParseError::SectionCodeNotAllowed { code })?;
        let length = reader.read_vu32()?;

        if id != SectionId::Custom {
            if seen[code as usize] {
                return Err(ParseError::DuplicateSection { code });
            }
            if let Some(previous) = last {
                if id < previous {
                    return Err(ParseError::SectionOutOfOrder {
                        code,
                        previous: previous.code(),
                    });
                }
            }
            seen[code as usize] = true;
            last = Some(id);
        }

        let offset = reader.offset();
        let payload = if id == SectionId::Custom {
            // the name header counts toward the declared length
            let mut sub = reader.sub_reader(length as usize)?;
            let name = sub.read_name()?;
            let rest = sub.read_bytes(sub.remaining())?;
            let names = if name == encoding::NAME_SECTION {
                read_name_section(rest, sub.offset() - rest.len(), &mut warnings)
            } else {
                None
            };
            SectionPayload::Custom(CustomSection {
                name,
                payload: rest,
                names,
            })
        } else {
            let mut sub = reader.sub_reader(length as usize)?;
            let payload = section::read_payload(id, &mut sub)?;
            section::check_aligned(id, &sub)?;
            payload
        };

        let section = Section {
            id,
            length,
            offset,
            payload,
        };
        log::debug!("{section}");
        sections.push(section);
    }

    Ok(ParsedModule {
        magic,
        version,
        sections,
        warnings,
    })
}

/// Best effort: a malformed name section becomes a warning, never a failure.
fn read_name_section(payload: &[u8], base: usize, warnings: &mut Vec<Warning>) -> Option<NameSection> {
    let mut reader = Reader::with_base(payload, base);
    match NameSection::read(&mut reader) {
        Ok(names) => Some(names),
        Err(e) => {
            push_warning(warnings, format!("Error while parsing \"name\" section: {e}"));
            None
        }
    }
}
