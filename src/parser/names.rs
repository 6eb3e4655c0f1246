//! The `"name"` custom section: debug names for the module, its functions
//! and their locals.

use super::encoding;
use super::error::{check_limit, ParseError};
use super::limits;
use super::reader::Reader;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameSection {
    pub module_name: Option<String>,
    /// (function index, name) pairs in the order they appear.
    pub function_names: Vec<(u32, String)>,
    pub local_names: Vec<LocalNames>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNames {
    pub function_index: u32,
    pub names: Vec<(u32, String)>,
}

impl NameSection {
    /// Read subsections until the payload is exhausted. Each subsection is
    /// `type:varuint7 len:varuint32 payload` and must consume its payload
    /// exactly.
    pub fn read(reader: &mut Reader) -> Result<NameSection, ParseError> {
        let mut section = NameSection::default();

        while !reader.is_empty() {
            let subsection_type = reader.read_vu7()?;
            let length = reader.read_vu32()? as usize;
            let mut sub = reader.sub_reader(length)?;

            match subsection_type {
                encoding::NAME_MODULE => {
                    section.module_name = Some(sub.read_name()?);
                }
                encoding::NAME_FUNCTION => {
                    section.function_names.extend(read_name_map(&mut sub)?);
                }
                encoding::NAME_LOCAL => {
                    let count = sub.read_vu32()?;
                    check_limit("local name entry", count, limits::MAX_NAME_MAP_ENTRIES)?;
                    sub.validate_item_count(count)?;
                    for _ in 0..count {
                        let function_index = sub.read_vu32()?;
                        let names = read_name_map(&mut sub)?;
                        section.local_names.push(LocalNames {
                            function_index,
                            names,
                        });
                    }
                }
                other => return Err(ParseError::UnknownNameSubsection(other)),
            }

            if !sub.is_empty() {
                return Err(ParseError::SectionNotAligned {
                    code: encoding::SECTION_CUSTOM,
                    consumed: sub.pos(),
                    length,
                });
            }
        }

        Ok(section)
    }

    pub fn function_name(&self, index: u32) -> Option<&str> {
        self.function_names
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, name)| name.as_str())
    }
}

fn read_name_map(reader: &mut Reader) -> Result<Vec<(u32, String)>, ParseError> {
    let count = reader.read_vu32()?;
    check_limit("name map entry", count, limits::MAX_NAME_MAP_ENTRIES)?;
    reader.validate_item_count(count)?;
    let mut names = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let index = reader.read_vu32()?;
        let name = reader.read_name()?;
        names.push((index, name));
    }
    Ok(names)
}
