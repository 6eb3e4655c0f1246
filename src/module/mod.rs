//! The linked module: imports and local definitions folded into unified
//! index spaces, ready to be instantiated any number of times.

mod build;

pub use build::build;

use std::fmt;

use crate::parser::instruction::Instruction;
use crate::parser::types::{
    DataSegment, ElementSegment, Export, ExternalKind, FunctionBody, FunctionType, GlobalType,
    MemoryType, TableType,
};
use crate::parser::Warning;

/// Where a table or memory comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Import { module: String, field: String },
    Local,
}

impl Source {
    pub fn is_import(&self) -> bool {
        matches!(self, Source::Import { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionSource {
    Import { module: String, field: String },
    /// `body` is attached when the code section is folded in.
    Local { body: Option<FunctionBody> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub index: u32,
    pub name: Option<String>,
    pub type_index: u32,
    pub source: FunctionSource,
}

impl Function {
    pub fn is_import(&self) -> bool {
        matches!(self.source, FunctionSource::Import { .. })
    }

    pub fn body(&self) -> Option<&FunctionBody> {
        match &self.source {
            FunctionSource::Local { body } => body.as_ref(),
            FunctionSource::Import { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub index: u32,
    pub source: Source,
    pub table_type: TableType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    pub index: u32,
    pub source: Source,
    pub memory_type: MemoryType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlobalSource {
    Import { module: String, field: String },
    Local { init: Vec<Instruction> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub index: u32,
    pub global_type: GlobalType,
    pub source: GlobalSource,
}

/// A built module. Nothing here changes after [`build`] returns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module<'a> {
    pub name: Option<String>,
    pub types: Vec<FunctionType>,
    /// Index of the first locally declared function; equals the number of
    /// imported functions.
    pub local_functions_start: u32,
    pub functions: Vec<Function>,
    pub tables: Vec<Table>,
    pub memories: Vec<Memory>,
    pub globals: Vec<Global>,
    pub exports: Vec<Export>,
    pub start: Option<u32>,
    pub elements: Vec<ElementSegment>,
    pub data: Vec<DataSegment<'a>>,
    pub warnings: Vec<Warning>,
}

impl<'a> Module<'a> {
    pub fn function(&self, index: u32) -> Option<&Function> {
        self.functions.get(index as usize)
    }

    /// Signature of the function at `index`, if both it and its type exist.
    pub fn function_type(&self, index: u32) -> Option<&FunctionType> {
        let function = self.function(index)?;
        self.types.get(function.type_index as usize)
    }

    pub fn imported_functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|f| f.is_import())
    }

    pub fn local_functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|f| !f.is_import())
    }

    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|e| e.name == name)
    }

    /// Number of entries in the index space for `kind`.
    pub fn index_space_len(&self, kind: ExternalKind) -> usize {
        match kind {
            ExternalKind::Function => self.functions.len(),
            ExternalKind::Table => self.tables.len(),
            ExternalKind::Memory => self.memories.len(),
            ExternalKind::Global => self.globals.len(),
        }
    }

    /// Display name of a function: its debug name, else the first export
    /// naming it.
    pub fn function_name(&self, index: u32) -> Option<&str> {
        if let Some(name) = self.function(index).and_then(|f| f.name.as_deref()) {
            return Some(name);
        }
        self.exports
            .iter()
            .find(|e| e.kind == ExternalKind::Function && e.index == index)
            .map(|e| e.name.as_str())
    }
}

impl fmt::Display for Module<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "module {}", self.name.as_deref().unwrap_or("<anonymous>"))?;
        writeln!(f, "Type[{}]:", self.types.len())?;
        for (i, t) in self.types.iter().enumerate() {
            writeln!(f, " - type[{i}] {t}")?;
        }
        writeln!(f, "Function[{}]:", self.functions.len())?;
        for func in &self.functions {
            write!(f, " - func[{}] sig={}", func.index, func.type_index)?;
            if let Some(name) = self.function_name(func.index) {
                write!(f, " <{name}>")?;
            }
            if let FunctionSource::Import { module, field } = &func.source {
                write!(f, " import <{module}.{field}>")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "Table[{}]:", self.tables.len())?;
        for t in &self.tables {
            writeln!(f, " - table[{}] {}", t.index, t.table_type)?;
        }
        writeln!(f, "Memory[{}]:", self.memories.len())?;
        for m in &self.memories {
            writeln!(f, " - memory[{}] {}", m.index, m.memory_type)?;
        }
        writeln!(f, "Global[{}]:", self.globals.len())?;
        for g in &self.globals {
            writeln!(f, " - global[{}] {}", g.index, g.global_type)?;
        }
        writeln!(f, "Export[{}]:", self.exports.len())?;
        for e in &self.exports {
            writeln!(f, " - {e}")?;
        }
        if let Some(start) = self.start {
            writeln!(f, "Start: func[{start}]")?;
        }
        writeln!(f, "Elem[{}]:", self.elements.len())?;
        writeln!(f, "Data[{}]:", self.data.len())?;
        for (i, d) in self.data.iter().enumerate() {
            writeln!(f, " - segment[{i}] {d}")?;
        }
        Ok(())
    }
}
