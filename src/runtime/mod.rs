//! Instantiation of built modules against host imports.
//!
//! Instances own their tables, memories and globals through shared handles
//! so the host can hold on to them (imports) and see them live (exports).
//! Function bodies are not executed: calling a local function reports
//! [`RuntimeError::NotImplemented`].

pub mod const_expr;
pub mod imports;
pub mod instance;
pub mod memory;
pub mod stack;
pub mod table;
pub mod value;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub use imports::{HostFunc, HostValue, ImportObject};
pub use instance::{Callable, Export, Exports, GlobalExport, Instance, MemoryView, TableView};
pub use memory::Memory;
pub use table::Table;
pub use value::Value;

use crate::parser::types::ExternalKind;

pub type SharedGlobal = Rc<Cell<Value>>;
pub type SharedMemory = Rc<RefCell<Memory>>;
pub type SharedTable = Rc<RefCell<Table>>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("Function {function} is not implemented: execution of function bodies is not supported")]
    NotImplemented { function: String },
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
    #[error("Unknown export: {0}")]
    UnknownExport(String),
    #[error("Export {0} is not a function")]
    NotCallable(String),
    #[error("Function index out of bounds: {0}")]
    FunctionIndexOutOfBounds(u32),
    #[error("Global variable index out of bounds: {0}")]
    GlobalIndexOutOfBounds(u32),
    #[error("Global is immutable")]
    ImmutableGlobal,
    #[error("Memory error: {0}")]
    MemoryError(String),
    #[error("Memory index out of bounds: {0}")]
    MemoryIndexOutOfBounds(u32),
    #[error("Table index out of bounds: {0}")]
    TableIndexOutOfBounds(u32),
    #[error("Table size exceeded")]
    TableSizeExceeded,
    #[error("Invalid constant expression: {0}")]
    InvalidConstExpr(String),
    #[error("Host function error: {0}")]
    Host(String),
}

/// Failure to bind a module to its imports. No partial instance survives.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LinkError {
    #[error("Unknown import module \"{module}\" (wanted by {field})")]
    UnknownModule { module: String, field: String },
    #[error("Unknown import \"{module}.{field}\"")]
    UnknownImport { module: String, field: String },
    #[error("Import \"{module}.{field}\" is not a function")]
    NotAFunction { module: String, field: String },
    #[error("Incompatible import \"{module}.{field}\": {reason}")]
    IncompatibleImport {
        module: String,
        field: String,
        reason: String,
    },
    #[error("Function {index} has no body")]
    MissingBody { index: u32 },
    #[error("Export \"{name}\" refers to undefined {kind} {index}")]
    UnknownExportTarget {
        name: String,
        kind: ExternalKind,
        index: u32,
    },
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
