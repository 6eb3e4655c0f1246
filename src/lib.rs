//! A WebAssembly MVP binary decoder, module builder and instantiator.
//!
//! The pipeline has three stages:
//!
//! - [`parser`] -- Binary format decoder. Reads `.wasm` bytes into a
//!   [`parser::ParsedModule`]: the header plus one typed [`parser::Section`]
//!   per section in the binary.
//! - [`module`] -- Folds the sections into a [`module::Module`] with unified
//!   function, table, memory and global index spaces.
//! - [`runtime`] -- Binds a module to host imports, producing an
//!   [`runtime::Instance`] with live exports.
//!
//! Function bodies are decoded but not executed; calling a function defined
//! by the module fails with [`runtime::RuntimeError::NotImplemented`].
//!
//! # Example
//!
//! ```
//! use wasmload::parser::encoding::{write_header, write_section, SECTION_EXPORT, SECTION_GLOBAL};
//! use wasmload::runtime::{ImportObject, Value};
//!
//! // (global (export "answer") i32 (i32.const 42))
//! let mut bytes = Vec::new();
//! write_header(&mut bytes);
//! write_section(&mut bytes, SECTION_GLOBAL, &[0x01, 0x7f, 0x00, 0x41, 0x2a, 0x0b]);
//! write_section(&mut bytes, SECTION_EXPORT, &[0x01, 0x06, b'a', b'n', b's', b'w', b'e', b'r', 0x03, 0x00]);
//!
//! let instance = wasmload::load(&bytes, &ImportObject::new()).unwrap();
//! let answer = instance.exports().global("answer").unwrap();
//! assert_eq!(answer.get(), Value::I32(42));
//! ```

pub mod module;
pub mod parser;
pub mod runtime;

use std::sync::Arc;

use parser::ParseError;
use runtime::{ImportObject, Instance, LinkError, RuntimeError};

/// Any failure from the load pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("link error: {0}")]
    Link(#[from] LinkError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Parse, build and instantiate `bytes` against `imports`.
///
/// Build warnings are logged and kept on the module, reachable through
/// [`Instance::module`].
pub fn load<'a>(bytes: &'a [u8], imports: &ImportObject) -> Result<Instance<'a>, Error> {
    let parsed = parser::parse(bytes)?;
    let module = Arc::new(module::build(parsed));
    Ok(Instance::new(module, imports)?)
}
