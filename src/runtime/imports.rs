//! Host import object
//!
//! Maps module name to field name to a host value. Globals, tables and
//! memories are shared handles, so the host sees every change an instance
//! makes to them and vice versa.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::{LinkError, Memory, RuntimeError, SharedGlobal, SharedMemory, SharedTable, Table, Value};

/// A host function. Receives the call arguments, returns the results.
pub type HostFunc = Rc<dyn Fn(&[Value]) -> Result<Vec<Value>, RuntimeError>>;

#[derive(Clone)]
pub enum HostValue {
    Function(HostFunc),
    Global(SharedGlobal),
    Table(SharedTable),
    Memory(SharedMemory),
}

impl HostValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            HostValue::Function(_) => "function",
            HostValue::Global(_) => "global",
            HostValue::Table(_) => "table",
            HostValue::Memory(_) => "memory",
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Function(_) => write!(f, "Function(<host>)"),
            HostValue::Global(g) => write!(f, "Global({})", g.get()),
            HostValue::Table(t) => write!(f, "Table(size={})", t.borrow().size()),
            HostValue::Memory(m) => write!(f, "Memory(pages={})", m.borrow().size()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportObject {
    modules: HashMap<String, HashMap<String, HostValue>>,
}

impl ImportObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module: impl Into<String>, name: impl Into<String>, value: HostValue) {
        self.modules
            .entry(module.into())
            .or_default()
            .insert(name.into(), value);
    }

    pub fn add_function<F>(&mut self, module: impl Into<String>, name: impl Into<String>, func: F)
    where
        F: Fn(&[Value]) -> Result<Vec<Value>, RuntimeError> + 'static,
    {
        self.insert(module, name, HostValue::Function(Rc::new(func)));
    }

    /// Add a global holding `value`. The returned handle observes and
    /// changes the same cell the instance will bind to.
    pub fn add_global(
        &mut self,
        module: impl Into<String>,
        name: impl Into<String>,
        value: Value,
    ) -> SharedGlobal {
        let cell = Rc::new(Cell::new(value));
        self.insert(module, name, HostValue::Global(Rc::clone(&cell)));
        cell
    }

    pub fn add_memory(
        &mut self,
        module: impl Into<String>,
        name: impl Into<String>,
        memory: Memory,
    ) -> SharedMemory {
        let shared = Rc::new(RefCell::new(memory));
        self.insert(module, name, HostValue::Memory(Rc::clone(&shared)));
        shared
    }

    pub fn add_table(
        &mut self,
        module: impl Into<String>,
        name: impl Into<String>,
        table: Table,
    ) -> SharedTable {
        let shared = Rc::new(RefCell::new(table));
        self.insert(module, name, HostValue::Table(Rc::clone(&shared)));
        shared
    }

    pub fn has_module(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    /// Resolve `module.field`, telling a missing module apart from a
    /// missing field.
    pub fn resolve(&self, module: &str, field: &str) -> Result<&HostValue, LinkError> {
        let fields = self.modules.get(module).ok_or_else(|| LinkError::UnknownModule {
            module: module.to_string(),
            field: field.to_string(),
        })?;
        fields.get(field).ok_or_else(|| LinkError::UnknownImport {
            module: module.to_string(),
            field: field.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::Limits;

    #[test]
    fn test_resolve() {
        let mut imports = ImportObject::new();
        imports.add_function("env", "log", |_| Ok(vec![]));
        imports.add_global("env", "g", Value::I32(42));

        assert!(matches!(imports.resolve("env", "log"), Ok(HostValue::Function(_))));
        assert!(imports.has_module("env"));
        assert_eq!(
            imports.resolve("js", "log").unwrap_err(),
            LinkError::UnknownModule {
                module: "js".to_string(),
                field: "log".to_string()
            }
        );
        assert_eq!(
            imports.resolve("env", "missing").unwrap_err(),
            LinkError::UnknownImport {
                module: "env".to_string(),
                field: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_global_handle_is_shared() {
        let mut imports = ImportObject::new();
        let handle = imports.add_global("env", "counter", Value::I64(1));
        handle.set(Value::I64(2));
        match imports.resolve("env", "counter").unwrap() {
            HostValue::Global(cell) => assert_eq!(cell.get(), Value::I64(2)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_host_function_called() {
        let mut imports = ImportObject::new();
        imports.add_function("math", "double", |args: &[Value]| {
            let v = args[0].as_i32().unwrap_or_default();
            Ok(vec![Value::I32(v * 2)])
        });
        let HostValue::Function(f) = imports.resolve("math", "double").unwrap() else {
            panic!("not a function");
        };
        assert_eq!(f(&[Value::I32(21)]).unwrap(), vec![Value::I32(42)]);
    }

    #[test]
    fn test_debug_and_kind() {
        let mut imports = ImportObject::new();
        imports.add_table("env", "t", Table::new(Limits { min: 2, max: None }).unwrap());
        let value = imports.resolve("env", "t").unwrap();
        assert_eq!(value.kind_name(), "table");
        assert_eq!(format!("{value:?}"), "Table(size=2)");
    }
}
