//! Module instances and their exports

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use super::const_expr::evaluate_typed;
use super::imports::{HostFunc, HostValue, ImportObject};
use super::{
    LinkError, Memory, RuntimeError, SharedGlobal, SharedMemory, SharedTable, Table, Value,
};
use crate::module::{FunctionSource, GlobalSource, Module, Source};
use crate::parser::instruction::Instruction;
use crate::parser::types::{ExternalKind, FunctionType, GlobalType, Limits, ValueType};

/// A function bound to an instance.
#[derive(Clone)]
pub enum Callable {
    Host {
        module: String,
        field: String,
        signature: Option<FunctionType>,
        func: HostFunc,
    },
    /// A function defined by the module itself. Calling it reports
    /// `NotImplemented`; bodies are decoded but never executed.
    Local {
        index: u32,
        name: String,
        signature: Option<FunctionType>,
    },
}

impl Callable {
    pub fn signature(&self) -> Option<&FunctionType> {
        match self {
            Callable::Host { signature, .. } | Callable::Local { signature, .. } => {
                signature.as_ref()
            }
        }
    }

    pub fn call(&self, args: &[Value]) -> Result<Vec<Value>, RuntimeError> {
        if let Some(signature) = self.signature() {
            check_args(signature, args)?;
        }
        match self {
            Callable::Host { func, .. } => func(args),
            Callable::Local { name, .. } => Err(RuntimeError::NotImplemented {
                function: name.clone(),
            }),
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Host { module, field, .. } => write!(f, "Host({module}.{field})"),
            Callable::Local { index, name, .. } => write!(f, "Local({index} {name})"),
        }
    }
}

fn check_args(signature: &FunctionType, args: &[Value]) -> Result<(), RuntimeError> {
    if args.len() != signature.params.len() {
        return Err(RuntimeError::TypeMismatch {
            expected: format!("{} arguments", signature.params.len()),
            actual: format!("{} arguments", args.len()),
        });
    }
    for (i, (arg, expected)) in args.iter().zip(&signature.params).enumerate() {
        if arg.typ() != *expected {
            return Err(RuntimeError::TypeMismatch {
                expected: format!("{expected} for argument {i}"),
                actual: arg.typ().to_string(),
            });
        }
    }
    Ok(())
}

/// Read-only live view of a table.
#[derive(Debug, Clone)]
pub struct TableView {
    table: SharedTable,
}

impl TableView {
    pub fn size(&self) -> u32 {
        self.table.borrow().size()
    }

    pub fn get(&self, index: u32) -> Result<Option<u32>, RuntimeError> {
        self.table.borrow().get(index)
    }
}

/// Read-only live view of a linear memory.
#[derive(Debug, Clone)]
pub struct MemoryView {
    memory: SharedMemory,
}

impl MemoryView {
    /// Size in pages
    pub fn size(&self) -> u32 {
        self.memory.borrow().size()
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.memory.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.borrow().is_empty()
    }

    pub fn read_u8(&self, addr: u32) -> Result<u8, RuntimeError> {
        self.memory.borrow().read_u8(addr)
    }

    pub fn read_i32(&self, addr: u32) -> Result<i32, RuntimeError> {
        self.memory.borrow().read_i32(addr)
    }

    pub fn read_i64(&self, addr: u32) -> Result<i64, RuntimeError> {
        self.memory.borrow().read_i64(addr)
    }

    pub fn read_f32(&self, addr: u32) -> Result<f32, RuntimeError> {
        self.memory.borrow().read_f32(addr)
    }

    pub fn read_f64(&self, addr: u32) -> Result<f64, RuntimeError> {
        self.memory.borrow().read_f64(addr)
    }

    pub fn read_bytes(&self, addr: u32, len: usize) -> Result<Vec<u8>, RuntimeError> {
        self.memory.borrow().read_bytes(addr, len).map(<[u8]>::to_vec)
    }
}

/// Accessor for an exported global. Writes are refused unless the global
/// is mutable.
#[derive(Debug, Clone)]
pub struct GlobalExport {
    cell: SharedGlobal,
    global_type: GlobalType,
}

impl GlobalExport {
    pub fn get(&self) -> Value {
        self.cell.get()
    }

    pub fn set(&self, value: Value) -> Result<(), RuntimeError> {
        if !self.global_type.mutable {
            return Err(RuntimeError::ImmutableGlobal);
        }
        if value.typ() != self.global_type.value_type {
            return Err(RuntimeError::TypeMismatch {
                expected: self.global_type.value_type.to_string(),
                actual: value.typ().to_string(),
            });
        }
        self.cell.set(value);
        Ok(())
    }

    pub fn is_mutable(&self) -> bool {
        self.global_type.mutable
    }

    pub fn value_type(&self) -> ValueType {
        self.global_type.value_type
    }
}

#[derive(Debug, Clone)]
pub enum Export {
    Function(Callable),
    Table(TableView),
    Memory(MemoryView),
    Global(GlobalExport),
}

impl Export {
    pub fn kind(&self) -> ExternalKind {
        match self {
            Export::Function(_) => ExternalKind::Function,
            Export::Table(_) => ExternalKind::Table,
            Export::Memory(_) => ExternalKind::Memory,
            Export::Global(_) => ExternalKind::Global,
        }
    }
}

/// Exports by name, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Exports {
    entries: Vec<(String, Export)>,
}

impl Exports {
    pub fn get(&self, name: &str) -> Option<&Export> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, export)| export)
    }

    pub fn function(&self, name: &str) -> Option<&Callable> {
        match self.get(name)? {
            Export::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableView> {
        match self.get(name)? {
            Export::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn memory(&self, name: &str) -> Option<&MemoryView> {
        match self.get(name)? {
            Export::Memory(m) => Some(m),
            _ => None,
        }
    }

    pub fn global(&self, name: &str) -> Option<&GlobalExport> {
        match self.get(name)? {
            Export::Global(g) => Some(g),
            _ => None,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Call the function exported as `name`.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Vec<Value>, RuntimeError> {
        match self.get(name) {
            Some(Export::Function(f)) => f.call(args),
            Some(_) => Err(RuntimeError::NotCallable(name.to_string())),
            None => Err(RuntimeError::UnknownExport(name.to_string())),
        }
    }
}

/// A module bound to host imports, with its own tables, memories and
/// globals.
pub struct Instance<'a> {
    module: Arc<Module<'a>>,
    functions: Vec<Callable>,
    tables: Vec<SharedTable>,
    memories: Vec<SharedMemory>,
    globals: Vec<SharedGlobal>,
    exports: Exports,
}

impl<'a> Instance<'a> {
    /// Resolve imports and allocate local storage.
    ///
    /// Element and data segments are left alone; see
    /// [`Instance::initialize_segments`]. The start function is not run.
    pub fn new(module: Arc<Module<'a>>, imports: &ImportObject) -> Result<Self, LinkError> {
        let functions = bind_functions(&module, imports)?;
        let tables = bind_tables(&module, imports)?;
        let memories = bind_memories(&module, imports)?;
        let globals = bind_globals(&module, imports)?;

        let mut instance = Instance {
            module,
            functions,
            tables,
            memories,
            globals,
            exports: Exports::default(),
        };
        instance.exports = instance.build_exports()?;

        log::debug!(
            "instantiated module {:?}: {} functions, {} tables, {} memories, {} globals, {} exports",
            instance.module.name,
            instance.functions.len(),
            instance.tables.len(),
            instance.memories.len(),
            instance.globals.len(),
            instance.exports.len()
        );
        Ok(instance)
    }

    fn build_exports(&self) -> Result<Exports, LinkError> {
        let mut entries = Vec::with_capacity(self.module.exports.len());
        for export in &self.module.exports {
            let unknown = || LinkError::UnknownExportTarget {
                name: export.name.clone(),
                kind: export.kind,
                index: export.index,
            };
            let i = export.index as usize;
            let value = match export.kind {
                ExternalKind::Function => {
                    Export::Function(self.functions.get(i).ok_or_else(unknown)?.clone())
                }
                ExternalKind::Table => Export::Table(TableView {
                    table: Rc::clone(self.tables.get(i).ok_or_else(unknown)?),
                }),
                ExternalKind::Memory => Export::Memory(MemoryView {
                    memory: Rc::clone(self.memories.get(i).ok_or_else(unknown)?),
                }),
                ExternalKind::Global => {
                    let global = self.module.globals.get(i).ok_or_else(unknown)?;
                    Export::Global(GlobalExport {
                        cell: Rc::clone(self.globals.get(i).ok_or_else(unknown)?),
                        global_type: global.global_type,
                    })
                }
            };
            log::debug!("export {} \"{}\" -> {}", export.kind, export.name, export.index);
            entries.push((export.name.clone(), value));
        }
        Ok(Exports { entries })
    }

    pub fn module(&self) -> &Arc<Module<'a>> {
        &self.module
    }

    pub fn exports(&self) -> &Exports {
        &self.exports
    }

    pub fn function(&self, index: u32) -> Option<&Callable> {
        self.functions.get(index as usize)
    }

    pub fn table(&self, index: u32) -> Option<&SharedTable> {
        self.tables.get(index as usize)
    }

    pub fn memory(&self, index: u32) -> Option<&SharedMemory> {
        self.memories.get(index as usize)
    }

    pub fn global(&self, index: u32) -> Option<&SharedGlobal> {
        self.globals.get(index as usize)
    }

    /// Index of the start function, which is never invoked automatically.
    pub fn start(&self) -> Option<u32> {
        self.module.start
    }

    /// Call the function at `index` in the function index space.
    pub fn call(&self, index: u32, args: &[Value]) -> Result<Vec<Value>, RuntimeError> {
        self.function(index)
            .ok_or(RuntimeError::FunctionIndexOutOfBounds(index))?
            .call(args)
    }

    /// Call an exported function.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Vec<Value>, RuntimeError> {
        self.exports.invoke(name, args)
    }

    /// Copy element segments into tables and data segments into memories.
    ///
    /// Every segment's offset is evaluated and bounds-checked before anything
    /// is written, so a failure leaves all tables and memories unchanged.
    pub fn initialize_segments(&self) -> Result<(), RuntimeError> {
        let mut table_writes = Vec::with_capacity(self.module.elements.len());
        for segment in &self.module.elements {
            let table = self
                .tables
                .get(segment.table_index as usize)
                .ok_or(RuntimeError::TableIndexOutOfBounds(segment.table_index))?;
            let offset = self.segment_offset(&segment.offset)?;
            let end = offset as u64 + segment.functions.len() as u64;
            if end > table.borrow().size() as u64 {
                return Err(RuntimeError::TableIndexOutOfBounds(offset));
            }
            table_writes.push((table, offset, &segment.functions));
        }

        let mut memory_writes = Vec::with_capacity(self.module.data.len());
        for segment in &self.module.data {
            let memory = self
                .memories
                .get(segment.memory_index as usize)
                .ok_or(RuntimeError::MemoryIndexOutOfBounds(segment.memory_index))?;
            let offset = self.segment_offset(&segment.offset)?;
            let end = offset as u64 + segment.bytes.len() as u64;
            if end > memory.borrow().len() as u64 {
                return Err(RuntimeError::MemoryError(format!(
                    "data segment does not fit: {offset}..{end} of {}",
                    memory.borrow().len()
                )));
            }
            memory_writes.push((memory, offset, segment.bytes));
        }

        for (table, offset, functions) in table_writes {
            table.borrow_mut().init(offset, functions)?;
        }
        for (memory, offset, bytes) in memory_writes {
            memory.borrow_mut().write_bytes(offset, bytes)?;
        }
        log::debug!(
            "initialized {} element and {} data segments",
            self.module.elements.len(),
            self.module.data.len()
        );
        Ok(())
    }

    fn segment_offset(&self, expr: &[Instruction]) -> Result<u32, RuntimeError> {
        let value = evaluate_typed(expr, &self.globals, ValueType::I32)?;
        // offsets are i32 values reinterpreted as unsigned addresses
        Ok(value.as_i32().unwrap_or_default() as u32)
    }
}

impl fmt::Debug for Instance<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("module", &self.module.name)
            .field("functions", &self.functions)
            .field("tables", &self.tables.len())
            .field("memories", &self.memories.len())
            .field("globals", &self.globals.len())
            .field("exports", &self.exports.names().collect::<Vec<_>>())
            .finish()
    }
}

fn bind_functions(module: &Module, imports: &ImportObject) -> Result<Vec<Callable>, LinkError> {
    let mut functions = Vec::with_capacity(module.functions.len());
    for function in &module.functions {
        let signature = module.types.get(function.type_index as usize).cloned();
        let callable = match &function.source {
            FunctionSource::Import { module: m, field } => match imports.resolve(m, field)? {
                HostValue::Function(func) => Callable::Host {
                    module: m.clone(),
                    field: field.clone(),
                    signature,
                    func: Rc::clone(func),
                },
                _ => {
                    return Err(LinkError::NotAFunction {
                        module: m.clone(),
                        field: field.clone(),
                    })
                }
            },
            FunctionSource::Local { body: None } => {
                return Err(LinkError::MissingBody {
                    index: function.index,
                })
            }
            FunctionSource::Local { body: Some(_) } => Callable::Local {
                index: function.index,
                name: module
                    .function_name(function.index)
                    .map(str::to_owned)
                    .unwrap_or_else(|| format!("func[{}]", function.index)),
                signature,
            },
        };
        log::debug!("bind func[{}] {callable:?}", function.index);
        functions.push(callable);
    }
    Ok(functions)
}

/// An import satisfies `declared` if it is at least as large and promises
/// no more growth than declared.
fn limits_compatible(declared: &Limits, actual_min: u32, actual_max: Option<u32>) -> Result<(), String> {
    if actual_min < declared.min {
        return Err(format!("size {actual_min} is below declared minimum {}", declared.min));
    }
    if let Some(max) = declared.max {
        match actual_max {
            Some(actual) if actual <= max => {}
            Some(actual) => return Err(format!("maximum {actual} exceeds declared maximum {max}")),
            None => return Err(format!("unbounded, but declared maximum is {max}")),
        }
    }
    Ok(())
}

fn incompatible(module: &str, field: &str, reason: String) -> LinkError {
    LinkError::IncompatibleImport {
        module: module.to_string(),
        field: field.to_string(),
        reason,
    }
}

fn bind_tables(module: &Module, imports: &ImportObject) -> Result<Vec<SharedTable>, LinkError> {
    let mut tables = Vec::with_capacity(module.tables.len());
    for table in &module.tables {
        let limits = &table.table_type.limits;
        let shared = match &table.source {
            Source::Import { module: m, field } => match imports.resolve(m, field)? {
                HostValue::Table(host) => {
                    {
                        let host = host.borrow();
                        limits_compatible(limits, host.size(), host.limits().max)
                            .map_err(|reason| incompatible(m, field, reason))?;
                    }
                    Rc::clone(host)
                }
                other => {
                    return Err(incompatible(
                        m,
                        field,
                        format!("expected table, found {}", other.kind_name()),
                    ))
                }
            },
            Source::Local => Rc::new(RefCell::new(Table::new(*limits)?)),
        };
        log::debug!("bind table[{}] {}", table.index, table.table_type);
        tables.push(shared);
    }
    Ok(tables)
}

fn bind_memories(module: &Module, imports: &ImportObject) -> Result<Vec<SharedMemory>, LinkError> {
    let mut memories = Vec::with_capacity(module.memories.len());
    for memory in &module.memories {
        let limits = &memory.memory_type.limits;
        let shared = match &memory.source {
            Source::Import { module: m, field } => match imports.resolve(m, field)? {
                HostValue::Memory(host) => {
                    {
                        let host = host.borrow();
                        limits_compatible(limits, host.size(), host.max_pages())
                            .map_err(|reason| incompatible(m, field, reason))?;
                    }
                    Rc::clone(host)
                }
                other => {
                    return Err(incompatible(
                        m,
                        field,
                        format!("expected memory, found {}", other.kind_name()),
                    ))
                }
            },
            Source::Local => Rc::new(RefCell::new(Memory::new(limits.min, limits.max)?)),
        };
        log::debug!("bind memory[{}] {}", memory.index, memory.memory_type);
        memories.push(shared);
    }
    Ok(memories)
}

/// Imported globals share the host's cell. Local globals are evaluated in
/// index order, each seeing only the globals bound before it.
fn bind_globals(module: &Module, imports: &ImportObject) -> Result<Vec<SharedGlobal>, LinkError> {
    let mut globals: Vec<SharedGlobal> = Vec::with_capacity(module.globals.len());
    for global in &module.globals {
        let value_type = global.global_type.value_type;
        let cell = match &global.source {
            GlobalSource::Import { module: m, field } => match imports.resolve(m, field)? {
                HostValue::Global(host) => {
                    let actual = host.get().typ();
                    if actual != value_type {
                        return Err(incompatible(
                            m,
                            field,
                            format!("expected {value_type} global, found {actual}"),
                        ));
                    }
                    Rc::clone(host)
                }
                other => {
                    return Err(incompatible(
                        m,
                        field,
                        format!("expected global, found {}", other.kind_name()),
                    ))
                }
            },
            GlobalSource::Local { init } => {
                let value = evaluate_typed(init, &globals, value_type)?;
                Rc::new(Cell::new(value))
            }
        };
        log::debug!("bind global[{}] {} = {}", global.index, global.global_type, cell.get());
        globals.push(cell);
    }
    Ok(globals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(value: Value, mutable: bool) -> GlobalExport {
        GlobalExport {
            cell: Rc::new(Cell::new(value)),
            global_type: GlobalType {
                value_type: value.typ(),
                mutable,
            },
        }
    }

    #[test]
    fn test_immutable_global_export() {
        let g = global(Value::I32(1), false);
        assert_eq!(g.set(Value::I32(2)), Err(RuntimeError::ImmutableGlobal));
        assert_eq!(g.get(), Value::I32(1));
    }

    #[test]
    fn test_mutable_global_export() {
        let g = global(Value::F64(1.0), true);
        g.set(Value::F64(2.0)).unwrap();
        assert_eq!(g.get(), Value::F64(2.0));
        assert!(matches!(
            g.set(Value::I32(0)),
            Err(RuntimeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_limits_compatible() {
        let declared = Limits { min: 1, max: Some(4) };
        assert!(limits_compatible(&declared, 2, Some(4)).is_ok());
        assert!(limits_compatible(&declared, 0, Some(4)).is_err());
        assert!(limits_compatible(&declared, 1, Some(5)).is_err());
        assert!(limits_compatible(&declared, 1, None).is_err());
        assert!(limits_compatible(&Limits { min: 0, max: None }, 0, None).is_ok());
    }

    #[test]
    fn test_local_callable_not_implemented() {
        let callable = Callable::Local {
            index: 1,
            name: "add_one".to_string(),
            signature: Some(FunctionType {
                params: vec![ValueType::I32],
                result: Some(ValueType::I32),
            }),
        };
        assert!(matches!(
            callable.call(&[Value::I64(0)]),
            Err(RuntimeError::TypeMismatch { .. })
        ));
        assert_eq!(
            callable.call(&[Value::I32(0)]),
            Err(RuntimeError::NotImplemented {
                function: "add_one".to_string()
            })
        );
    }
}
