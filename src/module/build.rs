use super::{Function, FunctionSource, Global, GlobalSource, Memory, Module, Source, Table};
use crate::parser::error::push_warning;
use crate::parser::names::NameSection;
use crate::parser::types::{ExternalKind, FunctionBody, ImportDescriptor};
use crate::parser::{ParsedModule, SectionPayload};

/// Fold parsed sections into a [`Module`].
///
/// Imports take the low indices of each index space; local definitions
/// follow in declaration order. Dangling references are reported as warnings
/// and never stop the build.
pub fn build(parsed: ParsedModule<'_>) -> Module<'_> {
    let mut module = Module {
        warnings: parsed.warnings,
        ..Module::default()
    };
    let mut local_functions_start: Option<u32> = None;
    let mut unattached_bodies = 0;

    for section in parsed.sections {
        match section.payload {
            SectionPayload::Type(types) => module.types = types,
            SectionPayload::Import(imports) => {
                for import in imports {
                    let (module_name, field) = (import.module, import.field);
                    match import.descriptor {
                        ImportDescriptor::Function(type_index) => {
                            let index = module.functions.len() as u32;
                            log::debug!("import func[{index}] <{module_name}.{field}> sig={type_index}");
                            module.functions.push(Function {
                                index,
                                name: None,
                                type_index,
                                source: FunctionSource::Import {
                                    module: module_name,
                                    field,
                                },
                            });
                        }
                        ImportDescriptor::Table(table_type) => {
                            let index = module.tables.len() as u32;
                            log::debug!("import table[{index}] <{module_name}.{field}> {table_type}");
                            module.tables.push(Table {
                                index,
                                source: Source::Import {
                                    module: module_name,
                                    field,
                                },
                                table_type,
                            });
                        }
                        ImportDescriptor::Memory(memory_type) => {
                            let index = module.memories.len() as u32;
                            log::debug!("import memory[{index}] <{module_name}.{field}> {memory_type}");
                            module.memories.push(Memory {
                                index,
                                source: Source::Import {
                                    module: module_name,
                                    field,
                                },
                                memory_type,
                            });
                        }
                        ImportDescriptor::Global(global_type) => {
                            let index = module.globals.len() as u32;
                            log::debug!("import global[{index}] <{module_name}.{field}> {global_type}");
                            module.globals.push(Global {
                                index,
                                global_type,
                                source: GlobalSource::Import {
                                    module: module_name,
                                    field,
                                },
                            });
                        }
                    }
                }
            }
            SectionPayload::Function(type_indices) => {
                local_functions_start = Some(module.functions.len() as u32);
                for type_index in type_indices {
                    let index = module.functions.len() as u32;
                    module.functions.push(Function {
                        index,
                        name: None,
                        type_index,
                        source: FunctionSource::Local { body: None },
                    });
                }
            }
            SectionPayload::Table(tables) => {
                for table_type in tables {
                    let index = module.tables.len() as u32;
                    module.tables.push(Table {
                        index,
                        source: Source::Local,
                        table_type,
                    });
                }
            }
            SectionPayload::Memory(memories) => {
                for memory_type in memories {
                    let index = module.memories.len() as u32;
                    module.memories.push(Memory {
                        index,
                        source: Source::Local,
                        memory_type,
                    });
                }
            }
            SectionPayload::Global(globals) => {
                for global in globals {
                    let index = module.globals.len() as u32;
                    module.globals.push(Global {
                        index,
                        global_type: global.global_type,
                        source: GlobalSource::Local { init: global.init },
                    });
                }
            }
            SectionPayload::Export(exports) => module.exports = exports,
            SectionPayload::Start(index) => module.start = Some(index),
            SectionPayload::Element(elements) => module.elements = elements,
            SectionPayload::Code(bodies) => {
                let start = local_functions_start.unwrap_or(module.functions.len() as u32);
                unattached_bodies += attach_bodies(&mut module, start, bodies);
            }
            SectionPayload::Data(data) => module.data = data,
            SectionPayload::Custom(custom) => {
                if let Some(names) = custom.names {
                    apply_names(&mut module, names);
                }
            }
        }
    }

    module.local_functions_start = local_functions_start.unwrap_or(module.functions.len() as u32);
    if unattached_bodies > 0 {
        push_warning(
            &mut module.warnings,
            format!("{unattached_bodies} function bodies without a declared function"),
        );
    }
    check_references(&mut module);

    log::debug!(
        "built module {:?}: {} types, {} functions ({} imported), {} tables, {} memories, {} globals, {} exports",
        module.name,
        module.types.len(),
        module.functions.len(),
        module.local_functions_start,
        module.tables.len(),
        module.memories.len(),
        module.globals.len(),
        module.exports.len()
    );
    module
}

/// Attach bodies in order starting at `start`. Returns how many had no
/// local function to go to.
fn attach_bodies(module: &mut Module, start: u32, bodies: Vec<FunctionBody>) -> usize {
    let mut extra = 0;
    for (i, body) in bodies.into_iter().enumerate() {
        match module.functions.get_mut(start as usize + i) {
            Some(Function {
                source: FunctionSource::Local { body: slot },
                ..
            }) => *slot = Some(body),
            _ => extra += 1,
        }
    }
    extra
}

fn apply_names(module: &mut Module, names: NameSection) {
    if let Some(name) = names.module_name {
        module.name = Some(name);
    }
    for (index, name) in names.function_names {
        match module.functions.get_mut(index as usize) {
            Some(function) => function.name = Some(name),
            None => push_warning(
                &mut module.warnings,
                format!("Undefined function index: {index} \"{name}\""),
            ),
        }
    }
    // local names are decoded but there is nowhere to put them yet
}

fn check_references(module: &mut Module) {
    let mut messages = Vec::new();

    for function in &module.functions {
        if function.type_index as usize >= module.types.len() {
            messages.push(format!(
                "Undefined type index: {} for function {}",
                function.type_index, function.index
            ));
        }
        if let FunctionSource::Local { body: None } = function.source {
            messages.push(format!("Missing body for function {}", function.index));
        }
    }

    for export in &module.exports {
        if export.index as usize >= module.index_space_len(export.kind) {
            messages.push(format!(
                "Undefined {} index: {} for export \"{}\"",
                export.kind, export.index, export.name
            ));
        }
    }

    if let Some(start) = module.start {
        if start as usize >= module.index_space_len(ExternalKind::Function) {
            messages.push(format!("Undefined start function index: {start}"));
        }
    }

    for message in messages {
        push_warning(&mut module.warnings, message);
    }
}
