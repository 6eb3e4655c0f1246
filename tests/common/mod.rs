//! Hand assembly of module binaries for integration tests

#![allow(dead_code)]

use wasmload::parser::encoding::*;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Appends sections to a module header.
pub struct WasmBuilder {
    bytes: Vec<u8>,
}

impl WasmBuilder {
    pub fn new() -> Self {
        let mut bytes = Vec::new();
        write_header(&mut bytes);
        WasmBuilder { bytes }
    }

    pub fn section(mut self, code: u8, payload: &[u8]) -> Self {
        write_section(&mut self.bytes, code, payload);
        self
    }

    /// A section whose payload is a vector of `items`.
    pub fn vec_section(self, code: u8, items: &[Vec<u8>]) -> Self {
        self.section(code, &vec_of(items))
    }

    pub fn custom(mut self, name: &str, payload: &[u8]) -> Self {
        write_custom_section(&mut self.bytes, name, payload);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// `count:varuint32` followed by the concatenated items.
pub fn vec_of(items: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_vu32(&mut buf, items.len() as u32);
    for item in items {
        buf.extend_from_slice(item);
    }
    buf
}

pub fn func_type(params: &[u8], result: Option<u8>) -> Vec<u8> {
    let mut buf = vec![TYPE_FUNC];
    write_u8vec(&mut buf, params);
    match result {
        Some(t) => buf.extend([0x01, t]),
        None => buf.push(0x00),
    }
    buf
}

pub fn import(module: &str, field: &str, descriptor: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_name(&mut buf, module);
    write_name(&mut buf, field);
    buf.extend_from_slice(descriptor);
    buf
}

pub fn import_func(module: &str, field: &str, type_index: u32) -> Vec<u8> {
    let mut desc = vec![DESC_FUNC];
    write_vu32(&mut desc, type_index);
    import(module, field, &desc)
}

pub fn import_global(module: &str, field: &str, value_type: u8, mutable: bool) -> Vec<u8> {
    import(module, field, &[DESC_GLOBAL, value_type, u8::from(mutable)])
}

pub fn export(name: &str, kind: u8, index: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    write_name(&mut buf, name);
    buf.push(kind);
    write_vu32(&mut buf, index);
    buf
}

pub fn u32_item(value: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    write_vu32(&mut buf, value);
    buf
}

/// Limits: `min` only, or `min` and `max`.
pub fn limits(min: u32, max: Option<u32>) -> Vec<u8> {
    let mut buf = Vec::new();
    match max {
        None => {
            buf.push(LIMITS_MIN);
            write_vu32(&mut buf, min);
        }
        Some(max) => {
            buf.push(LIMITS_MIN_MAX);
            write_vu32(&mut buf, min);
            write_vu32(&mut buf, max);
        }
    }
    buf
}

pub fn i32_const(value: i32) -> Vec<u8> {
    let mut buf = vec![0x41];
    write_vs32(&mut buf, value);
    buf.push(OP_END);
    buf
}

pub fn global(value_type: u8, mutable: bool, init: &[u8]) -> Vec<u8> {
    let mut buf = vec![value_type, u8::from(mutable)];
    buf.extend_from_slice(init);
    buf
}

/// A size-prefixed code section entry. `code` must end with `end`.
pub fn body(locals: &[(u32, u8)], code: &[u8]) -> Vec<u8> {
    let mut inner = Vec::new();
    write_vu32(&mut inner, locals.len() as u32);
    for (count, value_type) in locals {
        write_vu32(&mut inner, *count);
        inner.push(*value_type);
    }
    inner.extend_from_slice(code);
    let mut buf = Vec::new();
    write_u8vec(&mut buf, &inner);
    buf
}

pub fn data_segment(memory: u32, offset: i32, bytes: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_vu32(&mut buf, memory);
    buf.extend(i32_const(offset));
    write_u8vec(&mut buf, bytes);
    buf
}

pub fn element_segment(table: u32, offset: i32, functions: &[u32]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_vu32(&mut buf, table);
    buf.extend(i32_const(offset));
    write_vu32(&mut buf, functions.len() as u32);
    for f in functions {
        write_vu32(&mut buf, *f);
    }
    buf
}

/// Payload of a `"name"` custom section.
pub fn name_payload(module: Option<&str>, functions: &[(u32, &str)]) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(module) = module {
        let mut sub = Vec::new();
        write_name(&mut sub, module);
        buf.push(NAME_MODULE);
        write_u8vec(&mut buf, &sub);
    }
    if !functions.is_empty() {
        let mut sub = Vec::new();
        write_vu32(&mut sub, functions.len() as u32);
        for (index, name) in functions {
            write_vu32(&mut sub, *index);
            write_name(&mut sub, name);
        }
        buf.push(NAME_FUNCTION);
        write_u8vec(&mut buf, &sub);
    }
    buf
}

/// One imported `env.log_message (i32)` and one local
/// `add_one_and_log (i32) -> i32` that calls it with its argument plus one
/// and returns the same value.
pub fn log_module() -> Vec<u8> {
    // local.get 0, i32.const 1, i32.add, call 0,
    // local.get 0, i32.const 1, i32.add, end
    let code = [
        0x20, 0x00, 0x41, 0x01, 0x6a, 0x10, 0x00, 0x20, 0x00, 0x41, 0x01, 0x6a, 0x0b,
    ];
    WasmBuilder::new()
        .vec_section(
            SECTION_TYPE,
            &[
                func_type(&[TYPE_I32], None),
                func_type(&[TYPE_I32], Some(TYPE_I32)),
            ],
        )
        .vec_section(SECTION_IMPORT, &[import_func("env", "log_message", 0)])
        .vec_section(SECTION_FUNCTION, &[u32_item(1)])
        .vec_section(SECTION_EXPORT, &[export("add_one_and_log", DESC_FUNC, 1)])
        .vec_section(SECTION_CODE, &[body(&[], &code)])
        .custom(
            NAME_SECTION,
            &name_payload(Some("logger"), &[(0, "log_message"), (1, "add_one_and_log")]),
        )
        .finish()
}
