mod common;

#[cfg(test)]
mod tests {
    use crate::common::*;
    use wasmload::module::{build, FunctionSource, GlobalSource, Source};
    use wasmload::parser::encoding::*;
    use wasmload::parser::parse;
    use wasmload::parser::types::{ExternalKind, ValueType};

    /// Two imported functions followed by three local ones.
    fn two_plus_three(names: &[(u32, &str)]) -> Vec<u8> {
        let nop_body = body(&[], &[OP_END]);
        WasmBuilder::new()
            .vec_section(SECTION_TYPE, &[func_type(&[], None)])
            .vec_section(
                SECTION_IMPORT,
                &[import_func("env", "a", 0), import_func("env", "b", 0)],
            )
            .vec_section(SECTION_FUNCTION, &[u32_item(0), u32_item(0), u32_item(0)])
            .vec_section(
                SECTION_CODE,
                &[nop_body.clone(), nop_body.clone(), nop_body],
            )
            .custom(NAME_SECTION, &name_payload(Some("five"), names))
            .finish()
    }

    #[test]
    fn test_unified_function_index_space() {
        init_logger();
        let bytes = two_plus_three(&[(0, "a"), (1, "b"), (2, "c"), (3, "d"), (4, "e")]);
        let module = build(parse(&bytes).unwrap());

        assert_eq!(module.name.as_deref(), Some("five"));
        assert_eq!(module.functions.len(), 5);
        assert_eq!(module.local_functions_start, 2);
        assert_eq!(module.imported_functions().count(), 2);
        assert_eq!(module.local_functions().count(), 3);
        for (i, function) in module.functions.iter().enumerate() {
            assert_eq!(function.index as usize, i);
            assert_eq!(function.is_import(), i < 2);
            assert_eq!(function.body().is_some(), i >= 2);
        }
        assert_eq!(module.function_name(4), Some("e"));
        assert!(module.warnings.is_empty(), "{:?}", module.warnings);
    }

    #[test]
    fn test_name_past_index_space_warns_once() {
        init_logger();
        let bytes = two_plus_three(&[(0, "a"), (2, "c"), (5, "ghost"), (4, "e")]);
        let module = build(parse(&bytes).unwrap());

        assert_eq!(module.warnings.len(), 1);
        assert_eq!(
            module.warnings[0].message,
            "Undefined function index: 5 \"ghost\""
        );
        assert_eq!(module.function_name(0), Some("a"));
        assert_eq!(module.function_name(1), None);
        assert_eq!(module.function_name(2), Some("c"));
        assert_eq!(module.function_name(4), Some("e"));
    }

    #[test]
    fn test_import_kinds_take_low_indices() {
        let table = [&[DESC_TABLE, TYPE_ANYFUNC][..], &limits(1, Some(4))].concat();
        let memory = [&[DESC_MEMORY][..], &limits(1, None)].concat();
        let bytes = WasmBuilder::new()
            .vec_section(
                SECTION_IMPORT,
                &[
                    import("env", "table", &table),
                    import("env", "memory", &memory),
                    import_global("env", "g", TYPE_I64, false),
                ],
            )
            .vec_section(SECTION_MEMORY, &[limits(2, Some(3))])
            .vec_section(SECTION_GLOBAL, &[global(TYPE_I32, true, &i32_const(9))])
            .finish();
        let module = build(parse(&bytes).unwrap());

        assert_eq!(module.tables.len(), 1);
        assert_eq!(
            module.tables[0].source,
            Source::Import {
                module: "env".to_string(),
                field: "table".to_string()
            }
        );
        assert_eq!(module.tables[0].table_type.limits.max, Some(4));

        assert_eq!(module.memories.len(), 2);
        assert!(module.memories[0].source.is_import());
        assert_eq!(module.memories[1].source, Source::Local);
        assert_eq!(module.memories[1].memory_type.limits.min, 2);

        assert_eq!(module.globals.len(), 2);
        assert!(matches!(module.globals[0].source, GlobalSource::Import { .. }));
        assert_eq!(module.globals[0].global_type.value_type, ValueType::I64);
        assert!(matches!(module.globals[1].source, GlobalSource::Local { .. }));
        assert!(module.globals[1].global_type.mutable);

        assert_eq!(module.index_space_len(ExternalKind::Memory), 2);
        assert_eq!(module.index_space_len(ExternalKind::Function), 0);
    }

    #[test]
    fn test_function_without_body() {
        let bytes = WasmBuilder::new()
            .vec_section(SECTION_TYPE, &[func_type(&[], None)])
            .vec_section(SECTION_FUNCTION, &[u32_item(0)])
            .finish();
        let module = build(parse(&bytes).unwrap());

        assert!(matches!(
            module.functions[0].source,
            FunctionSource::Local { body: None }
        ));
        assert_eq!(module.warnings.len(), 1);
        assert_eq!(module.warnings[0].message, "Missing body for function 0");
    }

    #[test]
    fn test_dangling_references_are_warnings() {
        let bytes = WasmBuilder::new()
            .vec_section(SECTION_TYPE, &[func_type(&[], None)])
            .vec_section(SECTION_FUNCTION, &[u32_item(3)])
            .vec_section(
                SECTION_EXPORT,
                &[export("f", DESC_FUNC, 0), export("mem", DESC_MEMORY, 0)],
            )
            .section(SECTION_START, &u32_item(7))
            .vec_section(SECTION_CODE, &[body(&[], &[OP_END])])
            .finish();
        let module = build(parse(&bytes).unwrap());

        let messages: Vec<_> = module.warnings.iter().map(|w| w.message.as_str()).collect();
        assert!(messages.contains(&"Undefined type index: 3 for function 0"));
        assert!(messages.contains(&"Undefined memory index: 0 for export \"mem\""));
        assert!(messages.contains(&"Undefined start function index: 7"));
        assert_eq!(messages.len(), 3);
        assert_eq!(module.start, Some(7));
    }

    #[test]
    fn test_log_module_shape() {
        let bytes = log_module();
        let module = build(parse(&bytes).unwrap());

        assert_eq!(module.name.as_deref(), Some("logger"));
        let callee = module.function(1).unwrap();
        assert_eq!(callee.name.as_deref(), Some("add_one_and_log"));
        assert_eq!(module.function_type(1).unwrap().to_string(), "(i32) -> i32");
        assert_eq!(module.function_type(0).unwrap().to_string(), "(i32) -> nil");
        let body = callee.body().unwrap();
        assert_eq!(body.instructions.len(), 8);
        assert_eq!(body.instructions[3].to_string(), "call 0");
        assert_eq!(module.export("add_one_and_log").unwrap().index, 1);
        assert!(module.warnings.is_empty());
    }
}
