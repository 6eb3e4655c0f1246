#![no_main]

use libfuzzer_sys::fuzz_target;

use wasmload::module;
use wasmload::parser;

fuzz_target!(|data: &[u8]| {
    // Looking for panics only; decode errors and build warnings are expected
    if let Ok(parsed) = parser::parse(data) {
        let _ = module::build(parsed);
    }
});
