#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = symfeed::symbols::symbol_signature(data, &symfeed::config::ParseLimits::default());
});
