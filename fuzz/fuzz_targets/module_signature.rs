#![no_main]
use libfuzzer_sys::fuzz_target;
use symfeed::config::{ParseLimits, SignatureConfig};
use symfeed::symbols::module_debug_info;

fuzz_target!(|data: &[u8]| {
    let limits = ParseLimits::default();
    if let Ok(info) = module_debug_info(data, &SignatureConfig::default(), &limits) {
        let _ = info.symbol_reference();
    }
    let _ = module_debug_info(data, &SignatureConfig::timestamp_first(), &limits);
});
