#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary column values must decode to an error at worst, never
    // panic or over-allocate
    let _ = kivi::index::codec::decode_posting(data);
    let _ = kivi::index::codec::decode_term_list(data);
});
