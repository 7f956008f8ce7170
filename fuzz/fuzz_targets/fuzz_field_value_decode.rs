#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Stored-field values carry a trailing tag byte; corrupt tags and
    // truncated bodies must come back as errors
    let _ = kivi::index::codec::decode_field_value("body", data);
});
