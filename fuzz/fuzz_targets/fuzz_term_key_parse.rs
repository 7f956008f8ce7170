#![no_main]

use libfuzzer_sys::fuzz_target;

use kivi::store::RowKey;

fuzz_target!(|data: &[u8]| {
    // Range scans can surface keys written by anything sharing the store;
    // parsing must reject them gracefully
    let key = RowKey(data.to_vec());
    let _ = kivi::index::keys::parse_term_key("fuzz", &key);
});
