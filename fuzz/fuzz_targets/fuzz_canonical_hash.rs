#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Hashing arbitrary input must not panic, and must be deterministic.
        if let Ok(first) = zatca_pos::ubl::canonical_invoice_hash(s) {
            assert_eq!(zatca_pos::ubl::canonical_invoice_hash(s).ok(), Some(first));
        }
    }
});
