#![no_main]

use chrono::FixedOffset;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Some(offset) = FixedOffset::east_opt(3 * 3600) {
            let _ = zatca_pos::ubl::extract_signature_artifacts(s, offset);
        }
    }
});
