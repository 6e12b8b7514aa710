#![no_main]

use libfuzzer_sys::fuzz_target;
use seglog::record::LogEntry;

fuzz_target!(|data: &[u8]| {
    // Limit input size to prevent timeout
    if data.len() > 1_000_000 {
        return;
    }

    // Try to decode a frame - should never panic
    let _ = LogEntry::decode(data);
});
