#![no_main]

use dsff::container::Container;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Opening arbitrary bytes either yields a valid container or an error
    if let Ok(container) = Container::from_bytes(data) {
        // Valid containers must re-encode and expose their rows
        let _ = container.data();
        let _ = container.features();
        let _ = container.to_bytes();
    }
});
