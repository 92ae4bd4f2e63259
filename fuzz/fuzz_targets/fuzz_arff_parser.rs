#![no_main]

use dsff::formats::{arff, CodecOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary text must parse or fail with an error, never panic
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(dataset) = arff::parse(text, &CodecOptions::default()) {
            // A parsed dataset must render back without panicking
            let _ = arff::render(&dataset, dataset.name(), &CodecOptions::default());
        }
    }
});
