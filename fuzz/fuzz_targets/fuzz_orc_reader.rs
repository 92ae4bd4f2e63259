#![no_main]

use dsff::formats::columnar::{from_table, ORC};
use dsff::formats::{CodecOptions, Input};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Detection runs the reader on arbitrary bytes and must never panic
    let _ = ORC.detect(&Input::from(data), &CodecOptions::default());

    let mut file = b"ORC".to_vec();
    file.extend_from_slice(data);
    if let Ok(table) = (ORC.read_table)(file.into()) {
        let _ = from_table(&table);
    }
});
