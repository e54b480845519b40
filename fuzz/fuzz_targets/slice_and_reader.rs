#![no_main]

use libfuzzer_sys::fuzz_target;
use xml_metadata::{Flow, Input, Options};

// Slice and reader input must agree: same value on success, both fail otherwise.
// The streaming path with a cutoff must never panic either.
fuzz_target!(|data: &[u8]| {
    if data.len() > 64 * 1024 {
        return;
    }
    let options = Options::metadata_record();

    let from_slice = xml_metadata::deserialize(data, &options);
    let from_reader = xml_metadata::deserialize(Input::reader(data), &options);
    match (&from_slice, &from_reader) {
        (Ok(a), Ok(b)) => assert_eq!(a.value, b.value),
        (Err(_), Err(_)) => {}
        _ => panic!("slice and reader disagree: {from_slice:?} vs {from_reader:?}"),
    }

    let streaming = xml_metadata::options! { depth_cutoff: 2 };
    let mut budget = 64;
    let _ = xml_metadata::deserialize_streaming(data, &streaming, |_, _| {
        budget -= 1;
        if budget == 0 { Flow::Stop } else { Flow::Continue }
    });
});
