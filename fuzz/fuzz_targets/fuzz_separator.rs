#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let sample: Vec<&str> = data.lines().take(ftv::parse::SAMPLE_LINES).collect();
    let _ = ftv::parse::detect_separator(&sample);
});
