#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    separator: char,
    line: &'a str,
}

fuzz_target!(|input: Input| {
    // Splitting must never panic, whatever the separator or quoting
    let parser = ftv::parse::LineParser::new(input.separator);
    let _ = parser.parse(input.line);
});
