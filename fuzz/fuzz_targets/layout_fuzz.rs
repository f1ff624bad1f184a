//! Layout fuzz target: feed arbitrary text to the layout parser and validator.
//! Parsing must not panic; it returns a definition or a `PackError`.
//! Build with: cargo fuzz run layout_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    if let Ok(def) = isopack::build_layout(s) {
        let _ = isopack::validator::check(&def);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run layout_fuzz");
}
