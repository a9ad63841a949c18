#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    common::check_bundle(data);
});

// cargo cov -- export --format=lcov  -instr-profile ./fuzz/coverage/bundle/coverage.profdata ./target/x86_64-unknown-linux-gnu/coverage/x86_64-unknown-linux-gnu/release/bundle -ignore-filename-regex='/.cargo/|rustc/|/target/' > ./fuzz/coverage/bundle/lcov.info
