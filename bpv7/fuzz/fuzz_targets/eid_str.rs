#![no_main]

use dtnbp_bpv7::eid::Eid;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(eid) = std::str::from_utf8(data).map(str::parse::<Eid>) {
        _ = eid.map(|eid| eid.to_string());
    }
});
