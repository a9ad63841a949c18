#![no_main]

use dtnbp_bpv7::eid::Eid;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(eid) = dtnbp_cbor::decode::parse::<Eid>(data) {
        let data = dtnbp_cbor::encode::emit(&eid);
        assert_eq!(dtnbp_cbor::decode::parse::<Eid>(&data).ok(), Some(eid));
    }
});
