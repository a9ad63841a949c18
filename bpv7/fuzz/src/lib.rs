use dtnbp_bpv7::{codec, prelude::*};

/// Decodes `data`, and checks that anything accepted survives re-encoding.
pub fn check_bundle(data: &[u8]) {
    let Ok(bundle) = codec::decode(data) else {
        return;
    };
    match codec::decode(&codec::encode(&bundle)) {
        Ok(rewritten) if rewritten == bundle => {}
        Ok(_) => panic!("Re-encoded bundle differs"),
        Err(e) => panic!("Re-encoded bundle is invalid: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn sample() {
        for _ in 0..8 {
            let bundle = dtnbp_bpv7::sample::rnd_bundle(CreationTimestamp::now()).unwrap();
            check_bundle(&codec::encode(&bundle));
        }
    }

    #[test]
    fn junk() {
        check_bundle(&[]);
        check_bundle(&hex!("9f ff"));
        check_bundle(&hex!("9f 9f 07 ff ff"));
        check_bundle(&hex!("9f 88 07 00 00 82 01 00 ff"));
    }
}
