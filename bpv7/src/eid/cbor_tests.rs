use super::*;
use hex_literal::hex;

#[test]
fn tests() {
    // Positive tests
    check(&hex!("82 02 82 01 01"), "ipn:1.1", true);
    check(&hex!("82 02 82 1A 000EE868 02"), "ipn:977000.2", true);
    check(&hex!("82 02 82 1B 00000000000EE868 02"), "ipn:977000.2", false);
    check(&hex!("82 02 82 00 00"), "dtn:none", true);
    check(&hex!("82 01 00"), "dtn:none", true);
    check(&hex!("82 01 64 6E6F6E65"), "dtn:none", true);
    check(&hex!("82 01 65 2F2F612F62"), "dtn://a/b", true);
    check(&hex!("82 01 7F 63 2F2F61 62 2F62 FF"), "dtn://a/b", false);
    check(&hex!("9F 02 82 01 01 FF"), "ipn:1.1", false);

    let (eid, shortest, len) =
        cbor::decode::parse_detail::<Eid>(&hex!("82 03 82 01 02 00")).unwrap();
    assert_eq!(
        eid,
        Eid::Unknown {
            scheme: 3,
            data: hex!("82 01 02").into()
        }
    );
    assert!(shortest);
    assert_eq!(len, 5);
    assert_eq!(cbor::encode::emit(&eid), hex!("82 03 82 01 02"));

    // Negative tests
    assert!(matches!(
        expect_error(&[]),
        Error::InvalidCBOR(cbor::decode::Error::NeedMoreData(1))
    ));
    assert!(matches!(
        expect_error(&hex!("82 00 00")),
        Error::UnsupportedScheme(0)
    ));
    assert!(matches!(
        expect_error(&hex!("81 07")),
        Error::UnsupportedScheme(7)
    ));
    assert!(matches!(
        expect_error(&hex!("82 02 81 00")),
        Error::InvalidField {
            field: "'ipn' scheme-specific part",
            ..
        }
    ));
    assert!(matches!(
        expect_error(&hex!("82 02 83 00 00 00")),
        Error::InvalidField {
            field: "'ipn' scheme-specific part",
            ..
        }
    ));
    assert!(matches!(
        expect_error(&hex!("82 02 82 00 01")),
        Error::InvalidField {
            field: "'ipn' scheme-specific part",
            ..
        }
    ));
    assert!(matches!(
        expect_error(&hex!("82 01 63 2F2F61")),
        Error::InvalidField {
            field: "'dtn' scheme-specific part",
            ..
        }
    ));
    assert!(matches!(
        expect_error(&hex!("82 01 01")),
        Error::InvalidField {
            field: "'dtn' scheme-specific part",
            ..
        }
    ));
    assert!(matches!(
        expect_error(&hex!("82 F5 00")),
        Error::InvalidField {
            field: "EID scheme",
            ..
        }
    ));
    assert!(matches!(
        expect_error(&hex!("83 02 82 01 01 00")),
        Error::InvalidCBOR(cbor::decode::Error::AdditionalItems)
    ));
}

fn check(data: &[u8], expected: &str, expected_shortest: bool) {
    let (eid, shortest, len) = cbor::decode::parse_detail::<Eid>(data).expect("Invalid CBOR");
    assert_eq!(eid.to_string(), expected);
    assert_eq!(shortest, expected_shortest);
    assert_eq!(len, data.len());
}

fn expect_error(data: &[u8]) -> Error {
    cbor::decode::parse::<Eid>(data).expect_err("Parsed successfully!")
}
