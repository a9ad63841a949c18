/*!
Bundle encoding and decoding, RFC 9171 Section 4.1.

Bundles are encoded in canonical form: an indefinite-length array of
definite-length block arrays, each item in shortest form. The decoder also
accepts a definite-length outer array and non-shortest encodings, unless
[`Config::require_canonical`] is set.
*/

use super::*;

/// Encodes a bundle. Every block's CRC is computed here.
pub fn encode(bundle: &Bundle) -> Vec<u8> {
    cbor::encode::emit(bundle)
}

/// Decodes a bundle with the default [`Config`].
pub fn decode(data: &[u8]) -> Result<Bundle, DecodeError> {
    decode_with(data, &Config::default())
}

/// Decodes a bundle, which must occupy all of `data`.
pub fn decode_with(data: &[u8], config: &Config) -> Result<Bundle, DecodeError> {
    let r = cbor::decode::parse_detail::<Bundle>(data).and_then(|(bundle, shortest, len)| {
        if len != data.len() {
            Err(DecodeError::AdditionalData)
        } else if config.require_canonical && !shortest {
            Err(DecodeError::NonCanonical)
        } else {
            Ok(bundle)
        }
    });
    match &r {
        Ok(bundle) => trace!("Decoded bundle {}", bundle.id()),
        Err(e) => debug!("Failed to decode bundle: {e}"),
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn hello() -> Bundle {
        Builder::new()
            .source("dtn://a/".parse().unwrap())
            .destination("dtn://b/".parse().unwrap())
            .lifetime(3_600_000)
            .add_payload_block(b"hello")
            .build()
            .unwrap()
    }

    fn primary() -> PrimaryBlock {
        hello().primary().clone()
    }

    fn wrap(blocks: &[Vec<u8>]) -> Vec<u8> {
        let mut data = vec![0x9f];
        for block in blocks {
            data.extend_from_slice(block);
        }
        data.push(0xff);
        data
    }

    #[test]
    fn hello_roundtrip() {
        let bundle = hello();
        let data = encode(&bundle);
        assert_eq!(data.first(), Some(&0x9f));
        assert_eq!(data.last(), Some(&0xff));

        let decoded = decode(&data).unwrap();
        assert_eq!(decoded, bundle);
        assert_eq!(decoded.payload(), b"hello");
        assert_eq!(decoded.destination().to_string(), "dtn://b/");

        let created = decoded.creation_timestamp().creation_time;
        assert!(!decoded.is_expired(created));
        assert!(decoded.is_expired(DtnTime::new(created.millisecs() + 3_600_001)));

        // Canonical output passes the strictest policy
        let strict = Config {
            require_canonical: true,
            ..Default::default()
        };
        assert_eq!(decode_with(&data, &strict).unwrap(), bundle);
        assert_eq!(Bundle::try_from(data.as_slice()).unwrap(), bundle);
    }

    #[test]
    fn fragment_roundtrip() {
        let bundle = Builder::new()
            .source("ipn:1.1".parse().unwrap())
            .destination("ipn:2.1".parse().unwrap())
            .fragment(100, 500)
            .add_payload_block(&[7; 50])
            .build()
            .unwrap();
        let decoded = decode(&encode(&bundle)).unwrap();
        assert_eq!(
            decoded.fragment_info(),
            Some(FragmentInfo {
                offset: 100,
                total_len: 500
            })
        );
        assert_eq!(decoded, bundle);
    }

    #[test]
    fn too_few_blocks() {
        let primary = cbor::encode::emit(&primary());
        assert!(matches!(decode(&hex!("80")), Err(DecodeError::TooFewBlocks(0))));
        assert!(matches!(decode(&hex!("9f ff")), Err(DecodeError::TooFewBlocks(0))));
        assert!(matches!(
            decode(&wrap(&[primary.clone()])),
            Err(DecodeError::TooFewBlocks(1))
        ));

        let mut data = vec![0x81];
        data.extend_from_slice(&primary);
        assert!(matches!(decode(&data), Err(DecodeError::TooFewBlocks(1))));
    }

    #[test]
    fn payload_cardinality() {
        let primary = cbor::encode::emit(&primary());
        let payload = cbor::encode::emit(&CanonicalBlock::payload(b"x"));
        let hop_count = cbor::encode::emit(&CanonicalBlock::hop_count(
            2,
            &HopInfo { limit: 1, count: 0 },
        ));

        assert!(matches!(
            decode(&wrap(&[primary.clone(), hop_count])),
            Err(DecodeError::Invalid(ValidationError::MissingPayload))
        ));
        assert!(matches!(
            decode(&wrap(&[primary, payload.clone(), payload])),
            Err(DecodeError::Invalid(ValidationError::DuplicateBlockNumber(1)))
        ));
    }

    #[test]
    fn crc_enforced() {
        let data = encode(&hello());
        let start = data
            .windows(5)
            .position(|w| w == b"hello")
            .unwrap();

        for i in start..start + 5 {
            let mut corrupt = data.clone();
            corrupt[i] ^= 0x20;
            assert!(matches!(
                decode(&corrupt),
                Err(DecodeError::CrcMismatch { block_number: 1 })
            ));
        }

        // The destination is in the primary block
        let start = data.windows(3).position(|w| w == b"//b").unwrap();
        let mut corrupt = data.clone();
        corrupt[start + 2] = b'c';
        assert!(matches!(
            decode(&corrupt),
            Err(DecodeError::CrcMismatch { block_number: 0 })
        ));
    }

    #[test]
    fn no_crc() {
        let bundle = Builder::new()
            .crc_type(CrcType::None)
            .source("dtn://a/".parse().unwrap())
            .destination("dtn://b/".parse().unwrap())
            .add_payload_block(b"hello")
            .build()
            .unwrap();
        let mut data = encode(&bundle);
        let start = data
            .windows(5)
            .position(|w| w == b"hello")
            .unwrap();

        // Nothing covers the payload, so a damaged byte goes unnoticed
        data[start] = b'j';
        let decoded = decode(&data).unwrap();
        assert_eq!(decoded.payload(), b"jello");
        assert_eq!(decoded.blocks()[0].crc_type, CrcType::None);
        assert_eq!(decoded.primary(), bundle.primary());
    }

    #[test]
    fn field_counts() {
        let primary = primary();
        let payload = cbor::encode::emit(&CanonicalBlock::payload(b"x"));

        // Fragment flag set without fragment fields
        let mut flagged = primary.clone();
        flagged.flags.is_fragment = true;
        assert!(matches!(
            decode(&wrap(&[flagged.emit(), payload.clone()])),
            Err(DecodeError::FieldCountMismatch {
                block_number: 0,
                expected: 11
            })
        ));

        // Fragment fields without the fragment flag
        let unflagged = PrimaryBlock {
            fragment_info: Some(FragmentInfo {
                offset: 0,
                total_len: 10,
            }),
            ..primary.clone()
        };
        assert!(matches!(
            decode(&wrap(&[unflagged.emit(), payload])),
            Err(DecodeError::FieldCountMismatch {
                block_number: 0,
                expected: 9
            })
        ));

        // Canonical block with a spare item
        assert!(matches!(
            decode(&wrap(&[
                primary.emit(),
                hex!("86 01 01 00 00 41 00 00").to_vec()
            ])),
            Err(DecodeError::FieldCountMismatch {
                block_number: 1,
                expected: 5
            })
        ));
    }

    #[test]
    fn canonical_policy() {
        let bundle = hello();
        let strict = Config {
            require_canonical: true,
            ..Default::default()
        };

        // A definite-length outer array
        let mut definite = encode(&bundle);
        definite[0] = 0x82;
        definite.pop();
        assert_eq!(decode(&definite).unwrap(), bundle);
        assert!(matches!(
            decode_with(&definite, &strict),
            Err(DecodeError::NonCanonical)
        ));

        // An indefinite-length payload block
        let primary = bundle.primary().emit();
        let payload = hex!("9f 01 01 00 00 45 68656c6c6f ff").to_vec();
        let lax = decode(&wrap(&[primary.clone(), payload.clone()])).unwrap();
        assert_eq!(lax.payload(), b"hello");
        assert!(matches!(
            decode_with(&wrap(&[primary, payload]), &strict),
            Err(DecodeError::NonCanonical)
        ));
    }

    #[test]
    fn malformed() {
        let mut data = encode(&hello());
        data.push(0);
        assert!(matches!(decode(&data), Err(DecodeError::AdditionalData)));

        data.truncate(data.len() - 2);
        assert!(matches!(
            decode(&data),
            Err(DecodeError::MalformedCbor(cbor::decode::Error::NeedMoreData(_)))
        ));

        assert!(matches!(decode(&[]), Err(DecodeError::MalformedCbor(_))));
        assert!(matches!(
            decode(&hex!("9f 01 02 ff")),
            Err(DecodeError::MalformedCbor(cbor::decode::Error::IncorrectType(..)))
        ));
    }
}
