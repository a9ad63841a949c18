use super::*;
use block::{finish_block, parse_crc_type, parse_field};

/// The primary block of a bundle, RFC 9171 Section 4.3.1.
///
/// The protocol version is always 7, and is not stored.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PrimaryBlock {
    pub flags: BundleFlags,
    pub crc_type: CrcType,
    pub destination: Eid,
    pub source: Eid,
    pub report_to: Eid,
    pub timestamp: CreationTimestamp,
    /// Lifetime in milliseconds.
    pub lifetime: u64,
    /// Present if and only if the bundle is a fragment.
    pub fragment_info: Option<FragmentInfo>,
}

const VERSION: u64 = 7;

impl PrimaryBlock {
    fn field_count(&self) -> usize {
        let fields = if self.fragment_info.is_some() { 10 } else { 8 };
        if self.crc_type == CrcType::None {
            fields
        } else {
            fields + 1
        }
    }

    /// Encodes the block as a definite-length array, with its CRC.
    pub(crate) fn emit(&self) -> Vec<u8> {
        crc::append_crc_value(
            self.crc_type,
            cbor::encode::emit_array(Some(self.field_count()), |a| {
                a.emit(&VERSION);
                a.emit(&self.flags);
                a.emit(&self.crc_type);
                a.emit(&self.destination);
                a.emit(&self.source);
                a.emit(&self.report_to);
                a.emit(&self.timestamp);
                a.emit(&self.lifetime);

                if let Some(fragment_info) = &self.fragment_info {
                    a.emit(&fragment_info.offset);
                    a.emit(&fragment_info.total_len);
                }

                // CRC
                if self.crc_type != CrcType::None {
                    a.skip_value();
                }
            }),
        )
    }

    /// The CRC value that the block carries when encoded.
    pub fn crc_value(&self) -> Option<u32> {
        crc::trailing_crc_value(self.crc_type, &self.emit())
    }
}

impl cbor::encode::ToCbor for PrimaryBlock {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit(&cbor::encode::Raw(&self.emit()))
    }
}

impl cbor::decode::FromCbor for PrimaryBlock {
    type Error = DecodeError;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
        cbor::decode::try_parse_array(data, |block, s, tags| {
            let mut shortest = s && tags.is_empty() && block.is_definite();

            let version = parse_field::<u64>(block, &mut shortest, 0, 8)?;
            if version != VERSION {
                return Err(DecodeError::InvalidVersion(version));
            }

            let flags = parse_field::<BundleFlags>(block, &mut shortest, 0, 8)?;
            let field_count = if flags.is_fragment { 10 } else { 8 };
            let (crc_type, expected) = parse_crc_type(block, &mut shortest, 0, field_count)?;

            let destination = parse_field::<Eid>(block, &mut shortest, 0, expected)?;
            let source = parse_field::<Eid>(block, &mut shortest, 0, expected)?;
            let report_to = parse_field::<Eid>(block, &mut shortest, 0, expected)?;
            let timestamp = parse_field::<CreationTimestamp>(block, &mut shortest, 0, expected)?;
            let lifetime = parse_field::<u64>(block, &mut shortest, 0, expected)?;

            let fragment_info = if flags.is_fragment {
                Some(FragmentInfo {
                    offset: parse_field(block, &mut shortest, 0, expected)?,
                    total_len: parse_field(block, &mut shortest, 0, expected)?,
                })
            } else {
                None
            };

            finish_block(data, block, &mut shortest, crc_type, 0, expected)?;

            trace!("Parsed primary block of bundle from {source}");
            Ok((
                Self {
                    flags,
                    crc_type,
                    destination,
                    source,
                    report_to,
                    timestamp,
                    lifetime,
                    fragment_info,
                },
                shortest,
            ))
        })
        .map(|o| o.map(|((v, s), len)| (v, s, len)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn primary() -> PrimaryBlock {
        PrimaryBlock {
            destination: "ipn:2.1".parse().unwrap(),
            source: "ipn:1.1".parse().unwrap(),
            timestamp: CreationTimestamp::new(DtnTime::new(1000), 0),
            lifetime: 3_600_000,
            ..Default::default()
        }
    }

    #[test]
    fn encode() {
        let block = primary();
        assert_eq!(
            cbor::encode::emit(&block),
            hex!("88 07 00 00 82 02 82 02 01 82 02 82 01 01 82 01 00 82 19 03e8 00 1a 0036ee80")
        );

        let block = PrimaryBlock {
            flags: BundleFlags {
                is_fragment: true,
                ..Default::default()
            },
            fragment_info: Some(FragmentInfo {
                offset: 100,
                total_len: 500,
            }),
            crc_type: CrcType::CRC32_CASTAGNOLI,
            ..primary()
        };
        let data = cbor::encode::emit(&block);
        assert_eq!(data[0], 0x8b);
        let (decoded, shortest, len) = cbor::decode::parse_detail::<PrimaryBlock>(&data).unwrap();
        assert_eq!(decoded, block);
        assert!(shortest);
        assert_eq!(len, data.len());
        assert!(block.crc_value().is_some());
    }

    #[test]
    fn decode_errors() {
        assert!(matches!(
            cbor::decode::parse::<PrimaryBlock>(&hex!("88 06 00 00")),
            Err(DecodeError::InvalidVersion(6))
        ));

        // Fragment flag set, but no fragment fields
        assert!(matches!(
            cbor::decode::parse::<PrimaryBlock>(&hex!(
                "88 07 01 00 82 02 82 02 01 82 02 82 01 01 82 01 00 82 19 03e8 00 1a 0036ee80"
            )),
            Err(DecodeError::FieldCountMismatch {
                block_number: 0,
                expected: 10
            })
        ));

        // Fragment fields, but no fragment flag
        assert!(matches!(
            cbor::decode::parse::<PrimaryBlock>(&hex!(
                "8a 07 00 00 82 02 82 02 01 82 02 82 01 01 82 01 00 82 19 03e8 00 1a 0036ee80 00 01"
            )),
            Err(DecodeError::FieldCountMismatch {
                block_number: 0,
                expected: 8
            })
        ));

        assert!(matches!(
            cbor::decode::parse::<PrimaryBlock>(&hex!(
                "88 07 00 00 82 02 82 00 01 82 02 82 01 01 82 01 00 82 19 03e8 00 1a 0036ee80"
            )),
            Err(DecodeError::InvalidEndpoint(_))
        ));

        // Corrupt the CRC
        let mut data = cbor::encode::emit(&PrimaryBlock {
            crc_type: CrcType::CRC16_X25,
            ..primary()
        });
        let len = data.len();
        data[len - 1] ^= 1;
        assert!(matches!(
            cbor::decode::parse::<PrimaryBlock>(&data),
            Err(DecodeError::CrcMismatch { block_number: 0 })
        ));
    }
}
