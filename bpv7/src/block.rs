/*!
Canonical blocks, RFC 9171 Section 4.3.2, and the [`Block`] view over both
kinds of block in a bundle.
*/

use super::*;

/// A canonical block: the payload block or an extension block.
///
/// The CRC value is not stored; it is computed from the other fields each
/// time the block is encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalBlock {
    pub block_type: BlockType,
    pub block_number: u64,
    pub flags: BlockFlags,
    pub crc_type: CrcType,
    /// The block-type-specific data.
    pub data: Box<[u8]>,
}

impl CanonicalBlock {
    pub fn new(block_type: BlockType, block_number: u64, data: Box<[u8]>) -> Self {
        Self {
            block_type,
            block_number,
            flags: BlockFlags::default(),
            crc_type: CrcType::None,
            data,
        }
    }

    /// A payload block, which is always block number 1.
    pub fn payload(data: &[u8]) -> Self {
        Self::new(BlockType::Payload, 1, data.into())
    }

    pub fn previous_node(block_number: u64, node: &Eid) -> Self {
        Self::new(
            BlockType::PreviousNode,
            block_number,
            cbor::encode::emit(node).into(),
        )
    }

    /// A Bundle Age block, `age` in milliseconds.
    pub fn bundle_age(block_number: u64, age: u64) -> Self {
        Self::new(
            BlockType::BundleAge,
            block_number,
            cbor::encode::emit(&age).into(),
        )
    }

    pub fn hop_count(block_number: u64, hop_info: &HopInfo) -> Self {
        Self::new(
            BlockType::HopCount,
            block_number,
            cbor::encode::emit(hop_info).into(),
        )
    }

    /// The CRC value that the block carries when encoded.
    pub fn crc_value(&self) -> Option<u32> {
        crc::trailing_crc_value(self.crc_type, &self.emit())
    }

    /// Decodes the block-type-specific data, which must be a single CBOR item.
    pub(crate) fn parse_data<T: cbor::decode::FromCbor>(&self) -> Result<T, T::Error> {
        let (value, _, len) = cbor::decode::parse_detail::<T>(&self.data)?;
        if len != self.data.len() {
            return Err(cbor::decode::Error::AdditionalItems.into());
        }
        Ok(value)
    }

    /// Checks that the data of a known extension block type decodes.
    pub(crate) fn check_data(&self) -> Result<(), ValidationError> {
        let valid = match self.block_type {
            BlockType::PreviousNode => self.parse_data::<Eid>().is_ok(),
            BlockType::BundleAge => self.parse_data::<u64>().is_ok(),
            BlockType::HopCount => self.parse_data::<HopInfo>().is_ok(),
            _ => true,
        };
        if valid {
            Ok(())
        } else {
            Err(ValidationError::InvalidExtensionBlock(self.block_number))
        }
    }

    fn field_count(&self) -> usize {
        if self.crc_type == CrcType::None { 5 } else { 6 }
    }

    /// Encodes the block as a definite-length array, with its CRC.
    pub(crate) fn emit(&self) -> Vec<u8> {
        crc::append_crc_value(
            self.crc_type,
            cbor::encode::emit_array(Some(self.field_count()), |a| {
                a.emit(&self.block_type);
                a.emit(&self.block_number);
                a.emit(&self.flags);
                a.emit(&self.crc_type);
                a.emit(&self.data);

                // CRC
                if self.crc_type != CrcType::None {
                    a.skip_value();
                }
            }),
        )
    }
}

impl cbor::encode::ToCbor for CanonicalBlock {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit(&cbor::encode::Raw(&self.emit()))
    }
}

/// Parses the next field of a block, tracking whether every field so far was
/// in shortest form.
pub(crate) fn parse_field<T>(
    block: &mut cbor::decode::Array,
    shortest: &mut bool,
    block_number: u64,
    expected: usize,
) -> Result<T, DecodeError>
where
    T: cbor::decode::FromCbor,
    DecodeError: From<T::Error>,
{
    match block.try_parse::<T>()? {
        Some((value, s)) => {
            *shortest = *shortest && s;
            Ok(value)
        }
        None => Err(DecodeError::FieldCountMismatch {
            block_number,
            expected,
        }),
    }
}

/// Parses the CRC type field, and checks the item count of a definite-length
/// block now that it is known.
pub(crate) fn parse_crc_type(
    block: &mut cbor::decode::Array,
    shortest: &mut bool,
    block_number: u64,
    field_count: usize,
) -> Result<(CrcType, usize), DecodeError> {
    let crc_type = parse_field::<u64>(block, shortest, block_number, field_count)?;
    let crc_type = CrcType::try_from(crc_type).map_err(DecodeError::from_crc(block_number))?;
    let expected = if crc_type == CrcType::None {
        field_count
    } else {
        field_count + 1
    };
    if block.len().is_some_and(|len| len != expected) {
        return Err(DecodeError::FieldCountMismatch {
            block_number,
            expected,
        });
    }
    Ok((crc_type, expected))
}

/// Reads the CRC value, the end of the block, and checks the CRC.
///
/// `data` must start at the beginning of the block.
pub(crate) fn finish_block(
    data: &[u8],
    block: &mut cbor::decode::Array,
    shortest: &mut bool,
    crc_type: CrcType,
    block_number: u64,
    expected: usize,
) -> Result<(), DecodeError> {
    let mismatch = DecodeError::FieldCountMismatch {
        block_number,
        expected,
    };
    let crc_value = if crc_type == CrcType::None {
        None
    } else {
        match crc::parse_crc_value(block, crc_type).map_err(DecodeError::from_crc(block_number))? {
            Some((crc_value, s)) => {
                *shortest = *shortest && s;
                Some((crc_value, block.offset()))
            }
            None => return Err(mismatch),
        }
    };

    let Some(end) = block.end()? else {
        return Err(mismatch);
    };

    if let Some((crc_value, crc_value_end)) = crc_value {
        crc::check_crc_value(&data[..end], crc_type, crc_value, crc_value_end)
            .map_err(DecodeError::from_crc(block_number))?;
    }
    Ok(())
}

impl cbor::decode::FromCbor for CanonicalBlock {
    type Error = DecodeError;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
        cbor::decode::try_parse_array(data, |a, shortest, tags| {
            let mut shortest = shortest && tags.is_empty() && a.is_definite();

            // The block number is not known until the second field
            let block_type = parse_field::<BlockType>(a, &mut shortest, 0, 5)?;
            let block_number = parse_field::<u64>(a, &mut shortest, 0, 5)?;
            let flags = parse_field::<BlockFlags>(a, &mut shortest, block_number, 5)?;
            let (crc_type, expected) = parse_crc_type(a, &mut shortest, block_number, 5)?;

            let block_data = a
                .try_parse_value(|value, s, tags| {
                    shortest = shortest && s && tags.is_empty();
                    match value {
                        cbor::decode::Value::Bytes(b) => Ok(Box::<[u8]>::from(b)),
                        cbor::decode::Value::ByteStream(chunks) => Ok(chunks.concat().into()),
                        value => Err(cbor::decode::Error::IncorrectType(
                            "Byte String".to_string(),
                            value.type_name(!tags.is_empty()),
                        )),
                    }
                })?
                .map(|(v, _)| v)
                .ok_or(DecodeError::FieldCountMismatch {
                    block_number,
                    expected,
                })?;

            finish_block(data, a, &mut shortest, crc_type, block_number, expected)?;

            trace!("Parsed {block_type:?} block {block_number}");
            Ok::<_, DecodeError>((
                CanonicalBlock {
                    block_type,
                    block_number,
                    flags,
                    crc_type,
                    data: block_data,
                },
                shortest,
            ))
        })
        .map(|o| o.map(|((block, shortest), len)| (block, shortest, len)))
    }
}

/// A block of a bundle, as visited in wire order by [`Bundle::iter_blocks`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Block<'a> {
    Primary(&'a PrimaryBlock),
    Canonical(&'a CanonicalBlock),
}

impl Block<'_> {
    pub fn block_type(&self) -> BlockType {
        match self {
            Block::Primary(_) => BlockType::Primary,
            Block::Canonical(block) => block.block_type,
        }
    }

    /// The block number; the primary block is block 0.
    pub fn block_number(&self) -> u64 {
        match self {
            Block::Primary(_) => 0,
            Block::Canonical(block) => block.block_number,
        }
    }

    pub fn crc_type(&self) -> CrcType {
        match self {
            Block::Primary(block) => block.crc_type,
            Block::Canonical(block) => block.crc_type,
        }
    }

    pub fn crc_value(&self) -> Option<u32> {
        match self {
            Block::Primary(block) => block.crc_value(),
            Block::Canonical(block) => block.crc_value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn encode() {
        let block = CanonicalBlock::payload(b"hi");
        assert_eq!(cbor::encode::emit(&block), hex!("85 01 01 00 00 42 6869"));
        assert_eq!(block.crc_value(), None);

        let block = CanonicalBlock {
            crc_type: CrcType::CRC16_X25,
            ..block
        };
        let data = cbor::encode::emit(&block);
        assert_eq!(data[..8], hex!("86 01 01 00 01 42 6869"));
        assert_eq!(data[8], 0x42);
        assert_eq!(
            block.crc_value(),
            Some(u16::from_be_bytes([data[9], data[10]]) as u32)
        );

        let (decoded, shortest, len) = cbor::decode::parse_detail::<CanonicalBlock>(&data).unwrap();
        assert_eq!(decoded, block);
        assert!(shortest);
        assert_eq!(len, data.len());
    }

    #[test]
    fn decode_errors() {
        // Too few fields
        assert!(matches!(
            cbor::decode::parse::<CanonicalBlock>(&hex!("84 01 01 00 00")),
            Err(DecodeError::FieldCountMismatch {
                block_number: 1,
                expected: 5
            })
        ));
        // CRC type says CRC, but there is no CRC field
        assert!(matches!(
            cbor::decode::parse::<CanonicalBlock>(&hex!("85 01 01 00 02 41 00")),
            Err(DecodeError::FieldCountMismatch {
                block_number: 1,
                expected: 6
            })
        ));
        assert!(matches!(
            cbor::decode::parse::<CanonicalBlock>(&hex!("9f 01 01 00 02 41 00 ff")),
            Err(DecodeError::FieldCountMismatch {
                block_number: 1,
                expected: 6
            })
        ));
        // Unexpected extra field
        assert!(matches!(
            cbor::decode::parse::<CanonicalBlock>(&hex!("9f 01 01 00 00 41 00 00 ff")),
            Err(DecodeError::FieldCountMismatch {
                block_number: 1,
                expected: 5
            })
        ));
        assert!(matches!(
            cbor::decode::parse::<CanonicalBlock>(&hex!("85 01 01 00 03 41 00")),
            Err(DecodeError::InvalidCrcType(3))
        ));
        assert!(matches!(
            cbor::decode::parse::<CanonicalBlock>(&hex!("86 01 01 00 01 41 00 43 000000")),
            Err(DecodeError::InvalidCrcLength(3))
        ));
        assert!(matches!(
            cbor::decode::parse::<CanonicalBlock>(&hex!("86 01 01 00 01 41 00 42 0000")),
            Err(DecodeError::CrcMismatch { block_number: 1 })
        ));
        assert!(matches!(
            cbor::decode::parse::<CanonicalBlock>(&hex!("85 01 01 00 00 01")),
            Err(DecodeError::MalformedCbor(
                cbor::decode::Error::IncorrectType(..)
            ))
        ));
    }

    #[test]
    fn non_canonical() {
        // Indefinite-length block, and chunked data
        let (block, shortest, _) =
            cbor::decode::parse_detail::<CanonicalBlock>(&hex!("9f 01 01 00 00 42 6869 ff"))
                .unwrap();
        assert_eq!(block, CanonicalBlock::payload(b"hi"));
        assert!(!shortest);

        let (block, shortest, _) = cbor::decode::parse_detail::<CanonicalBlock>(&hex!(
            "85 01 01 00 00 5f 41 68 41 69 ff"
        ))
        .unwrap();
        assert_eq!(block, CanonicalBlock::payload(b"hi"));
        assert!(!shortest);
    }

    #[test]
    fn extension_data() {
        let node: Eid = "ipn:3.0".parse().unwrap();
        let block = CanonicalBlock::previous_node(2, &node);
        assert_eq!(block.parse_data::<Eid>().unwrap(), node);
        assert!(block.check_data().is_ok());

        let hop_info = HopInfo { limit: 32, count: 1 };
        let block = CanonicalBlock::hop_count(3, &hop_info);
        assert_eq!(&*block.data, &hex!("82 18 20 01"));
        assert_eq!(block.parse_data::<HopInfo>().unwrap(), hop_info);

        let block = CanonicalBlock::bundle_age(4, 1000);
        assert_eq!(block.parse_data::<u64>().unwrap(), 1000);

        let bad = CanonicalBlock::new(BlockType::BundleAge, 4, hex!("01 02").into());
        assert_eq!(
            bad.check_data(),
            Err(ValidationError::InvalidExtensionBlock(4))
        );
        let unknown = CanonicalBlock::new(BlockType::Unrecognised(200), 5, hex!("ff").into());
        assert!(unknown.check_data().is_ok());
    }
}
