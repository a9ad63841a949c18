/*!
The [`Bundle`] type: a primary block followed by canonical blocks, the last of
which is the payload.

A `Bundle` can only be created through [`Bundle::new`] (directly, through the
[`Builder`], or by decoding), which checks the structural rules of RFC 9171,
so every `Bundle` value is valid. The order of the blocks is fixed once
constructed.
*/

use super::*;
use hashbrown::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    primary: PrimaryBlock,
    blocks: Vec<CanonicalBlock>,
}

impl Bundle {
    /// Assembles a bundle, checking it against the rules of RFC 9171.
    ///
    /// The checks run in a fixed order and the first failure is returned.
    pub fn new(
        primary: PrimaryBlock,
        blocks: Vec<CanonicalBlock>,
    ) -> Result<Self, ValidationError> {
        check_block_numbers(&blocks)?;
        check_payload(&blocks)?;
        check_fragment_info(&primary)?;
        check_endpoints(&primary)?;
        check_flags(&primary)?;

        for block in &blocks {
            block.check_data()?;
        }

        if primary.timestamp.is_clockless()
            && !blocks.iter().any(|b| b.block_type == BlockType::BundleAge)
        {
            return Err(ValidationError::MissingBundleAge);
        }

        Ok(Self { primary, blocks })
    }

    pub fn primary(&self) -> &PrimaryBlock {
        &self.primary
    }

    /// The canonical blocks, in wire order. The payload block is last.
    pub fn blocks(&self) -> &[CanonicalBlock] {
        &self.blocks
    }

    /// Every block, primary first, in wire order.
    pub fn iter_blocks(&self) -> impl Iterator<Item = Block<'_>> {
        core::iter::once(Block::Primary(&self.primary))
            .chain(self.blocks.iter().map(Block::Canonical))
    }

    /// The block with number `block_number`; block 0 is the primary block.
    pub fn block(&self, block_number: u64) -> Option<Block<'_>> {
        self.iter_blocks()
            .find(|block| block.block_number() == block_number)
    }

    /// The payload data.
    ///
    /// This cannot fail: [`Bundle::new`] returns
    /// [`ValidationError::MissingPayload`] for a block list without a payload
    /// block, and the payload block is always last.
    pub fn payload(&self) -> &[u8] {
        self.blocks.last().map_or(&[], |block| &block.data)
    }

    /// Replaces the payload data. The payload block keeps its number, flags
    /// and CRC type.
    pub fn set_payload(&mut self, data: &[u8]) {
        if let Some(block) = self.blocks.last_mut() {
            block.data = data.into();
        }
    }

    pub fn source(&self) -> &Eid {
        &self.primary.source
    }

    pub fn destination(&self) -> &Eid {
        &self.primary.destination
    }

    pub fn report_to(&self) -> &Eid {
        &self.primary.report_to
    }

    pub fn creation_timestamp(&self) -> &CreationTimestamp {
        &self.primary.timestamp
    }

    /// Lifetime in milliseconds.
    pub fn lifetime(&self) -> u64 {
        self.primary.lifetime
    }

    pub fn flags(&self) -> &BundleFlags {
        &self.primary.flags
    }

    pub fn fragment_info(&self) -> Option<FragmentInfo> {
        self.primary.fragment_info
    }

    /// Returns `true` if more than the lifetime has passed between creation
    /// and `now`.
    pub fn is_expired(&self, now: DtnTime) -> bool {
        now.saturating_sub(self.primary.timestamp.creation_time) > self.primary.lifetime
    }

    pub fn id(&self) -> BundleId {
        BundleId {
            source: self.primary.source.clone(),
            timestamp: self.primary.timestamp,
            fragment_info: self.primary.fragment_info,
        }
    }

    pub fn metadata(&self) -> Metadata {
        self.into()
    }

    /// Sets the CRC type of every block, including the primary block.
    pub fn set_crc_type(&mut self, crc_type: CrcType) {
        self.primary.crc_type = crc_type;
        for block in &mut self.blocks {
            block.crc_type = crc_type;
        }
    }

    fn extension<T: cbor::decode::FromCbor>(&self, block_type: BlockType) -> Option<T> {
        self.blocks
            .iter()
            .find(|block| block.block_type == block_type)
            .and_then(|block| block.parse_data().ok())
    }

    /// The node the bundle was received from, from the Previous Node block.
    pub fn previous_node(&self) -> Option<Eid> {
        self.extension(BlockType::PreviousNode)
    }

    /// The age of the bundle in milliseconds, from the Bundle Age block.
    pub fn bundle_age(&self) -> Option<u64> {
        self.extension(BlockType::BundleAge)
    }

    pub fn hop_count(&self) -> Option<HopInfo> {
        self.extension(BlockType::HopCount)
    }

    fn set_extension<T>(&mut self, block_type: BlockType, value: &T)
    where
        T: cbor::encode::ToCbor + ?Sized,
    {
        if let Some(block) = self.blocks.iter_mut().find(|b| b.block_type == block_type) {
            block.data = cbor::encode::emit(value).into();
        }
    }

    /// Updates the extension blocks as the bundle is forwarded, RFC 9171
    /// Section 4.4: the hop count is incremented, the previous node becomes
    /// `local_node`, and `residence_time` milliseconds are added to the
    /// bundle age. Blocks the bundle does not carry are not added.
    ///
    /// Apart from [`Bundle::set_payload`] and [`Bundle::set_crc_type`], this
    /// is the only change a bundle allows after construction.
    ///
    /// Returns the reason the bundle must not be forwarded further, if any:
    /// the hop limit is exceeded, or the bundle age is beyond the lifetime.
    /// Expiry by creation time is checked with [`Bundle::is_expired`].
    pub fn update_extensions(
        &mut self,
        local_node: &Eid,
        residence_time: u64,
    ) -> Result<Option<ReasonCode>, ValidationError> {
        local_node
            .validate()
            .map_err(|e| ValidationError::InvalidEid {
                field: "previous node",
                reason: e.to_string(),
            })?;

        let mut reason = None;
        if let Some(mut hop_info) = self.hop_count() {
            hop_info.count = hop_info.count.saturating_add(1);
            self.set_extension(BlockType::HopCount, &hop_info);
            if hop_info.exceeded() {
                reason = Some(ReasonCode::HopLimitExceeded);
            }
        }
        if self.previous_node().is_some() {
            self.set_extension(BlockType::PreviousNode, local_node);
        }
        if let Some(age) = self.bundle_age() {
            let age = age.saturating_add(residence_time);
            self.set_extension(BlockType::BundleAge, &age);
            if age > self.primary.lifetime {
                reason = reason.or(Some(ReasonCode::LifetimeExpired));
            }
        }

        trace!("Updated extension blocks of bundle {}", self.id());
        Ok(reason)
    }
}

fn check_block_numbers(blocks: &[CanonicalBlock]) -> Result<(), ValidationError> {
    for block in blocks {
        if block.block_number == 0 || block.block_type == BlockType::Primary {
            return Err(ValidationError::InvalidBlockNumber(
                block.block_number,
                block.block_type,
            ));
        }
    }

    let mut seen = HashSet::new();
    for block in blocks {
        if !seen.insert(block.block_number) {
            return Err(ValidationError::DuplicateBlockNumber(block.block_number));
        }
    }

    // The payload owns block number 1, so a second payload block is a duplicate
    if blocks
        .iter()
        .filter(|b| b.block_type == BlockType::Payload)
        .nth(1)
        .is_some()
    {
        return Err(ValidationError::DuplicateBlockNumber(1));
    }

    let mut seen = HashSet::new();
    for block in blocks {
        if matches!(
            block.block_type,
            BlockType::PreviousNode | BlockType::BundleAge | BlockType::HopCount
        ) && !seen.insert(block.block_type)
        {
            return Err(ValidationError::DuplicateBlocks(block.block_type));
        }
    }
    Ok(())
}

fn check_payload(blocks: &[CanonicalBlock]) -> Result<(), ValidationError> {
    let Some(payload) = blocks.iter().find(|b| b.block_type == BlockType::Payload) else {
        return Err(ValidationError::MissingPayload);
    };
    if payload.block_number != 1 {
        return Err(ValidationError::InvalidBlockNumber(
            payload.block_number,
            BlockType::Payload,
        ));
    }
    if blocks.last().map(|b| b.block_type) != Some(BlockType::Payload) {
        return Err(ValidationError::PayloadNotFinal);
    }
    Ok(())
}

fn check_fragment_info(primary: &PrimaryBlock) -> Result<(), ValidationError> {
    match (primary.flags.is_fragment, &primary.fragment_info) {
        (false, None) => Ok(()),
        (true, Some(fragment_info)) if fragment_info.offset < fragment_info.total_len => Ok(()),
        (true, Some(fragment_info)) => Err(ValidationError::InvalidFragmentInfo(
            fragment_info.offset,
            fragment_info.total_len,
        )),
        _ => Err(ValidationError::FragmentFieldMismatch),
    }
}

fn check_endpoints(primary: &PrimaryBlock) -> Result<(), ValidationError> {
    for (field, eid) in [
        ("destination", &primary.destination),
        ("source", &primary.source),
        ("report-to", &primary.report_to),
    ] {
        eid.validate()
            .map_err(|e| ValidationError::InvalidEid {
                field,
                reason: e.to_string(),
            })?;
    }
    Ok(())
}

fn check_flags(primary: &PrimaryBlock) -> Result<(), ValidationError> {
    let flags = &primary.flags;
    if flags.is_admin_record && flags.any_report_requested() {
        return Err(ValidationError::InvalidFlags);
    }
    if primary.source.is_null()
        && (flags.is_fragment || !flags.do_not_fragment || flags.any_report_requested())
    {
        return Err(ValidationError::InvalidFlags);
    }
    Ok(())
}

impl cbor::encode::ToCbor for Bundle {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit_array(None, |a| {
            a.emit(&self.primary);
            for block in &self.blocks {
                a.emit(block);
            }
        })
    }
}

impl cbor::decode::FromCbor for Bundle {
    type Error = DecodeError;

    /// Decodes a bundle. The shortest-form flag is `true` only for bundles
    /// in canonical form: an indefinite-length array of shortest-form,
    /// definite-length blocks.
    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
        cbor::decode::try_parse_array(data, |a, shortest, tags| {
            if let Some(count) = a.len().filter(|count| *count < 2) {
                return Err(DecodeError::TooFewBlocks(count));
            }
            let mut shortest = shortest && tags.is_empty() && !a.is_definite();

            let Some((primary, s)) = a.try_parse::<PrimaryBlock>()? else {
                return Err(DecodeError::TooFewBlocks(0));
            };
            shortest = shortest && s;

            let mut blocks = Vec::new();
            while let Some((block, s)) = a.try_parse::<CanonicalBlock>()? {
                shortest = shortest && s;
                blocks.push(block);
            }
            if blocks.is_empty() {
                return Err(DecodeError::TooFewBlocks(1));
            }

            Ok((Bundle::new(primary, blocks)?, shortest))
        })
        .map(|o| o.map(|((bundle, shortest), len)| (bundle, shortest, len)))
    }
}

impl TryFrom<&[u8]> for Bundle {
    type Error = DecodeError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        codec::decode(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary() -> PrimaryBlock {
        PrimaryBlock {
            destination: "dtn://b/".parse().unwrap(),
            source: "dtn://a/".parse().unwrap(),
            timestamp: CreationTimestamp::new(DtnTime::new(1000), 0),
            lifetime: 3_600_000,
            ..Default::default()
        }
    }

    fn block(block_type: BlockType, block_number: u64) -> CanonicalBlock {
        match block_type {
            BlockType::HopCount => {
                CanonicalBlock::hop_count(block_number, &HopInfo { limit: 8, count: 0 })
            }
            BlockType::BundleAge => CanonicalBlock::bundle_age(block_number, 0),
            block_type => CanonicalBlock::new(block_type, block_number, b"data".as_slice().into()),
        }
    }

    fn check(blocks: &[(BlockType, u64)]) -> Result<Bundle, ValidationError> {
        Bundle::new(
            primary(),
            blocks.iter().map(|(t, n)| block(*t, *n)).collect(),
        )
    }

    #[test]
    fn block_rules() {
        let unknown = BlockType::Unrecognised(192);

        assert!(check(&[(BlockType::HopCount, 2), (BlockType::Payload, 1)]).is_ok());
        assert_eq!(
            check(&[]),
            Err(ValidationError::MissingPayload)
        );
        assert_eq!(
            check(&[(unknown, 2)]),
            Err(ValidationError::MissingPayload)
        );
        assert_eq!(
            check(&[(unknown, 0), (BlockType::Payload, 1)]),
            Err(ValidationError::InvalidBlockNumber(0, unknown))
        );
        assert_eq!(
            check(&[(BlockType::Primary, 2), (BlockType::Payload, 1)]),
            Err(ValidationError::InvalidBlockNumber(2, BlockType::Primary))
        );
        assert_eq!(
            check(&[(unknown, 2), (unknown, 2), (BlockType::Payload, 1)]),
            Err(ValidationError::DuplicateBlockNumber(2))
        );
        assert_eq!(
            check(&[(BlockType::Payload, 1), (BlockType::Payload, 1)]),
            Err(ValidationError::DuplicateBlockNumber(1))
        );
        assert_eq!(
            check(&[(BlockType::Payload, 3), (BlockType::Payload, 1)]),
            Err(ValidationError::DuplicateBlockNumber(1))
        );
        assert_eq!(
            check(&[
                (BlockType::HopCount, 2),
                (BlockType::HopCount, 3),
                (BlockType::Payload, 1)
            ]),
            Err(ValidationError::DuplicateBlocks(BlockType::HopCount))
        );
        assert_eq!(
            check(&[(BlockType::Payload, 2)]),
            Err(ValidationError::InvalidBlockNumber(2, BlockType::Payload))
        );
        assert_eq!(
            check(&[(BlockType::Payload, 1), (unknown, 2)]),
            Err(ValidationError::PayloadNotFinal)
        );
    }

    #[test]
    fn fragment_rules() {
        let payload = vec![CanonicalBlock::payload(b"data")];
        let fragment = FragmentInfo {
            offset: 100,
            total_len: 500,
        };
        let is_fragment = BundleFlags {
            is_fragment: true,
            ..Default::default()
        };

        assert_eq!(
            Bundle::new(
                PrimaryBlock {
                    fragment_info: Some(fragment),
                    ..primary()
                },
                payload.clone()
            ),
            Err(ValidationError::FragmentFieldMismatch)
        );
        assert_eq!(
            Bundle::new(
                PrimaryBlock {
                    flags: is_fragment,
                    ..primary()
                },
                payload.clone()
            ),
            Err(ValidationError::FragmentFieldMismatch)
        );
        assert_eq!(
            Bundle::new(
                PrimaryBlock {
                    flags: is_fragment,
                    fragment_info: Some(FragmentInfo {
                        offset: 500,
                        total_len: 500
                    }),
                    ..primary()
                },
                payload.clone()
            ),
            Err(ValidationError::InvalidFragmentInfo(500, 500))
        );
        let bundle = Bundle::new(
            PrimaryBlock {
                flags: is_fragment,
                fragment_info: Some(fragment),
                ..primary()
            },
            payload,
        )
        .unwrap();
        assert_eq!(bundle.fragment_info(), Some(fragment));
        assert_eq!(bundle.id().fragment_info, Some(fragment));
    }

    #[test]
    fn flag_rules() {
        let payload = vec![CanonicalBlock::payload(b"data")];

        assert_eq!(
            Bundle::new(
                PrimaryBlock {
                    flags: BundleFlags {
                        is_admin_record: true,
                        delivery_report_requested: true,
                        ..Default::default()
                    },
                    ..primary()
                },
                payload.clone()
            ),
            Err(ValidationError::InvalidFlags)
        );

        // Anonymous bundles must not be fragmented, and cannot request reports
        let anonymous = PrimaryBlock {
            source: Eid::Null,
            ..primary()
        };
        assert_eq!(
            Bundle::new(anonymous.clone(), payload.clone()),
            Err(ValidationError::InvalidFlags)
        );
        assert!(
            Bundle::new(
                PrimaryBlock {
                    flags: BundleFlags {
                        do_not_fragment: true,
                        ..Default::default()
                    },
                    ..anonymous
                },
                payload
            )
            .is_ok()
        );
    }

    #[test]
    fn extension_rules() {
        let clockless = PrimaryBlock {
            timestamp: CreationTimestamp::new(DtnTime::new(0), 7),
            ..primary()
        };
        assert_eq!(
            Bundle::new(clockless.clone(), vec![CanonicalBlock::payload(b"x")]),
            Err(ValidationError::MissingBundleAge)
        );
        let bundle = Bundle::new(
            clockless,
            vec![
                CanonicalBlock::bundle_age(2, 1500),
                CanonicalBlock::payload(b"x"),
            ],
        )
        .unwrap();
        assert_eq!(bundle.bundle_age(), Some(1500));
        assert_eq!(bundle.hop_count(), None);

        assert_eq!(
            Bundle::new(
                primary(),
                vec![
                    CanonicalBlock::new(BlockType::HopCount, 2, [0x01u8].as_slice().into()),
                    CanonicalBlock::payload(b"x"),
                ],
            ),
            Err(ValidationError::InvalidExtensionBlock(2))
        );
    }

    #[test]
    fn endpoint_rules() {
        let payload = vec![CanonicalBlock::payload(b"x")];
        let invalid = [
            Eid::Ipn {
                node_number: 0,
                service_number: 0,
            },
            Eid::Ipn {
                node_number: 0,
                service_number: 5,
            },
            Eid::Dtn {
                node_name: "".into(),
                demux: "".into(),
            },
            Eid::Dtn {
                node_name: "node".into(),
                demux: "a b".into(),
            },
            Eid::Unknown {
                scheme: 2,
                data: [0x00u8].as_slice().into(),
            },
            Eid::Unknown {
                scheme: 0,
                data: [0x00u8].as_slice().into(),
            },
            Eid::Unknown {
                scheme: 9,
                data: Box::default(),
            },
            Eid::Unknown {
                scheme: 9,
                data: [0x01u8, 0x02].as_slice().into(),
            },
        ];
        for eid in invalid {
            assert!(matches!(
                Bundle::new(
                    PrimaryBlock {
                        destination: eid.clone(),
                        ..primary()
                    },
                    payload.clone()
                ),
                Err(ValidationError::InvalidEid {
                    field: "destination",
                    ..
                })
            ));
            assert!(matches!(
                Bundle::new(
                    PrimaryBlock {
                        report_to: eid,
                        ..primary()
                    },
                    payload.clone()
                ),
                Err(ValidationError::InvalidEid {
                    field: "report-to",
                    ..
                })
            ));
        }

        // Every EID that passes encodes to one that decodes back unchanged
        for eid in [
            Eid::Null,
            Eid::Ipn {
                node_number: 1,
                service_number: 0,
            },
            Eid::Dtn {
                node_name: "n/ode%".into(),
                demux: "a/b".into(),
            },
            Eid::Unknown {
                scheme: 9,
                data: [0x82u8, 0x01, 0x02].as_slice().into(),
            },
        ] {
            let bundle = Bundle::new(
                PrimaryBlock {
                    destination: eid.clone(),
                    ..primary()
                },
                payload.clone(),
            )
            .unwrap();
            let decoded = codec::decode(&codec::encode(&bundle)).unwrap();
            assert_eq!(decoded.destination(), &eid);
            assert_eq!(decoded, bundle);
        }
    }

    #[test]
    fn forwarding_updates() {
        let local: Eid = "ipn:7.0".parse().unwrap();
        let mut bundle = Bundle::new(
            PrimaryBlock {
                lifetime: 2000,
                ..primary()
            },
            vec![
                CanonicalBlock::hop_count(2, &HopInfo { limit: 3, count: 1 }),
                CanonicalBlock::previous_node(3, &"ipn:9.0".parse().unwrap()),
                CanonicalBlock::bundle_age(4, 500),
                CanonicalBlock::payload(b"x"),
            ],
        )
        .unwrap();

        assert_eq!(bundle.update_extensions(&local, 1000), Ok(None));
        assert_eq!(bundle.hop_count(), Some(HopInfo { limit: 3, count: 2 }));
        assert_eq!(bundle.previous_node(), Some(local.clone()));
        assert_eq!(bundle.bundle_age(), Some(1500));
        assert_eq!(codec::decode(&codec::encode(&bundle)).unwrap(), bundle);

        // Bundle age beyond the lifetime
        assert_eq!(
            bundle.clone().update_extensions(&local, 501),
            Ok(Some(ReasonCode::LifetimeExpired))
        );

        assert_eq!(bundle.update_extensions(&local, 0), Ok(None));
        assert_eq!(bundle.hop_count(), Some(HopInfo { limit: 3, count: 3 }));

        // The hop limit takes precedence
        assert_eq!(
            bundle.update_extensions(&local, 1000),
            Ok(Some(ReasonCode::HopLimitExceeded))
        );
        assert_eq!(bundle.hop_count(), Some(HopInfo { limit: 3, count: 4 }));
        assert_eq!(bundle.bundle_age(), Some(2500));

        // Missing blocks stay missing
        let mut plain = Bundle::new(primary(), vec![CanonicalBlock::payload(b"x")]).unwrap();
        let before = plain.clone();
        assert_eq!(plain.update_extensions(&local, 1000), Ok(None));
        assert_eq!(plain, before);

        // A local node that cannot be encoded leaves the bundle untouched
        let invalid = Eid::Ipn {
            node_number: 0,
            service_number: 1,
        };
        assert!(matches!(
            plain.update_extensions(&invalid, 0),
            Err(ValidationError::InvalidEid {
                field: "previous node",
                ..
            })
        ));
        assert_eq!(plain, before);
    }

    #[test]
    fn accessors() {
        let previous: Eid = "ipn:9.0".parse().unwrap();
        let mut bundle = Bundle::new(
            primary(),
            vec![
                CanonicalBlock::previous_node(3, &previous),
                CanonicalBlock::hop_count(2, &HopInfo { limit: 5, count: 1 }),
                CanonicalBlock::payload(b"hello"),
            ],
        )
        .unwrap();

        assert_eq!(bundle.payload(), b"hello");
        assert_eq!(bundle.source().to_string(), "dtn://a/");
        assert_eq!(bundle.destination().to_string(), "dtn://b/");
        assert!(bundle.report_to().is_null());
        assert_eq!(bundle.lifetime(), 3_600_000);
        assert_eq!(bundle.previous_node(), Some(previous));
        assert_eq!(bundle.hop_count(), Some(HopInfo { limit: 5, count: 1 }));

        let numbers: Vec<u64> = bundle.iter_blocks().map(|b| b.block_number()).collect();
        assert_eq!(numbers, [0, 3, 2, 1]);
        assert_eq!(
            bundle.block(2).map(|b| b.block_type()),
            Some(BlockType::HopCount)
        );
        assert_eq!(bundle.block(0).map(|b| b.block_type()), Some(BlockType::Primary));
        assert!(bundle.block(4).is_none());

        bundle.set_payload(b"goodbye");
        assert_eq!(bundle.payload(), b"goodbye");
        assert_eq!(bundle.blocks()[2].block_number, 1);

        bundle.set_crc_type(CrcType::CRC16_X25);
        assert!(
            bundle
                .iter_blocks()
                .all(|b| b.crc_type() == CrcType::CRC16_X25 && b.crc_value().is_some())
        );
    }

    #[test]
    fn expiry() {
        let bundle = Bundle::new(primary(), vec![CanonicalBlock::payload(b"x")]).unwrap();
        assert!(!bundle.is_expired(DtnTime::new(1000)));
        assert!(!bundle.is_expired(DtnTime::new(3_601_000)));
        assert!(bundle.is_expired(DtnTime::new(3_601_001)));
        // A clock behind the creation time never expires the bundle
        assert!(!bundle.is_expired(DtnTime::new(0)));
    }
}
