use super::*;

/// Builds new bundles.
///
/// Extension blocks are numbered from 2 in the order they are added, and the
/// payload block, block 1, is always last.
///
/// ```
/// use dtnbp_bpv7::prelude::*;
///
/// let bundle = Builder::new()
///     .source("dtn://a/app".parse().unwrap())
///     .destination("dtn://b/app".parse().unwrap())
///     .add_payload_block(b"hello")
///     .build()
///     .unwrap();
/// assert_eq!(bundle.payload(), b"hello");
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    bundle_flags: BundleFlags,
    crc_type: CrcType,
    source: Eid,
    destination: Eid,
    report_to: Option<Eid>,
    timestamp: Option<CreationTimestamp>,
    lifetime: u64,
    fragment_info: Option<FragmentInfo>,
    hop_limit: Option<u64>,
    payload: Option<BlockTemplate>,
    extensions: Vec<BlockTemplate>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::with_config(&Config::default())
    }
}

impl Builder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_config(config: &Config) -> Self {
        Self {
            bundle_flags: BundleFlags::default(),
            crc_type: config.crc_type,
            source: Eid::default(),
            destination: Eid::default(),
            report_to: None,
            timestamp: None,
            lifetime: config.lifetime,
            fragment_info: None,
            hop_limit: config.hop_limit,
            payload: None,
            extensions: Vec::new(),
        }
    }

    pub fn flags(&mut self, flags: BundleFlags) -> &mut Self {
        self.bundle_flags = flags;
        self
    }

    /// The CRC type of the primary block, and the default for other blocks.
    pub fn crc_type(&mut self, crc_type: CrcType) -> &mut Self {
        self.crc_type = crc_type;
        self
    }

    pub fn source(&mut self, source: Eid) -> &mut Self {
        self.source = source;
        self
    }

    pub fn destination(&mut self, destination: Eid) -> &mut Self {
        self.destination = destination;
        self
    }

    /// Defaults to the source.
    pub fn report_to(&mut self, report_to: Eid) -> &mut Self {
        self.report_to = Some(report_to);
        self
    }

    /// Defaults to [`CreationTimestamp::now`] at the time of [`Self::build`].
    pub fn timestamp(&mut self, timestamp: CreationTimestamp) -> &mut Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Lifetime in milliseconds.
    pub fn lifetime(&mut self, lifetime: u64) -> &mut Self {
        self.lifetime = lifetime;
        self
    }

    /// Makes the bundle a fragment; this also sets the fragment flag.
    pub fn fragment(&mut self, offset: u64, total_len: u64) -> &mut Self {
        self.fragment_info = Some(FragmentInfo { offset, total_len });
        self
    }

    pub fn add_extension_block(&mut self, block_type: BlockType) -> BlockBuilder<'_> {
        BlockBuilder::new(self, block_type)
    }

    pub fn add_payload_block(&mut self, data: &[u8]) -> &mut Self {
        self.add_extension_block(BlockType::Payload)
            .data(data)
            .build()
    }

    pub fn build(&self) -> Result<Bundle, ValidationError> {
        let primary = PrimaryBlock {
            flags: BundleFlags {
                is_fragment: self.fragment_info.is_some(),
                ..self.bundle_flags
            },
            crc_type: self.crc_type,
            destination: self.destination.clone(),
            source: self.source.clone(),
            report_to: self
                .report_to
                .clone()
                .unwrap_or_else(|| self.source.clone()),
            timestamp: self.timestamp.unwrap_or_else(CreationTimestamp::now),
            lifetime: self.lifetime,
            fragment_info: self.fragment_info,
        };

        let mut blocks = self
            .extensions
            .iter()
            .zip(2..)
            .map(|(template, block_number)| template.build(block_number))
            .collect::<Vec<_>>();

        if let Some(limit) = self.hop_limit {
            if !blocks.iter().any(|b| b.block_type == BlockType::HopCount) {
                let block_number = blocks.len() as u64 + 2;
                blocks.push(CanonicalBlock {
                    crc_type: self.crc_type,
                    ..CanonicalBlock::hop_count(block_number, &HopInfo { limit, count: 0 })
                });
            }
        }

        if let Some(payload) = &self.payload {
            blocks.push(payload.build(1));
        }

        Bundle::new(primary, blocks)
    }
}

pub struct BlockBuilder<'a> {
    builder: &'a mut Builder,
    template: BlockTemplate,
}

impl<'a> BlockBuilder<'a> {
    fn new(builder: &'a mut Builder, block_type: BlockType) -> Self {
        Self {
            template: BlockTemplate {
                block_type,
                flags: BlockFlags::default(),
                crc_type: builder.crc_type,
                data: Box::default(),
            },
            builder,
        }
    }

    pub fn must_replicate(mut self, must_replicate: bool) -> Self {
        self.template.flags.must_replicate = must_replicate;
        self
    }

    pub fn report_on_failure(mut self, report_on_failure: bool) -> Self {
        self.template.flags.report_on_failure = report_on_failure;
        self
    }

    pub fn delete_bundle_on_failure(mut self, delete_bundle_on_failure: bool) -> Self {
        self.template.flags.delete_bundle_on_failure = delete_bundle_on_failure;
        self
    }

    pub fn delete_block_on_failure(mut self, delete_block_on_failure: bool) -> Self {
        self.template.flags.delete_block_on_failure = delete_block_on_failure;
        self
    }

    pub fn crc_type(mut self, crc_type: CrcType) -> Self {
        self.template.crc_type = crc_type;
        self
    }

    /// The block-type-specific data.
    pub fn data(mut self, data: &[u8]) -> Self {
        self.template.data = data.into();
        self
    }

    pub fn build(self) -> &'a mut Builder {
        if self.template.block_type == BlockType::Payload {
            self.builder.payload = Some(self.template);
        } else {
            self.builder.extensions.push(self.template);
        }
        self.builder
    }
}

#[derive(Debug, Clone)]
struct BlockTemplate {
    block_type: BlockType,
    flags: BlockFlags,
    crc_type: CrcType,
    data: Box<[u8]>,
}

impl BlockTemplate {
    fn build(&self, block_number: u64) -> CanonicalBlock {
        CanonicalBlock {
            block_type: self.block_type,
            block_number,
            flags: self.flags,
            crc_type: self.crc_type,
            data: self.data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering() {
        let bundle = Builder::with_config(&Config {
            hop_limit: Some(16),
            ..Default::default()
        })
        .source("ipn:1.1".parse().unwrap())
        .destination("ipn:2.1".parse().unwrap())
        .add_payload_block(b"payload")
        .add_extension_block(BlockType::Unrecognised(200))
        .must_replicate(true)
        .data(&[0xa0])
        .build()
        .add_extension_block(BlockType::BundleAge)
        .crc_type(CrcType::None)
        .data(&cbor::encode::emit(&0u64))
        .build()
        .build()
        .unwrap();

        let blocks: Vec<(BlockType, u64)> = bundle
            .blocks()
            .iter()
            .map(|b| (b.block_type, b.block_number))
            .collect();
        assert_eq!(
            blocks,
            [
                (BlockType::Unrecognised(200), 2),
                (BlockType::BundleAge, 3),
                (BlockType::HopCount, 4),
                (BlockType::Payload, 1)
            ]
        );
        assert!(bundle.blocks()[0].flags.must_replicate);
        assert_eq!(bundle.blocks()[0].crc_type, CrcType::CRC32_CASTAGNOLI);
        assert_eq!(bundle.blocks()[1].crc_type, CrcType::None);
        assert_eq!(bundle.hop_count(), Some(HopInfo { limit: 16, count: 0 }));
        assert_eq!(bundle.report_to(), bundle.source());
        assert_eq!(bundle.lifetime(), Config::default().lifetime);
    }

    #[test]
    fn fragment() {
        let bundle = Builder::new()
            .source("dtn://a/".parse().unwrap())
            .destination("dtn://b/".parse().unwrap())
            .report_to(Eid::Null)
            .fragment(100, 500)
            .add_payload_block(b"part")
            .build()
            .unwrap();
        assert!(bundle.flags().is_fragment);
        assert_eq!(
            bundle.fragment_info(),
            Some(FragmentInfo {
                offset: 100,
                total_len: 500
            })
        );
        assert!(bundle.report_to().is_null());
    }

    #[test]
    fn missing_payload() {
        assert_eq!(
            Builder::new()
                .source("dtn://a/".parse().unwrap())
                .build(),
            Err(ValidationError::MissingPayload)
        );
    }
}
