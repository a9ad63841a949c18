use super::*;

/// Block processing control flags, RFC 9171 Section 4.2.4.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BlockFlags {
    pub must_replicate: bool,
    pub report_on_failure: bool,
    pub delete_bundle_on_failure: bool,
    pub delete_block_on_failure: bool,
    pub unrecognised: u64,
}

const KNOWN: u64 = (1 << 0) | (1 << 1) | (1 << 2) | (1 << 4);

impl From<BlockFlags> for u64 {
    fn from(value: BlockFlags) -> Self {
        let mut flags = value.unrecognised & !KNOWN;
        if value.must_replicate {
            flags |= 1 << 0;
        }
        if value.report_on_failure {
            flags |= 1 << 1;
        }
        if value.delete_bundle_on_failure {
            flags |= 1 << 2;
        }
        if value.delete_block_on_failure {
            flags |= 1 << 4;
        }
        flags
    }
}

impl From<u64> for BlockFlags {
    fn from(value: u64) -> Self {
        Self {
            must_replicate: value & (1 << 0) != 0,
            report_on_failure: value & (1 << 1) != 0,
            delete_bundle_on_failure: value & (1 << 2) != 0,
            delete_block_on_failure: value & (1 << 4) != 0,
            unrecognised: value & !KNOWN,
        }
    }
}

impl cbor::encode::ToCbor for BlockFlags {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit(&u64::from(*self))
    }
}

impl cbor::decode::FromCbor for BlockFlags {
    type Error = cbor::decode::Error;

    fn try_from_cbor(data: &[u8]) -> Result<Option<(Self, bool, usize)>, Self::Error> {
        Ok(cbor::decode::try_parse::<u64>(data)?
            .map(|(value, shortest, len)| (value.into(), shortest, len)))
    }
}
